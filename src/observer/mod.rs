//! Spatial aggregation of outbound light updates.
//!
//! Every combined send marks the sections its light change can reach. Marks
//! for the same chunk collapse into one [`ChunkBatch`], and a periodic
//! [`ChunkObserver::flush`] hands each batch to the handler exactly once.

mod batch;
mod neighborhood;

pub use batch::ChunkBatch;
pub use neighborhood::{affected_batches, delta_light, for_each_affected_section};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info, warn};

use crate::code::ResultCode;
use crate::handler::Handler;
use crate::light::{BlockPos, ChunkPos, LightFlags, LightLevel, WorldId};

type PendingMap = HashMap<(WorldId, ChunkPos), ChunkBatch>;

/// Counts one running flush; released when the flush ends, even by unwinding.
struct BusyGuard<'a>(&'a AtomicUsize);

impl<'a> BusyGuard<'a> {
    fn enter(flushes: &'a AtomicUsize) -> Self {
        flushes.fetch_add(1, Ordering::AcqRel);
        Self(flushes)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Deduplicating per-chunk aggregator.
pub struct ChunkObserver {
    handler: Arc<dyn Handler>,
    pending: Mutex<PendingMap>,
    flushes: AtomicUsize,
}

impl ChunkObserver {
    /// Creates an observer that sends through `handler`.
    #[must_use]
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            pending: Mutex::new(HashMap::new()),
            flushes: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingMap> {
        self.pending.lock().unwrap_or_else(|poisoned| {
            warn!("chunk observer: recovered poisoned lock");
            poisoned.into_inner()
        })
    }

    /// Returns true while any flush is in progress.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.flushes.load(Ordering::Acquire) > 0
    }

    /// Number of chunks waiting for the next flush.
    #[must_use]
    pub fn pending_chunks(&self) -> usize {
        self.lock().len()
    }

    /// Schedules every section reachable from `pos` for the next flush.
    pub fn notify_affected_regions(
        &self,
        world: WorldId,
        pos: BlockPos,
        level: LightLevel,
        kinds: LightFlags,
    ) -> ResultCode {
        if !self.handler.is_world_available(world) {
            return ResultCode::WorldNotAvailable;
        }
        let batches = self.handler.collect_affected_regions(world, pos, level, kinds);
        if batches.is_empty() {
            return ResultCode::Success;
        }

        let mut pending = self.lock();
        for batch in batches {
            match pending.get_mut(&(world, batch.chunk())) {
                Some(existing) => existing.merge(&batch),
                None => {
                    pending.insert((world, batch.chunk()), batch);
                }
            }
        }
        ResultCode::Success
    }

    /// Batches reachable from `pos`, without scheduling them.
    #[must_use]
    pub fn collect_affected_regions(
        &self,
        world: WorldId,
        pos: BlockPos,
        level: LightLevel,
        kinds: LightFlags,
    ) -> Vec<ChunkBatch> {
        if !self.handler.is_world_available(world) {
            return Vec::new();
        }
        self.handler.collect_affected_regions(world, pos, level, kinds)
    }

    /// Sends every pending batch once and empties the map.
    ///
    /// Returns how many batches were handed to the handler. Marks made while
    /// the flush runs are kept for the next one.
    pub fn flush(&self) -> usize {
        let _busy = BusyGuard::enter(&self.flushes);

        let batches = std::mem::take(&mut *self.lock());
        if batches.is_empty() {
            return 0;
        }

        let mut sent = 0usize;
        for (_, mut batch) in batches {
            if batch.is_empty() {
                continue;
            }
            let code = self.handler.send_chunk_batch(&batch);
            if !code.is_success() {
                debug!("chunk observer: send for {} returned {code}", batch.chunk());
            }
            batch.clear();
            sent += 1;
        }
        debug!("chunk observer: flushed {sent} chunk batches");
        sent
    }

    /// Flushes whatever is still pending.
    pub fn shutdown(&self) {
        let sent = self.flush();
        info!("chunk observer shut down after flushing {sent} batches");
    }
}
