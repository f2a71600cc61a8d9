//! In-memory handler.
//!
//! Stores light values in hash maps and treats "recalculation" as consuming
//! the set of positions whose raw value changed since the last recalculation.
//! It is intended for embedded usage, tests, and as a reference implementation.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::warn;

use crate::code::ResultCode;
use crate::light::{BlockPos, ChunkPos, LightFlags, LightLevel, WorldId};
use crate::observer::ChunkBatch;

use super::Handler;

#[derive(Debug)]
struct WorldState {
    bottom_section: i32,
    top_section: i32,
    supported: LightFlags,
    loaded: HashSet<ChunkPos>,
    block: HashMap<BlockPos, LightLevel>,
    sky: HashMap<BlockPos, LightLevel>,
    dirty: HashSet<BlockPos>,
}

impl WorldState {
    fn new(bottom_section: i32, top_section: i32) -> Self {
        Self {
            bottom_section,
            top_section,
            supported: LightFlags::all(),
            loaded: HashSet::new(),
            block: HashMap::new(),
            sky: HashMap::new(),
            dirty: HashSet::new(),
        }
    }

    fn unsupported(&self, kinds: LightFlags) -> Option<ResultCode> {
        if kinds.contains(LightFlags::SKY) && !self.supported.contains(LightFlags::SKY) {
            return Some(ResultCode::SkyDataNotAvailable);
        }
        if kinds.contains(LightFlags::BLOCK) && !self.supported.contains(LightFlags::BLOCK) {
            return Some(ResultCode::BlockDataNotAvailable);
        }
        None
    }
}

/// A chunk batch as it was handed to [`Handler::send_chunk_batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentBatch {
    /// World of the chunk.
    pub world: WorldId,
    /// Chunk coordinate.
    pub chunk: ChunkPos,
    /// Dirty sky sections, ascending.
    pub sky_sections: Vec<i32>,
    /// Dirty block sections, ascending.
    pub block_sections: Vec<i32>,
}

impl From<&ChunkBatch> for SentBatch {
    fn from(batch: &ChunkBatch) -> Self {
        Self {
            world: batch.world(),
            chunk: batch.chunk(),
            sky_sections: batch.sky_sections().collect(),
            block_sections: batch.block_sections().collect(),
        }
    }
}

/// Thread-safe in-memory [`Handler`].
#[derive(Debug, Default)]
pub struct InMemoryHandler {
    worlds: RwLock<HashMap<WorldId, WorldState>>,
    sent: Mutex<Vec<SentBatch>>,
}

impl InMemoryHandler {
    /// Creates a handler with no worlds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<WorldId, WorldState>> {
        self.worlds.read().unwrap_or_else(|poisoned| {
            warn!("in-memory handler: recovered poisoned lock");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<WorldId, WorldState>> {
        self.worlds.write().unwrap_or_else(|poisoned| {
            warn!("in-memory handler: recovered poisoned lock");
            poisoned.into_inner()
        })
    }

    fn sent(&self) -> MutexGuard<'_, Vec<SentBatch>> {
        self.sent.lock().unwrap_or_else(|poisoned| {
            warn!("in-memory handler: recovered poisoned send log");
            poisoned.into_inner()
        })
    }

    /// Registers a world spanning sections `bottom_section..=top_section`.
    ///
    /// Re-adding an existing world resets it.
    pub fn add_world(&self, world: WorldId, bottom_section: i32, top_section: i32) {
        self.write()
            .insert(world, WorldState::new(bottom_section, top_section.max(bottom_section)));
    }

    /// Removes a world and everything stored for it.
    pub fn remove_world(&self, world: WorldId) -> bool {
        self.write().remove(&world).is_some()
    }

    /// Restricts which light channels `world` stores.
    pub fn set_supported_kinds(&self, world: WorldId, kinds: LightFlags) {
        if let Some(state) = self.write().get_mut(&world) {
            state.supported = kinds;
        }
    }

    /// Marks a chunk as loaded.
    pub fn load_chunk(&self, world: WorldId, chunk: ChunkPos) {
        if let Some(state) = self.write().get_mut(&world) {
            state.loaded.insert(chunk);
        }
    }

    /// Marks a chunk as unloaded. Stored values are kept.
    pub fn unload_chunk(&self, world: WorldId, chunk: ChunkPos) {
        if let Some(state) = self.write().get_mut(&world) {
            state.loaded.remove(&chunk);
        }
    }

    /// Positions changed since their last recalculation.
    #[must_use]
    pub fn dirty_count(&self, world: WorldId) -> usize {
        self.read().get(&world).map_or(0, |state| state.dirty.len())
    }

    /// Every batch sent so far, oldest first.
    #[must_use]
    pub fn sent_batches(&self) -> Vec<SentBatch> {
        self.sent().clone()
    }

    /// Returns and forgets every batch sent so far.
    pub fn take_sent_batches(&self) -> Vec<SentBatch> {
        std::mem::take(&mut *self.sent())
    }
}

impl Handler for InMemoryHandler {
    fn is_world_available(&self, world: WorldId) -> bool {
        self.read().contains_key(&world)
    }

    fn is_chunk_loaded(&self, world: WorldId, chunk: ChunkPos) -> bool {
        self.read()
            .get(&world)
            .is_some_and(|state| state.loaded.contains(&chunk))
    }

    fn section_range(&self, world: WorldId) -> (i32, i32) {
        self.read()
            .get(&world)
            .map_or((0, -1), |state| (state.bottom_section, state.top_section))
    }

    fn is_value_kind_supported(&self, world: WorldId, kinds: LightFlags) -> bool {
        self.read()
            .get(&world)
            .is_some_and(|state| !kinds.is_empty() && state.supported.contains(kinds))
    }

    fn set_raw_value(&self, world: WorldId, pos: BlockPos, level: LightLevel, kinds: LightFlags) -> ResultCode {
        let mut worlds = self.write();
        let Some(state) = worlds.get_mut(&world) else {
            return ResultCode::WorldNotAvailable;
        };
        if !state.loaded.contains(&pos.chunk()) {
            return ResultCode::RegionNotLoaded;
        }
        if let Some(code) = state.unsupported(kinds) {
            return code;
        }

        let mut changed = false;
        for (kind, values) in [(LightFlags::BLOCK, &mut state.block), (LightFlags::SKY, &mut state.sky)] {
            if !kinds.contains(kind) {
                continue;
            }
            let previous = if level.is_dark() {
                values.remove(&pos)
            } else {
                values.insert(pos, level)
            };
            changed |= previous.unwrap_or(LightLevel::DARK) != level;
        }
        if changed {
            state.dirty.insert(pos);
        }
        ResultCode::Success
    }

    fn get_raw_value(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> LightLevel {
        let worlds = self.read();
        let Some(state) = worlds.get(&world) else {
            return LightLevel::DARK;
        };
        let values = if kinds.contains(LightFlags::BLOCK) {
            &state.block
        } else if kinds.contains(LightFlags::SKY) {
            &state.sky
        } else {
            return LightLevel::DARK;
        };
        values.get(&pos).copied().unwrap_or(LightLevel::DARK)
    }

    fn recalculate(&self, world: WorldId, pos: BlockPos, _kinds: LightFlags) -> ResultCode {
        let mut worlds = self.write();
        let Some(state) = worlds.get_mut(&world) else {
            return ResultCode::WorldNotAvailable;
        };
        if !state.loaded.contains(&pos.chunk()) {
            return ResultCode::RegionNotLoaded;
        }
        if state.dirty.is_empty() {
            return ResultCode::RecalculateNoChanges;
        }
        state.dirty.clear();
        ResultCode::Success
    }

    fn send_chunk_batch(&self, batch: &ChunkBatch) -> ResultCode {
        {
            let worlds = self.read();
            let Some(state) = worlds.get(&batch.world()) else {
                return ResultCode::WorldNotAvailable;
            };
            if !state.loaded.contains(&batch.chunk()) {
                return ResultCode::RegionNotLoaded;
            }
        }
        self.sent().push(SentBatch::from(batch));
        ResultCode::Success
    }
}
