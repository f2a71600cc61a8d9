//! The host-side lighting capability.
//!
//! The scheduler never computes light itself. Reading and writing raw values,
//! running the propagation algorithm and pushing chunk updates to clients are
//! all delegated to a [`Handler`] chosen when the context is built.
//!
//! Implementations must be safe to call from any thread; the scheduler holds
//! no lock of its own while a handler method runs.

mod memory;

pub use memory::{InMemoryHandler, SentBatch};

use crate::code::ResultCode;
use crate::light::{BlockPos, ChunkPos, LightFlags, LightLevel, WorldId};
use crate::observer::{affected_batches, ChunkBatch};

/// Physical light access for one host.
pub trait Handler: Send + Sync {
    /// Returns true if `world` exists and can be edited.
    fn is_world_available(&self, world: WorldId) -> bool;

    /// Returns true if `chunk` is loaded in `world`.
    fn is_chunk_loaded(&self, world: WorldId, chunk: ChunkPos) -> bool;

    /// Inclusive `(bottom, top)` section index range of `world`.
    fn section_range(&self, world: WorldId) -> (i32, i32);

    /// Returns true if `section_y` lies inside the world's section range.
    fn is_valid_section(&self, world: WorldId, section_y: i32) -> bool {
        let (bottom, top) = self.section_range(world);
        (bottom..=top).contains(&section_y)
    }

    /// Returns true if every channel in `kinds` is stored for `world`.
    fn is_value_kind_supported(&self, world: WorldId, kinds: LightFlags) -> bool;

    /// Writes a raw light value without propagating it.
    fn set_raw_value(&self, world: WorldId, pos: BlockPos, level: LightLevel, kinds: LightFlags) -> ResultCode;

    /// Reads a raw light value. Block light wins when both kinds are requested.
    fn get_raw_value(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> LightLevel;

    /// Propagates pending light changes around `pos`.
    ///
    /// Returns [`ResultCode::RecalculateNoChanges`] when there was nothing to do.
    fn recalculate(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> ResultCode;

    /// Creates an empty batch for `chunk`.
    fn create_chunk_batch(&self, world: WorldId, chunk: ChunkPos) -> ChunkBatch {
        let (bottom, top) = self.section_range(world);
        ChunkBatch::new(world, chunk, bottom, top)
    }

    /// Batches for every chunk a light of `level` at `pos` can reach.
    fn collect_affected_regions(
        &self,
        world: WorldId,
        pos: BlockPos,
        level: LightLevel,
        kinds: LightFlags,
    ) -> Vec<ChunkBatch> {
        affected_batches(self, world, pos, level, kinds)
    }

    /// Sends the dirty sections of one chunk to whoever is watching it.
    fn send_chunk_batch(&self, batch: &ChunkBatch) -> ResultCode;
}
