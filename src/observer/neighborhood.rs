//! The 3x3x3 section neighborhood reached by a light change.

use crate::handler::Handler;
use crate::light::{BlockPos, ChunkPos, LightFlags, LightLevel, WorldId};

use super::batch::ChunkBatch;

/// Light spent crossing from `local` (a coordinate in `0..=15`) to the
/// neighboring section in direction `dir`.
///
/// `0` stays in the same section and costs nothing; `-1` costs `local + 1`;
/// `+1` costs `16 - local`.
#[must_use]
pub const fn delta_light(local: i32, dir: i32) -> i32 {
    match dir {
        0 => 0,
        d if d < 0 => local + 1,
        _ => 16 - local,
    }
}

/// Calls `visit(chunk, section_y)` for every section a light of `level` at
/// `pos` can reach.
///
/// Unloaded chunks and sections outside the world's range are skipped.
pub fn for_each_affected_section<H, F>(handler: &H, world: WorldId, pos: BlockPos, level: LightLevel, mut visit: F)
where
    H: Handler + ?Sized,
    F: FnMut(ChunkPos, i32),
{
    let value = level.as_i32();
    let (local_x, local_y, local_z) = pos.local();
    let origin = pos.chunk();
    let origin_section = pos.section_y();

    for dx in -1..=1 {
        let lx = value - delta_light(local_x, dx);
        if lx <= 0 {
            continue;
        }
        for dz in -1..=1 {
            let lz = lx - delta_light(local_z, dz);
            if lz <= 0 {
                continue;
            }
            let chunk = origin.offset(dx, dz);
            if !handler.is_chunk_loaded(world, chunk) {
                continue;
            }
            for dy in -1..=1 {
                let section_y = origin_section + dy;
                if lz > delta_light(local_y, dy) && handler.is_valid_section(world, section_y) {
                    visit(chunk, section_y);
                }
            }
        }
    }
}

/// Builds one batch per affected chunk, each created through
/// [`Handler::create_chunk_batch`].
pub fn affected_batches<H>(
    handler: &H,
    world: WorldId,
    pos: BlockPos,
    level: LightLevel,
    kinds: LightFlags,
) -> Vec<ChunkBatch>
where
    H: Handler + ?Sized,
{
    let mut batches: Vec<ChunkBatch> = Vec::new();
    for_each_affected_section(handler, world, pos, level, |chunk, section_y| {
        let index = match batches.iter().position(|b| b.chunk() == chunk) {
            Some(index) => index,
            None => {
                batches.push(handler.create_chunk_batch(world, chunk));
                batches.len() - 1
            }
        };
        batches[index].mark_section(kinds, section_y);
    });
    batches
}
