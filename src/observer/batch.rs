//! Per-chunk record of sections awaiting an outbound light update.

use std::fmt;

use crate::light::{ChunkPos, LightFlags, WorldId};

/// Growable bitset indexed from zero.
#[derive(Clone, Default, PartialEq, Eq)]
struct SectionBits(Vec<u64>);

impl SectionBits {
    fn set(&mut self, index: usize) {
        let word = index / 64;
        if word >= self.0.len() {
            self.0.resize(word + 1, 0);
        }
        self.0[word] |= 1 << (index % 64);
    }

    fn get(&self, index: usize) -> bool {
        self.0
            .get(index / 64)
            .is_some_and(|word| word & (1 << (index % 64)) != 0)
    }

    fn clear(&mut self) {
        self.0.clear();
    }

    fn is_empty(&self) -> bool {
        self.0.iter().all(|word| *word == 0)
    }

    fn count(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }

    fn union(&mut self, other: &Self) {
        if other.0.len() > self.0.len() {
            self.0.resize(other.0.len(), 0);
        }
        for (word, theirs) in self.0.iter_mut().zip(&other.0) {
            *word |= theirs;
        }
    }
}

impl fmt::Debug for SectionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let set: Vec<usize> = (0..self.0.len() * 64).filter(|i| self.get(*i)).collect();
        f.debug_set().entries(set).finish()
    }
}

/// Sections of one chunk that need their sky and/or block light resent.
///
/// Section indices are absolute (`block_y >> 4`) and valid within
/// `[bottom_section, top_section]`; marks outside that range are ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkBatch {
    world: WorldId,
    chunk: ChunkPos,
    bottom_section: i32,
    top_section: i32,
    sky: SectionBits,
    block: SectionBits,
}

impl ChunkBatch {
    /// Creates an empty batch. `top_section` is clamped to at least `bottom_section`.
    #[must_use]
    pub fn new(world: WorldId, chunk: ChunkPos, bottom_section: i32, top_section: i32) -> Self {
        Self {
            world,
            chunk,
            bottom_section,
            top_section: top_section.max(bottom_section),
            sky: SectionBits::default(),
            block: SectionBits::default(),
        }
    }

    /// World the chunk belongs to.
    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    /// Chunk coordinate.
    #[must_use]
    pub const fn chunk(&self) -> ChunkPos {
        self.chunk
    }

    /// Inclusive section range `(bottom, top)`.
    #[must_use]
    pub const fn section_range(&self) -> (i32, i32) {
        (self.bottom_section, self.top_section)
    }

    fn index(&self, section_y: i32) -> Option<usize> {
        if section_y < self.bottom_section || section_y > self.top_section {
            return None;
        }
        usize::try_from(section_y - self.bottom_section).ok()
    }

    /// Marks one section dirty for the given kinds. Returns false if the section is out of range.
    pub fn mark_section(&mut self, kinds: LightFlags, section_y: i32) -> bool {
        let Some(index) = self.index(section_y) else {
            return false;
        };
        if kinds.contains(LightFlags::SKY) {
            self.sky.set(index);
        }
        if kinds.contains(LightFlags::BLOCK) {
            self.block.set(index);
        }
        true
    }

    /// Marks every section dirty for both kinds.
    pub fn mark_full(&mut self) {
        for section_y in self.bottom_section..=self.top_section {
            self.mark_section(LightFlags::SKY | LightFlags::BLOCK, section_y);
        }
    }

    /// Folds the dirty bits of `other` into this batch.
    ///
    /// Sections of `other` outside this batch's range are dropped.
    pub fn merge(&mut self, other: &Self) {
        if other.section_range() == self.section_range() {
            self.sky.union(&other.sky);
            self.block.union(&other.block);
            return;
        }
        for section_y in other.sky_sections() {
            self.mark_section(LightFlags::SKY, section_y);
        }
        for section_y in other.block_sections() {
            self.mark_section(LightFlags::BLOCK, section_y);
        }
    }

    /// Clears every dirty bit.
    pub fn clear(&mut self) {
        self.sky.clear();
        self.block.clear();
    }

    /// Returns true if no section is dirty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sky.is_empty() && self.block.is_empty()
    }

    /// Returns true if `section_y` is dirty for sky light.
    #[must_use]
    pub fn is_sky_dirty(&self, section_y: i32) -> bool {
        self.index(section_y).is_some_and(|i| self.sky.get(i))
    }

    /// Returns true if `section_y` is dirty for block light.
    #[must_use]
    pub fn is_block_dirty(&self, section_y: i32) -> bool {
        self.index(section_y).is_some_and(|i| self.block.get(i))
    }

    /// Dirty sky sections, ascending.
    pub fn sky_sections(&self) -> impl Iterator<Item = i32> + '_ {
        (self.bottom_section..=self.top_section).filter(|s| self.is_sky_dirty(*s))
    }

    /// Dirty block sections, ascending.
    pub fn block_sections(&self) -> impl Iterator<Item = i32> + '_ {
        (self.bottom_section..=self.top_section).filter(|s| self.is_block_dirty(*s))
    }

    /// Total number of dirty (section, kind) pairs.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.sky.count() + self.block.count()
    }
}
