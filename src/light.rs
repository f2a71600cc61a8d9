//! Coordinates, identifiers and light values.
//!
//! A world is split horizontally into 16x16 chunks and vertically into
//! 16-block sections. Light is a value in `0..=15` carried on two independent
//! channels (block and sky).

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace used to derive world identifiers from world names.
const WORLD_NAMESPACE: Uuid = Uuid::from_u128(0x6c8f_1d3a_52b7_4e0c_9a41_7f2e_bd05_c3a9);

/// Stable world identifier.
///
/// Identifiers derived from the same name are always equal, so hosts that
/// address worlds by name can use [`WorldId::from_name`] on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorldId(Uuid);

impl WorldId {
    /// Creates a new random world ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Derives a world ID from a world name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        Self(Uuid::new_v5(&WORLD_NAMESPACE, name.as_bytes()))
    }

    /// Creates a world ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for WorldId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WorldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for WorldId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Absolute block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct BlockPos {
    /// X coordinate.
    pub x: i32,
    /// Y coordinate.
    pub y: i32,
    /// Z coordinate.
    pub z: i32,
}

impl BlockPos {
    /// Creates a block position.
    #[must_use]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Chunk containing this block.
    #[must_use]
    pub const fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// Index of the vertical section containing this block.
    #[must_use]
    pub const fn section_y(&self) -> i32 {
        self.y >> 4
    }

    /// Position inside the chunk/section, each component in `0..=15`.
    #[must_use]
    pub const fn local(&self) -> (i32, i32, i32) {
        (self.x & 15, self.y & 15, self.z & 15)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Horizontal chunk coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    /// Chunk X coordinate.
    pub x: i32,
    /// Chunk Z coordinate.
    pub z: i32,
}

impl ChunkPos {
    /// Creates a chunk position.
    #[must_use]
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Returns this chunk shifted by `(dx, dz)`.
    #[must_use]
    pub const fn offset(&self, dx: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.z + dz)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// A light value in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LightLevel(u8);

impl LightLevel {
    /// No light.
    pub const DARK: Self = Self(0);
    /// Maximum light.
    pub const MAX: Self = Self(15);

    /// Clamps any integer into the valid range.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn clamped(value: i32) -> Self {
        if value < 0 {
            Self(0)
        } else if value > 15 {
            Self(15)
        } else {
            Self(value as u8)
        }
    }

    /// Returns the value as `u8`.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Returns the value as `i32`.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    /// Returns true for level 0.
    #[must_use]
    pub const fn is_dark(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LightLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for LightLevel {
    fn from(value: u8) -> Self {
        Self::clamped(i32::from(value))
    }
}

bitflags! {
    /// Which light channel(s) an operation targets.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LightFlags: u8 {
        /// Light emitted by blocks.
        const BLOCK = 0b0000_0001;
        /// Light coming from the sky.
        const SKY = 0b0000_0010;
    }
}
