//! Wire-stable result codes.
//!
//! Every stage of a request reports one of these codes through its callback.
//! The integer values are part of the external contract and must never change.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome of a single operation or request stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i32)]
pub enum ResultCode {
    /// The task has been successfully completed.
    Success = 0,
    /// The request was queued and will run on a later tick.
    MovedToDeferred = 1,
    /// The task has failed.
    Failed = -1,
    /// The target world is not available.
    WorldNotAvailable = -2,
    /// Recalculation found nothing to change.
    RecalculateNoChanges = -3,
    /// Sky light data is not available in the target world.
    SkyDataNotAvailable = -4,
    /// Block light data is not available in the target world.
    BlockDataNotAvailable = -5,
    /// The operation is not implemented by the handler.
    NotImplemented = -6,
    /// The target region is not loaded.
    RegionNotLoaded = -7,
}

impl ResultCode {
    /// All codes, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Success,
        Self::MovedToDeferred,
        Self::Failed,
        Self::WorldNotAvailable,
        Self::RecalculateNoChanges,
        Self::SkyDataNotAvailable,
        Self::BlockDataNotAvailable,
        Self::NotImplemented,
        Self::RegionNotLoaded,
    ];

    /// Returns the wire value.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    /// Parses a wire value, rejecting unknown codes.
    #[must_use]
    pub const fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Success),
            1 => Some(Self::MovedToDeferred),
            -1 => Some(Self::Failed),
            -2 => Some(Self::WorldNotAvailable),
            -3 => Some(Self::RecalculateNoChanges),
            -4 => Some(Self::SkyDataNotAvailable),
            -5 => Some(Self::BlockDataNotAvailable),
            -6 => Some(Self::NotImplemented),
            -7 => Some(Self::RegionNotLoaded),
            _ => None,
        }
    }

    /// Returns true for [`ResultCode::Success`].
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true for outcomes that completed without doing anything.
    ///
    /// These are not failures and downstream stages must not treat them as such.
    #[must_use]
    pub const fn is_no_op(self) -> bool {
        matches!(self, Self::RecalculateNoChanges)
    }

    /// Returns true when the handler lacks the capability rather than failing transiently.
    #[must_use]
    pub const fn is_unsupported(self) -> bool {
        matches!(
            self,
            Self::SkyDataNotAvailable | Self::BlockDataNotAvailable | Self::NotImplemented
        )
    }

    /// Returns true for precondition failures (world or region unavailable).
    #[must_use]
    pub const fn is_precondition_failure(self) -> bool {
        matches!(self, Self::WorldNotAvailable | Self::RegionNotLoaded)
    }

    /// Returns a short stable identifier suitable for logging.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::MovedToDeferred => "MOVED_TO_DEFERRED",
            Self::Failed => "FAILED",
            Self::WorldNotAvailable => "WORLD_NOT_AVAILABLE",
            Self::RecalculateNoChanges => "RECALCULATE_NO_CHANGES",
            Self::SkyDataNotAvailable => "SKY_DATA_NOT_AVAILABLE",
            Self::BlockDataNotAvailable => "BLOCK_DATA_NOT_AVAILABLE",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::RegionNotLoaded => "REGION_NOT_LOADED",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_i32())
    }
}

impl From<ResultCode> for i32 {
    fn from(code: ResultCode) -> Self {
        code.as_i32()
    }
}
