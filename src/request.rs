//! Requests flowing through the edit → recalculate → send pipeline.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::code::ResultCode;
use crate::light::{BlockPos, LightFlags, LightLevel, WorldId};
use crate::policy::Resolution;

bitflags! {
    /// Remaining work on a request.
    ///
    /// A stage clears its own flag before acting and may set a successor flag.
    /// Single flags double as the stage identifier passed to [`ResultSink`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RequestFlags: u8 {
        /// Write the raw value.
        const EDIT = 1 << 0;
        /// Recalculate lighting now.
        const RECALCULATE = 1 << 1;
        /// Recalculate lighting on a later tick.
        const DEFERRED_RECALCULATE = 1 << 2;
        /// Send affected chunks right away, bypassing aggregation.
        const SEPARATE_SEND = 1 << 3;
        /// Send affected chunks through the aggregation observer.
        const COMBINED_SEND = 1 << 4;
        /// Send even when recalculation reports no changes.
        const FORCE_SEND = 1 << 5;
    }
}

/// Lowest request priority.
pub const LOW_PRIORITY: i32 = 0;
/// Baseline request priority.
pub const DEFAULT_PRIORITY: i32 = 5;
/// Priority of requests that must run before everything else.
pub const HIGH_PRIORITY: i32 = 10;

/// Receives the outcome of every stage a request passes through.
pub trait ResultSink: Send + Sync {
    /// Called once per stage transition with the stage flag and its result.
    fn on_result(&self, stage: RequestFlags, code: ResultCode);
}

impl<F> ResultSink for F
where
    F: Fn(RequestFlags, ResultCode) + Send + Sync,
{
    fn on_result(&self, stage: RequestFlags, code: ResultCode) {
        self(stage, code);
    }
}

/// Shared handle to a [`ResultSink`].
pub type Callback = Arc<dyn ResultSink>;

/// One unit of lighting work.
///
/// A request is owned by exactly one queue (or one in-flight stage) at a time;
/// handing it to the next stage moves it.
pub struct Request {
    priority: i32,
    flags: RequestFlags,
    world: WorldId,
    position: BlockPos,
    old_level: LightLevel,
    new_level: LightLevel,
    kinds: LightFlags,
    callback: Option<Callback>,
}

impl Request {
    /// Builds a request from a policy [`Resolution`].
    ///
    /// The resolution is the only way to obtain initial flags outside the crate.
    #[must_use]
    pub fn resolved(
        resolution: Resolution,
        world: WorldId,
        position: BlockPos,
        old_level: LightLevel,
        new_level: LightLevel,
        kinds: LightFlags,
        callback: Option<Callback>,
    ) -> Self {
        Self::new(
            resolution.priority,
            resolution.flags,
            world,
            position,
            old_level,
            new_level,
            kinds,
            callback,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        priority: i32,
        flags: RequestFlags,
        world: WorldId,
        position: BlockPos,
        old_level: LightLevel,
        new_level: LightLevel,
        kinds: LightFlags,
        callback: Option<Callback>,
    ) -> Self {
        Self {
            priority,
            flags,
            world,
            position,
            old_level,
            new_level,
            kinds,
            callback,
        }
    }

    /// Scheduling priority (higher drains first).
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    /// Remaining stage flags.
    #[must_use]
    pub const fn flags(&self) -> RequestFlags {
        self.flags
    }

    /// Target world.
    #[must_use]
    pub const fn world(&self) -> WorldId {
        self.world
    }

    /// Target block.
    #[must_use]
    pub const fn position(&self) -> BlockPos {
        self.position
    }

    /// Light level before the edit.
    #[must_use]
    pub const fn old_level(&self) -> LightLevel {
        self.old_level
    }

    /// Light level written by the edit.
    #[must_use]
    pub const fn new_level(&self) -> LightLevel {
        self.new_level
    }

    /// Light channels affected.
    #[must_use]
    pub const fn kinds(&self) -> LightFlags {
        self.kinds
    }

    /// Level used to size the affected neighborhood.
    ///
    /// The larger of old and new: shrinking a light must still clear cells it used to reach.
    #[must_use]
    pub fn affected_level(&self) -> LightLevel {
        self.old_level.max(self.new_level)
    }

    /// Returns true if `flag` is set.
    #[must_use]
    pub const fn has(&self, flag: RequestFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Returns true once no stage work remains.
    #[must_use]
    pub fn is_done(&self) -> bool {
        (self.flags - RequestFlags::FORCE_SEND).is_empty()
    }

    pub(crate) fn add_flag(&mut self, flag: RequestFlags) {
        self.flags.insert(flag);
    }

    /// Clears `flag` and reports whether it was set.
    pub(crate) fn take_flag(&mut self, flag: RequestFlags) -> bool {
        let was_set = self.flags.contains(flag);
        self.flags.remove(flag);
        was_set
    }

    pub(crate) fn report(&self, stage: RequestFlags, code: ResultCode) {
        if let Some(callback) = &self.callback {
            callback.on_result(stage, code);
        }
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("priority", &self.priority)
            .field("flags", &self.flags)
            .field("world", &self.world)
            .field("position", &self.position)
            .field("old_level", &self.old_level)
            .field("new_level", &self.new_level)
            .field("kinds", &self.kinds)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
