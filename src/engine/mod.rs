//! Tick-bounded execution of light requests.
//!
//! The engine owns three priority queues, one per stage. Work either runs
//! inline on the caller's thread (when the policy and the tick budget allow
//! it) or waits in a queue until [`LightEngine::run_tick`] drains it under a
//! time and request budget. Whatever does not fit in one tick stays queued for
//! the next; nothing is dropped.

mod budget;
mod queue;
mod stages;

pub use budget::{PenaltyClock, TickBudget};
pub use queue::{DrainStats, DrainStop, RequestQueue};

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::info;

use crate::code::ResultCode;
use crate::config::EngineConfig;
use crate::handler::Handler;
use crate::light::{BlockPos, LightFlags, LightLevel, WorldId};
use crate::observer::ChunkObserver;
use crate::policy::{resolve, EditPolicy, RelightPolicy, SendPolicy};
use crate::request::{Callback, Request};
use crate::service::BackgroundService;

/// Number of requests waiting in each queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PendingCounts {
    /// Waiting for their raw value to be written.
    pub edit: usize,
    /// Waiting for recalculation.
    pub recalculate: usize,
    /// Waiting to be handed to the observer.
    pub send: usize,
}

impl PendingCounts {
    /// Sum over all queues.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.edit + self.recalculate + self.send
    }
}

/// What one [`LightEngine::run_tick`] did to each queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Edit queue drain.
    pub edit: DrainStats,
    /// Recalculate queue drain.
    pub recalculate: DrainStats,
    /// Send queue drain.
    pub send: DrainStats,
}

impl TickReport {
    /// Requests processed across all queues.
    #[must_use]
    pub const fn processed(&self) -> usize {
        self.edit.processed + self.recalculate.processed + self.send.processed
    }
}

/// The three-stage request scheduler.
pub struct LightEngine {
    handler: Arc<dyn Handler>,
    service: Arc<dyn BackgroundService>,
    observer: Arc<ChunkObserver>,
    relight_policy: RelightPolicy,
    budget: TickBudget,
    penalty: PenaltyClock,
    edits: RequestQueue,
    recalculations: RequestQueue,
    sends: RequestQueue,
}

impl LightEngine {
    /// Creates an engine with empty queues.
    #[must_use]
    pub fn new(
        config: &EngineConfig,
        handler: Arc<dyn Handler>,
        service: Arc<dyn BackgroundService>,
        observer: Arc<ChunkObserver>,
    ) -> Self {
        Self {
            handler,
            service,
            observer,
            relight_policy: config.relight_policy,
            budget: config.budget(),
            penalty: PenaltyClock::new(config.host_tick_ms),
            edits: RequestQueue::new("edit"),
            recalculations: RequestQueue::new("recalculate"),
            sends: RequestQueue::new("send"),
        }
    }

    /// Handler every stage delegates to.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// Observer that receives combined sends.
    #[must_use]
    pub fn observer(&self) -> &Arc<ChunkObserver> {
        &self.observer
    }

    /// Engine-wide relight policy.
    #[must_use]
    pub const fn relight_policy(&self) -> RelightPolicy {
        self.relight_policy
    }

    /// Per-queue drain budget.
    #[must_use]
    pub const fn budget(&self) -> TickBudget {
        self.budget
    }

    /// Time still owed for past synchronous executions.
    #[must_use]
    pub fn penalty_debt(&self) -> Duration {
        self.penalty.debt()
    }

    /// Returns true unless the observer is mid-flush.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        !self.observer.is_busy()
    }

    /// Returns true if a request may run inline right now.
    #[must_use]
    pub fn can_run_sync_now(&self) -> bool {
        self.service.can_execute_sync(self.budget.max_time)
            && self.penalty.allows(self.budget.max_time)
            && self.can_execute()
    }

    /// Schedules a light change at `pos`.
    ///
    /// Returns [`ResultCode::Success`] when the edit ran inline and
    /// [`ResultCode::MovedToDeferred`] when it was queued. Per-stage outcomes
    /// go to `callback`.
    #[allow(clippy::too_many_arguments)]
    pub fn set_light_level(
        &self,
        world: WorldId,
        pos: BlockPos,
        level: LightLevel,
        kinds: LightFlags,
        edit: EditPolicy,
        send: SendPolicy,
        callback: Option<Callback>,
    ) -> ResultCode {
        if !self.handler.is_world_available(world) {
            return ResultCode::WorldNotAvailable;
        }
        if let Some(code) = self.check_kinds(world, kinds) {
            return code;
        }

        let old_level = self.handler.get_raw_value(world, pos, kinds);
        let sync = self.can_run_sync_now();
        let resolution = resolve(edit, send, self.relight_policy, sync);
        let request = Request::resolved(resolution, world, pos, old_level, level, kinds, callback);

        match edit {
            EditPolicy::ForceImmediate => {
                self.run_inline(request);
                ResultCode::Success
            }
            EditPolicy::Immediate if sync => {
                self.run_inline(request);
                ResultCode::Success
            }
            EditPolicy::Immediate | EditPolicy::Deferred => {
                self.notify_change_light_level(request);
                ResultCode::MovedToDeferred
            }
        }
    }

    fn check_kinds(&self, world: WorldId, kinds: LightFlags) -> Option<ResultCode> {
        if kinds.is_empty() {
            return Some(ResultCode::Failed);
        }
        if kinds.contains(LightFlags::SKY) && !self.handler.is_value_kind_supported(world, LightFlags::SKY) {
            return Some(ResultCode::SkyDataNotAvailable);
        }
        if kinds.contains(LightFlags::BLOCK) && !self.handler.is_value_kind_supported(world, LightFlags::BLOCK) {
            return Some(ResultCode::BlockDataNotAvailable);
        }
        None
    }

    fn run_inline(&self, request: Request) {
        let started = Instant::now();
        self.handle_edit(request);
        self.penalty.charge(started.elapsed());
    }

    /// Reads a light value, or `None` if the world is unavailable.
    #[must_use]
    pub fn get_light_level(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> Option<LightLevel> {
        self.handler
            .is_world_available(world)
            .then(|| self.handler.get_raw_value(world, pos, kinds))
    }

    /// Writes a raw value immediately, without recalculating or sending.
    pub fn set_raw_light_level(&self, world: WorldId, pos: BlockPos, level: LightLevel, kinds: LightFlags) -> ResultCode {
        if !self.handler.is_world_available(world) {
            return ResultCode::WorldNotAvailable;
        }
        self.handler.set_raw_value(world, pos, level, kinds)
    }

    /// Recalculates lighting around `pos` immediately.
    pub fn recalculate_lighting(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> ResultCode {
        if !self.handler.is_world_available(world) {
            return ResultCode::WorldNotAvailable;
        }
        self.handler.recalculate(world, pos, kinds)
    }

    /// Queues a request for the edit stage.
    pub fn notify_change_light_level(&self, request: Request) -> ResultCode {
        self.edits.push(request);
        ResultCode::Success
    }

    /// Queues a request for the recalculate stage.
    pub fn notify_recalculate(&self, request: Request) -> ResultCode {
        self.recalculations.push(request);
        ResultCode::Success
    }

    /// Queues a request for the send stage.
    pub fn notify_send(&self, request: Request) -> ResultCode {
        self.sends.push(request);
        ResultCode::Success
    }

    /// Drains each queue once within the tick budget.
    pub fn run_tick(&self) -> TickReport {
        let gate = || self.can_execute();
        let edit = self.edits.drain(&self.budget, gate, |r| self.handle_edit(r));
        let recalculate = self
            .recalculations
            .drain(&self.budget, gate, |r| self.handle_recalculate(r));
        let send = self.sends.drain(&self.budget, gate, |r| self.handle_send(r));
        TickReport {
            edit,
            recalculate,
            send,
        }
    }

    /// Pays back one host tick of synchronous-execution debt.
    pub fn on_host_tick(&self) {
        self.penalty.decay();
    }

    /// Requests waiting in each queue.
    #[must_use]
    pub fn pending(&self) -> PendingCounts {
        PendingCounts {
            edit: self.edits.len(),
            recalculate: self.recalculations.len(),
            send: self.sends.len(),
        }
    }

    /// Runs every queued request to completion, ignoring budgets.
    pub fn shutdown(&self) -> usize {
        let edit = self.edits.drain_all(|r| self.handle_edit(r));
        let recalculate = self.recalculations.drain_all(|r| self.handle_recalculate(r));
        let send = self.sends.drain_all(|r| self.handle_send(r));
        let total = edit + recalculate + send;
        info!("light engine shut down: drained {edit} edits, {recalculate} recalculations, {send} sends");
        total
    }
}
