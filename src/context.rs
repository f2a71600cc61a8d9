//! Wiring of handler, service, observer and engine.
//!
//! A [`RelightContext`] is built once per host and shared behind an `Arc`.
//! It owns the periodic background tasks and tears everything down in order
//! on [`RelightContext::shutdown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use log::{info, warn};

use crate::code::ResultCode;
use crate::config::EngineConfig;
use crate::engine::{LightEngine, TickReport};
use crate::error::{RelightResult, ServiceError};
use crate::handler::Handler;
use crate::light::{BlockPos, LightFlags, LightLevel, WorldId};
use crate::observer::ChunkObserver;
use crate::policy::{EditPolicy, SendPolicy};
use crate::request::Callback;
use crate::service::{BackgroundService, ScheduledTask, ThreadPoolService};

/// Entry point for hosts.
pub struct RelightContext {
    config: EngineConfig,
    handler: Arc<dyn Handler>,
    service: Arc<dyn BackgroundService>,
    observer: Arc<ChunkObserver>,
    engine: Arc<LightEngine>,
    tasks: Mutex<Vec<ScheduledTask>>,
    shut_down: AtomicBool,
}

impl RelightContext {
    /// Validates `config` and wires the components together. Nothing runs until [`RelightContext::start`].
    pub fn new(
        config: EngineConfig,
        handler: Arc<dyn Handler>,
        service: Arc<dyn BackgroundService>,
    ) -> RelightResult<Self> {
        config.validate()?;
        let observer = Arc::new(ChunkObserver::new(Arc::clone(&handler)));
        let engine = Arc::new(LightEngine::new(
            &config,
            Arc::clone(&handler),
            Arc::clone(&service),
            Arc::clone(&observer),
        ));
        Ok(Self {
            config,
            handler,
            service,
            observer,
            engine,
            tasks: Mutex::new(Vec::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    /// Like [`RelightContext::new`] with a [`ThreadPoolService`] sized from `config`.
    ///
    /// The calling thread becomes the host thread.
    pub fn with_thread_pool(config: EngineConfig, handler: Arc<dyn Handler>) -> RelightResult<Self> {
        config.validate()?;
        let service = ThreadPoolService::with_queue_capacity(config.core_pool_size, config.worker_queue_capacity)?;
        Self::new(config, handler, Arc::new(service))
    }

    fn tasks(&self) -> MutexGuard<'_, Vec<ScheduledTask>> {
        self.tasks.lock().unwrap_or_else(|poisoned| {
            warn!("relight context: recovered poisoned lock");
            poisoned.into_inner()
        })
    }

    /// Schedules the periodic queue drain and observer flush. Calling it again is a no-op.
    pub fn start(&self) -> RelightResult<()> {
        if self.is_shut_down() {
            return Err(ServiceError::ShutDown.into());
        }
        let mut tasks = self.tasks();
        if !tasks.is_empty() {
            return Ok(());
        }

        let engine = Arc::clone(&self.engine);
        let engine_period = self.config.engine_period();
        tasks.push(self.service.schedule_with_fixed_delay(
            "engine",
            engine_period,
            engine_period,
            Arc::new(move || {
                engine.run_tick();
            }),
        )?);

        let observer = Arc::clone(&self.observer);
        let observer_period = self.config.observer_period();
        tasks.push(self.service.schedule_with_fixed_delay(
            "observer",
            observer_period,
            observer_period,
            Arc::new(move || {
                observer.flush();
            }),
        )?);

        info!(
            "relight started: engine every {} ms, observer every {} ms, relight policy {}",
            engine_period.as_millis(),
            observer_period.as_millis(),
            self.config.relight_policy.name()
        );
        Ok(())
    }

    /// Must be called once per host tick from the host thread.
    pub fn host_tick(&self) {
        self.service.heartbeat();
        self.engine.on_host_tick();
    }

    /// Sets block light at `pos`, deferring every stage.
    pub fn set_light_level(&self, world: WorldId, pos: BlockPos, level: LightLevel) -> ResultCode {
        self.set_light_level_with(
            world,
            pos,
            level,
            LightFlags::BLOCK,
            EditPolicy::Deferred,
            SendPolicy::Deferred,
            None,
        )
    }

    /// Sets light at `pos` with explicit kinds, policies and callback.
    #[allow(clippy::too_many_arguments)]
    pub fn set_light_level_with(
        &self,
        world: WorldId,
        pos: BlockPos,
        level: LightLevel,
        kinds: LightFlags,
        edit: EditPolicy,
        send: SendPolicy,
        callback: Option<Callback>,
    ) -> ResultCode {
        if self.is_shut_down() {
            return ResultCode::Failed;
        }
        self.engine.set_light_level(world, pos, level, kinds, edit, send, callback)
    }

    /// Reads a light value, or `None` if the world is unavailable.
    #[must_use]
    pub fn get_light_level(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> Option<LightLevel> {
        self.engine.get_light_level(world, pos, kinds)
    }

    /// Writes a raw value without recalculating or sending.
    pub fn set_raw_light_level(&self, world: WorldId, pos: BlockPos, level: LightLevel, kinds: LightFlags) -> ResultCode {
        self.engine.set_raw_light_level(world, pos, level, kinds)
    }

    /// Recalculates lighting around `pos` immediately.
    pub fn recalculate_lighting(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> ResultCode {
        self.engine.recalculate_lighting(world, pos, kinds)
    }

    /// Drains the queues once on the calling thread.
    pub fn run_tick(&self) -> TickReport {
        self.engine.run_tick()
    }

    /// Flushes the observer on the calling thread.
    pub fn flush(&self) -> usize {
        self.observer.flush()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<LightEngine> {
        &self.engine
    }

    /// The observer.
    #[must_use]
    pub fn observer(&self) -> &Arc<ChunkObserver> {
        &self.observer
    }

    /// The handler.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn Handler> {
        &self.handler
    }

    /// The background service.
    #[must_use]
    pub fn service(&self) -> &Arc<dyn BackgroundService> {
        &self.service
    }

    /// Returns true once [`RelightContext::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Stops background tasks, runs every queued request, flushes and stops the service.
    ///
    /// Idempotent. Must not be called from inside a scheduled task.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        let tasks = std::mem::take(&mut *self.tasks());
        for task in tasks {
            task.cancel();
        }
        let drained = self.engine.shutdown();
        self.observer.shutdown();
        self.service.shutdown();
        info!("relight shut down ({drained} requests drained)");
    }
}

impl Drop for RelightContext {
    fn drop(&mut self) {
        self.shutdown();
    }
}
