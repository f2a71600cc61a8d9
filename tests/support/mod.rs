#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use relight::{
    BackgroundService, BlockPos, Callback, ChunkBatch, ChunkPos, Handler, InMemoryHandler, LightFlags, LightLevel,
    RelightResult, RequestFlags, ResultCode, ScheduledTask, Task, WorldId,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Background service driven by hand: liveness is a switch and scheduled
/// tasks only run when the test asks.
#[derive(Default)]
pub struct ManualService {
    alive: AtomicBool,
    tasks: Mutex<Vec<(String, Task)>>,
    shut_down: AtomicBool,
}

impl ManualService {
    pub fn alive() -> Self {
        let service = Self::default();
        service.alive.store(true, Ordering::SeqCst);
        service
    }

    pub fn set_alive(&self, alive: bool) {
        self.alive.store(alive, Ordering::SeqCst);
    }

    pub fn scheduled_names(&self) -> Vec<String> {
        self.tasks.lock().unwrap().iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn run(&self, name: &str) {
        let task = self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, task)| Arc::clone(task))
            .unwrap_or_else(|| panic!("no task named {name}"));
        task();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

impl BackgroundService for ManualService {
    fn heartbeat(&self) {
        self.alive.store(true, Ordering::SeqCst);
    }

    fn can_execute_sync(&self, _max_time: Duration) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn is_host_thread(&self) -> bool {
        true
    }

    fn schedule_with_fixed_delay(
        &self,
        name: &str,
        _initial_delay: Duration,
        _delay: Duration,
        task: Task,
    ) -> RelightResult<ScheduledTask> {
        self.tasks.lock().unwrap().push((name.to_string(), task));
        Ok(ScheduledTask::inert(name))
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// In-memory handler with knobs for slow edits and no-op recalculations.
#[derive(Default)]
pub struct ScriptedHandler {
    pub inner: InMemoryHandler,
    edit_delay: Mutex<Duration>,
    no_changes: AtomicBool,
}

impl ScriptedHandler {
    pub fn set_edit_delay(&self, delay: Duration) {
        *self.edit_delay.lock().unwrap() = delay;
    }

    pub fn always_report_no_changes(&self, enabled: bool) {
        self.no_changes.store(enabled, Ordering::SeqCst);
    }
}

impl Handler for ScriptedHandler {
    fn is_world_available(&self, world: WorldId) -> bool {
        self.inner.is_world_available(world)
    }

    fn is_chunk_loaded(&self, world: WorldId, chunk: ChunkPos) -> bool {
        self.inner.is_chunk_loaded(world, chunk)
    }

    fn section_range(&self, world: WorldId) -> (i32, i32) {
        self.inner.section_range(world)
    }

    fn is_value_kind_supported(&self, world: WorldId, kinds: LightFlags) -> bool {
        self.inner.is_value_kind_supported(world, kinds)
    }

    fn set_raw_value(&self, world: WorldId, pos: BlockPos, level: LightLevel, kinds: LightFlags) -> ResultCode {
        let delay = *self.edit_delay.lock().unwrap();
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        self.inner.set_raw_value(world, pos, level, kinds)
    }

    fn get_raw_value(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> LightLevel {
        self.inner.get_raw_value(world, pos, kinds)
    }

    fn recalculate(&self, world: WorldId, pos: BlockPos, kinds: LightFlags) -> ResultCode {
        let code = self.inner.recalculate(world, pos, kinds);
        if self.no_changes.load(Ordering::SeqCst) && code.is_success() {
            return ResultCode::RecalculateNoChanges;
        }
        code
    }

    fn send_chunk_batch(&self, batch: &ChunkBatch) -> ResultCode {
        self.inner.send_chunk_batch(batch)
    }
}

/// Registers `name` with sections `0..=15` and loads chunks within `radius` of the origin.
pub fn add_world(handler: &InMemoryHandler, name: &str, radius: i32) -> WorldId {
    let world = WorldId::from_name(name);
    handler.add_world(world, 0, 15);
    for x in -radius..=radius {
        for z in -radius..=radius {
            handler.load_chunk(world, ChunkPos::new(x, z));
        }
    }
    world
}

pub type StageLog = Arc<Mutex<Vec<(RequestFlags, ResultCode)>>>;

pub fn recorder() -> (StageLog, Callback) {
    let log: StageLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let callback: Callback = Arc::new(move |stage: RequestFlags, code: ResultCode| {
        sink.lock().unwrap().push((stage, code));
    });
    (log, callback)
}

/// Callback that appends `tag` to `order` when the edit stage reports.
pub fn edit_order(order: &Arc<Mutex<Vec<u32>>>, tag: u32) -> Callback {
    let order = Arc::clone(order);
    Arc::new(move |stage: RequestFlags, _code: ResultCode| {
        if stage == RequestFlags::EDIT {
            order.lock().unwrap().push(tag);
        }
    })
}
