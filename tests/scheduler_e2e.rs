mod support;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use relight::{
    resolve, BlockPos, ChunkObserver, DrainStop, EditPolicy, EngineConfig, Handler, LightEngine, LightFlags,
    LightLevel, RelightPolicy, RequestFlags, ResultCode, SendPolicy, WorldId,
};

use support::{add_world, edit_order, init_logging, recorder, ManualService, ScriptedHandler};

struct Fixture {
    handler: Arc<ScriptedHandler>,
    service: Arc<ManualService>,
    engine: Arc<LightEngine>,
    world: WorldId,
}

fn fixture(config: &EngineConfig, service: ManualService) -> Fixture {
    init_logging();
    let handler = Arc::new(ScriptedHandler::default());
    let world = add_world(&handler.inner, "scheduler", 2);
    let service = Arc::new(service);
    let observer = Arc::new(ChunkObserver::new(handler.clone()));
    let engine = Arc::new(LightEngine::new(config, handler.clone(), service.clone(), observer));
    Fixture {
        handler,
        service,
        engine,
        world,
    }
}

#[test]
fn higher_priority_edits_run_first() {
    let f = fixture(&EngineConfig::default(), ManualService::default());
    let order = Arc::new(Mutex::new(Vec::new()));

    // Deferred + deferred send resolves to priority 5, deferred + immediate send to 6.
    f.engine.set_light_level(
        f.world,
        BlockPos::new(1, 1, 1),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Deferred,
        SendPolicy::Deferred,
        Some(edit_order(&order, 5)),
    );
    f.engine.set_light_level(
        f.world,
        BlockPos::new(2, 2, 2),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Deferred,
        SendPolicy::Immediate,
        Some(edit_order(&order, 6)),
    );

    f.engine.run_tick();
    assert_eq!(*order.lock().unwrap(), vec![6, 5]);
}

#[test]
fn drain_processes_exactly_the_request_budget() {
    let config = EngineConfig {
        max_requests_per_tick: 4,
        ..EngineConfig::default()
    };
    let f = fixture(&config, ManualService::default());
    for x in 0..10 {
        let code = f.engine.set_light_level(
            f.world,
            BlockPos::new(x, 0, 0),
            LightLevel::MAX,
            LightFlags::BLOCK,
            EditPolicy::Deferred,
            SendPolicy::Deferred,
            None,
        );
        assert_eq!(code, ResultCode::MovedToDeferred);
    }

    let report = f.engine.run_tick();
    assert_eq!(report.edit.processed, 4);
    assert_eq!(report.edit.stop, DrainStop::CountBudget);
    assert_eq!(f.engine.pending().edit, 6);

    let mut ticks = 1;
    while f.engine.pending().total() > 0 {
        f.engine.run_tick();
        ticks += 1;
        assert!(ticks < 10, "queues never drained");
    }
    assert_eq!(ticks, 3);
}

#[test]
fn repeating_the_same_value_reports_no_changes() {
    let f = fixture(&EngineConfig::default(), ManualService::default());
    let pos = BlockPos::new(4, 4, 4);

    let (_, first) = recorder();
    f.engine.set_light_level(
        f.world,
        pos,
        LightLevel::clamped(9),
        LightFlags::BLOCK,
        EditPolicy::ForceImmediate,
        SendPolicy::Immediate,
        Some(first),
    );
    let sent_after_first = f.handler.inner.sent_batches().len();
    assert!(sent_after_first > 0);

    let (log, second) = recorder();
    f.engine.set_light_level(
        f.world,
        pos,
        LightLevel::clamped(9),
        LightFlags::BLOCK,
        EditPolicy::ForceImmediate,
        SendPolicy::Immediate,
        Some(second),
    );
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (RequestFlags::EDIT, ResultCode::Success),
            (RequestFlags::RECALCULATE, ResultCode::RecalculateNoChanges),
        ]
    );
    assert!(!ResultCode::RecalculateNoChanges.is_success());
    assert!(ResultCode::RecalculateNoChanges.is_no_op());
    assert_eq!(f.handler.inner.sent_batches().len(), sent_after_first);
}

#[test]
fn removing_light_is_sent_even_without_changes() {
    let f = fixture(&EngineConfig::default(), ManualService::default());
    let pos = BlockPos::new(8, 8, 8);
    f.engine
        .set_raw_light_level(f.world, pos, LightLevel::clamped(12), LightFlags::BLOCK);
    f.handler.always_report_no_changes(true);

    let (log, callback) = recorder();
    let code = f.engine.set_light_level(
        f.world,
        pos,
        LightLevel::DARK,
        LightFlags::BLOCK,
        EditPolicy::ForceImmediate,
        SendPolicy::Immediate,
        Some(callback),
    );
    assert_eq!(code, ResultCode::Success);
    assert_eq!(
        *log.lock().unwrap(),
        vec![
            (RequestFlags::EDIT, ResultCode::Success),
            (RequestFlags::RECALCULATE, ResultCode::RecalculateNoChanges),
            (RequestFlags::SEPARATE_SEND, ResultCode::Success),
        ]
    );
    // The old level sizes the neighborhood, so the cleared light reaches neighbors too.
    assert!(f.handler.inner.sent_batches().len() > 1);
}

#[test]
fn deferred_removal_reaches_the_observer() {
    let f = fixture(&EngineConfig::default(), ManualService::default());
    let pos = BlockPos::new(8, 8, 8);
    f.engine
        .set_raw_light_level(f.world, pos, LightLevel::clamped(12), LightFlags::BLOCK);
    f.handler.always_report_no_changes(true);

    let (log, callback) = recorder();
    f.engine.set_light_level(
        f.world,
        pos,
        LightLevel::DARK,
        LightFlags::BLOCK,
        EditPolicy::Deferred,
        SendPolicy::Deferred,
        Some(callback),
    );
    f.engine.run_tick();

    assert!(log
        .lock()
        .unwrap()
        .contains(&(RequestFlags::COMBINED_SEND, ResultCode::Success)));
    assert!(f.engine.observer().pending_chunks() > 0);
}

#[test]
fn scenario_deferred_everything() {
    let resolution = resolve(EditPolicy::Deferred, SendPolicy::Deferred, RelightPolicy::Deferred, false);
    assert_eq!(
        resolution.flags,
        RequestFlags::EDIT | RequestFlags::DEFERRED_RECALCULATE | RequestFlags::COMBINED_SEND
    );
    assert_eq!(resolution.priority, 5);

    let f = fixture(&EngineConfig::default(), ManualService::default());
    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(0, 0, 0),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Deferred,
        SendPolicy::Deferred,
        None,
    );
    assert_eq!(code, ResultCode::MovedToDeferred);
    assert_eq!(f.engine.pending().edit, 1);
}

#[test]
fn scenario_force_immediate_runs_inline() {
    for send in [SendPolicy::Immediate, SendPolicy::Deferred] {
        for relight in [RelightPolicy::Forward, RelightPolicy::Deferred] {
            let resolution = resolve(EditPolicy::ForceImmediate, send, relight, false);
            assert_eq!(
                resolution.flags,
                RequestFlags::EDIT | RequestFlags::RECALCULATE | RequestFlags::SEPARATE_SEND
            );
            assert_eq!(resolution.priority, 10);
        }
    }

    // The host is not alive, yet the edit still runs on this thread.
    let f = fixture(&EngineConfig::default(), ManualService::default());
    let (log, callback) = recorder();
    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(5, 5, 5),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::ForceImmediate,
        SendPolicy::Deferred,
        Some(callback),
    );
    assert_eq!(code, ResultCode::Success);
    assert_eq!(log.lock().unwrap().len(), 3);
    assert_eq!(f.engine.pending().total(), 0);
}

#[test]
fn scenario_penalty_denies_sync_until_it_decays() {
    let config = EngineConfig {
        max_time_ms_per_tick: 10,
        host_tick_ms: 5,
        relight_policy: RelightPolicy::Forward,
        ..EngineConfig::default()
    };
    let f = fixture(&config, ManualService::alive());
    assert!(f.engine.can_run_sync_now());

    f.handler.set_edit_delay(Duration::from_millis(15));
    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(1, 1, 1),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Immediate,
        SendPolicy::Deferred,
        None,
    );
    assert_eq!(code, ResultCode::Success);
    assert!(f.engine.penalty_debt() >= Duration::from_millis(15));
    f.handler.set_edit_delay(Duration::ZERO);

    // Denied this tick...
    assert!(!f.engine.can_run_sync_now());
    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(2, 1, 1),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Immediate,
        SendPolicy::Deferred,
        None,
    );
    assert_eq!(code, ResultCode::MovedToDeferred);

    // ...and the next.
    f.engine.on_host_tick();
    assert!(!f.engine.can_run_sync_now());

    let mut ticks = 1;
    while !f.engine.can_run_sync_now() {
        f.engine.on_host_tick();
        ticks += 1;
        assert!(ticks < 50, "penalty never decayed");
    }
    assert!(f.engine.penalty_debt() < Duration::from_millis(10));

    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(3, 1, 1),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Immediate,
        SendPolicy::Deferred,
        None,
    );
    assert_eq!(code, ResultCode::Success);
}

#[test]
fn stalled_host_forces_deferral() {
    let config = EngineConfig {
        relight_policy: RelightPolicy::Forward,
        ..EngineConfig::default()
    };
    let f = fixture(&config, ManualService::alive());
    f.service.set_alive(false);

    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(1, 1, 1),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Immediate,
        SendPolicy::Immediate,
        None,
    );
    assert_eq!(code, ResultCode::MovedToDeferred);
}

#[test]
fn concurrent_submitters_are_all_processed() {
    let f = fixture(&EngineConfig::default(), ManualService::default());
    let edits = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for t in 0..4u32 {
        let engine = Arc::clone(&f.engine);
        let edits = Arc::clone(&edits);
        let world = f.world;
        handles.push(thread::spawn(move || {
            for i in 0..50u32 {
                let x = i32::try_from(t * 50 + i).unwrap() % 32 - 16;
                engine.set_light_level(
                    world,
                    BlockPos::new(x, 10, 0),
                    LightLevel::clamped(7),
                    LightFlags::BLOCK,
                    EditPolicy::Deferred,
                    SendPolicy::Deferred,
                    Some(edit_order(&edits, t * 50 + i)),
                );
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(f.engine.pending().edit, 200);
    while f.engine.pending().total() > 0 {
        f.engine.run_tick();
    }
    let mut seen = edits.lock().unwrap().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..200).collect::<Vec<_>>());
    assert!(f.handler.is_world_available(f.world));
}

#[test]
fn fast_inline_edits_still_accumulate_penalty() {
    let config = EngineConfig {
        max_time_ms_per_tick: 1,
        ..EngineConfig::default()
    };
    let f = fixture(&config, ManualService::alive());

    let mut inline = 0u32;
    while f.engine.can_run_sync_now() {
        let code = f.engine.set_light_level(
            f.world,
            BlockPos::new(i32::try_from(inline % 16).unwrap(), 2, 2),
            LightLevel::clamped(i32::try_from(inline % 15).unwrap() + 1),
            LightFlags::BLOCK,
            EditPolicy::Immediate,
            SendPolicy::Deferred,
            None,
        );
        assert_eq!(code, ResultCode::Success);
        inline += 1;
        assert!(inline < 1_000_000, "sub-millisecond runs never added debt");
    }
    assert!(f.engine.penalty_debt() >= Duration::from_millis(1));

    let code = f.engine.set_light_level(
        f.world,
        BlockPos::new(3, 3, 3),
        LightLevel::MAX,
        LightFlags::BLOCK,
        EditPolicy::Immediate,
        SendPolicy::Deferred,
        None,
    );
    assert_eq!(code, ResultCode::MovedToDeferred);
}
