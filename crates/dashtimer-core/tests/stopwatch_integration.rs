//! Integration tests for the stopwatch, its laps and the session archive.

mod common;

use std::sync::Arc;

use common::{Harness, T0};
use dashtimer_core::stopwatch::STOPWATCH_SNAPSHOT_KEY;
use dashtimer_core::{
    CoreError, Database, EngineContext, ManualClock, NoopDispatcher, StopwatchEngine,
    StopwatchStatus, ValidationError,
};

#[test]
fn test_lap_times_and_statistics() {
    let h = Harness::new();
    let mut sw = StopwatchEngine::load(h.ctx());
    sw.start();

    for (at, tick_every) in [(5_000, 250), (12_000, 500), (20_000, 1_000)] {
        let from = sw.elapsed_ms();
        for ms in (from..at).step_by(tick_every) {
            h.at(ms);
            sw.tick();
        }
        h.at(at);
        sw.record_lap();
    }

    let laps = sw.laps();
    let numbers: Vec<u32> = laps.iter().map(|l| l.lap_number).collect();
    let lap_times: Vec<u64> = laps.iter().map(|l| l.lap_time_ms).collect();
    let totals: Vec<u64> = laps.iter().map(|l| l.total_time_ms).collect();
    assert_eq!(numbers, vec![1, 2, 3]);
    assert_eq!(lap_times, vec![5_000, 7_000, 8_000]);
    assert_eq!(totals, vec![5_000, 12_000, 20_000]);

    assert_eq!(sw.fastest_lap().map(|l| l.lap_number), Some(1));
    assert_eq!(sw.slowest_lap().map(|l| l.lap_number), Some(3));
    assert_eq!(sw.average_lap_time_ms(), 6_667);
    assert_eq!(sw.view().display, "00:00:20.00");
}

#[test]
fn test_elapsed_never_decreases_while_running() {
    let h = Harness::new();
    let mut sw = StopwatchEngine::load(h.ctx());
    sw.start();
    let mut last = 0;
    for ms in [100, 100, 350, 2_000, 1_999, 5_000] {
        // The clock stepping backwards must not pull elapsed time back.
        h.at(ms);
        sw.tick();
        assert!(sw.elapsed_ms() >= last);
        last = sw.elapsed_ms();
    }
    assert_eq!(sw.elapsed_ms(), 5_000);
}

#[test]
fn test_save_with_nothing_fails_validation() {
    let h = Harness::new();
    let mut sw = StopwatchEngine::load(h.ctx());
    let err = sw.save_current_session("Sprint 1", "").unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::NothingToSave)
    ));
    assert!(sw.saved_sessions().is_empty());
}

#[test]
fn test_saved_session_survives_reset() {
    let h = Harness::new();
    let mut sw = StopwatchEngine::load(h.ctx());
    sw.start();
    h.at(400);
    sw.record_lap();
    h.at(1_000);
    sw.pause();

    sw.save_current_session("Sprint 1", "first try").unwrap();
    sw.reset_timer();

    assert_eq!(sw.elapsed_ms(), 0);
    assert!(sw.laps().is_empty());
    let saved = &sw.saved_sessions()[0];
    assert_eq!(saved.name, "Sprint 1");
    assert_eq!(saved.notes, "first try");
    assert_eq!(saved.duration_ms, 1_000);
    assert_eq!(saved.laps.len(), 1);
    assert_eq!(saved.laps[0].total_time_ms, 400);
    assert_eq!(saved.created_at.timestamp_millis(), (T0 + 1_000) as i64);
}

#[test]
fn test_store_failure_is_distinguishable_and_rolled_back() {
    let h = Harness::new();
    let mut sw = StopwatchEngine::load(h.ctx());
    sw.start();
    h.at(1_000);
    h.store.set_read_only(true);

    let err = sw.save_current_session("Sprint 1", "").unwrap_err();
    assert!(matches!(err, CoreError::Store(_)));
    assert!(sw.saved_sessions().is_empty());

    h.store.set_read_only(false);
    sw.save_current_session("Sprint 1", "").unwrap();
    assert_eq!(sw.saved_sessions().len(), 1);
}

#[test]
fn test_running_stopwatch_restores_from_database() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("dashtimer.db");
    let clock = ManualClock::new(T0);
    let ctx = |db: Arc<Database>| {
        EngineContext::new(Arc::new(clock.clone()), db, Arc::new(NoopDispatcher))
    };

    {
        let db = Arc::new(Database::open_at(&db_path).unwrap());
        let mut sw = StopwatchEngine::load(ctx(db));
        sw.start();
        clock.advance(3_000);
        sw.record_lap();
        clock.advance(2_000);
        sw.pause();
        sw.save_current_session("", "").unwrap();
        sw.resume();
        sw.shutdown();
    }

    clock.advance(60_000);
    let db = Arc::new(Database::open_at(&db_path).unwrap());
    assert!(db.kv_get(STOPWATCH_SNAPSHOT_KEY).unwrap().is_some());
    let mut sw = StopwatchEngine::load(ctx(db));
    assert_eq!(sw.status(), StopwatchStatus::Running);
    sw.restore();
    assert_eq!(sw.elapsed_ms(), 65_000);
    assert_eq!(sw.laps().len(), 1);
    assert_eq!(sw.saved_sessions().len(), 1);
    assert_eq!(sw.saved_sessions()[0].name, "Session 1");
}
