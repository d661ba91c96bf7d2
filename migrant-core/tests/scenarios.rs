//! End-to-end scenarios S1-S7 and the round-trip property, driven against
//! an in-memory mock `Source`/`Database` pair with versions {1, 3, 4, 5, 7}.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use migrant_core::{Database, DriverError, Engine, EngineConfig, MigrationPayload, Source, Version};

struct MockSource {
    versions: Vec<Version>,
}

impl MockSource {
    fn new() -> Self {
        MockSource {
            versions: vec![1, 3, 4, 5, 7],
        }
    }

    fn position(&self, version: Version) -> Option<usize> {
        self.versions.iter().position(|&v| v == version)
    }
}

#[async_trait]
impl Source for MockSource {
    async fn first(&self) -> Result<Option<Version>, DriverError> {
        Ok(self.versions.first().copied())
    }

    async fn next(&self, version: Version) -> Result<Option<Version>, DriverError> {
        Ok(self
            .position(version)
            .and_then(|i| self.versions.get(i + 1))
            .copied())
    }

    async fn prev(&self, version: Version) -> Result<Option<Version>, DriverError> {
        Ok(self
            .position(version)
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.versions.get(i))
            .copied())
    }

    async fn read_up(&self, version: Version) -> Result<Option<MigrationPayload>, DriverError> {
        if self.position(version).is_none() {
            return Ok(None);
        }
        let body = format!("up-{version}").into_bytes();
        Ok(Some(MigrationPayload::new(Cursor::new(body), format!("up_{version}"))))
    }

    async fn read_down(&self, version: Version) -> Result<Option<MigrationPayload>, DriverError> {
        if self.position(version).is_none() {
            return Ok(None);
        }
        let body = format!("down-{version}").into_bytes();
        Ok(Some(MigrationPayload::new(Cursor::new(body), format!("down_{version}"))))
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[derive(Default)]
struct MockDatabaseState {
    version: i64,
    locked: bool,
    lock_calls: u32,
    unlock_calls: u32,
    runs: Vec<(i64, Option<Vec<u8>>)>,
}

struct MockDatabase {
    state: Mutex<MockDatabaseState>,
}

impl MockDatabase {
    fn new() -> Self {
        MockDatabase {
            state: Mutex::new(MockDatabaseState {
                version: -1,
                ..Default::default()
            }),
        }
    }

    fn runs(&self) -> Vec<i64> {
        self.state.lock().unwrap().runs.iter().map(|(v, _)| *v).collect()
    }

    fn lock_unlock_counts(&self) -> (u32, u32) {
        let state = self.state.lock().unwrap();
        (state.lock_calls, state.unlock_calls)
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn version(&self) -> Result<Option<Version>, DriverError> {
        let v = self.state.lock().unwrap().version;
        Ok(if v < 0 { None } else { Some(v as Version) })
    }

    async fn run(&self, target_version: i64, body: Option<&[u8]>) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.runs.push((target_version, body.map(|b| b.to_vec())));
        state.version = target_version;
        Ok(())
    }

    async fn lock(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.locked = true;
        state.lock_calls += 1;
        Ok(())
    }

    async fn unlock(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.locked = false;
        state.unlock_calls += 1;
        Ok(())
    }

    async fn drop(&self) -> Result<(), DriverError> {
        let mut state = self.state.lock().unwrap();
        state.version = -1;
        state.runs.clear();
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn engine() -> (Engine, Arc<MockDatabase>) {
    let source: Arc<dyn Source> = Arc::new(MockSource::new());
    let database = Arc::new(MockDatabase::new());
    let engine = Engine::from_drivers(source, database.clone() as Arc<dyn Database>)
        .with_config(EngineConfig::new());
    (engine, database)
}

#[tokio::test]
async fn s1_up_applies_every_version_in_order() {
    let (engine, database) = engine();
    engine.up().await.unwrap();
    assert_eq!(database.runs(), vec![1, 3, 4, 5, 7]);
    assert_eq!(engine.version().await.unwrap(), 7);
}

#[tokio::test]
async fn s2_down_after_up_reverses_to_empty() {
    let (engine, database) = engine();
    engine.up().await.unwrap();
    engine.down().await.unwrap();
    assert_eq!(database.runs(), vec![1, 3, 4, 5, 7, 5, 4, 3, 1, -1]);
    let err = engine.version().await.unwrap_err();
    assert!(matches!(err.kind(), migrant_core::Kind::NilVersion));
}

#[tokio::test]
async fn s3_steps_two_from_empty_stops_at_third_version() {
    let (engine, database) = engine();
    engine.steps(2).await.unwrap();
    assert_eq!(database.runs(), vec![1, 3]);
    assert_eq!(engine.version().await.unwrap(), 3);
}

#[tokio::test]
async fn s4_steps_overrun_from_version_3_yields_short_limit() {
    let (engine, database) = engine();
    engine.migrate(3).await.unwrap();
    let err = engine.steps(10).await.unwrap_err();
    assert_eq!(database.runs(), vec![1, 3, 4, 5, 7]);
    assert_eq!(err.short_limit(), Some(7));
    assert_eq!(engine.version().await.unwrap(), 7);
}

#[tokio::test]
async fn s5_migrate_down_from_7_to_4() {
    let (engine, database) = engine();
    engine.migrate(7).await.unwrap();
    engine.migrate(4).await.unwrap();
    assert_eq!(database.runs(), vec![1, 3, 4, 5, 7, 5, 4]);
    assert_eq!(engine.version().await.unwrap(), 4);
}

#[tokio::test]
async fn s6_migrate_to_absent_version_is_not_exist() {
    let (engine, _database) = engine();
    let err = engine.migrate(9).await.unwrap_err();
    assert!(err.is_not_exist());
}

#[tokio::test]
async fn s7_up_when_already_at_latest_is_no_change() {
    let (engine, _database) = engine();
    engine.up().await.unwrap();
    let err = engine.up().await.unwrap_err();
    assert!(err.is_no_change());
}

#[tokio::test]
async fn lock_and_unlock_counts_match_after_every_operation() {
    let (engine, database) = engine();
    engine.up().await.unwrap();
    engine.down().await.unwrap();
    let _ = engine.up().await; // NoChange path still unlocks
    let (locks, unlocks) = database.lock_unlock_counts();
    assert_eq!(locks, unlocks);
    assert_eq!(locks, 3);
}

#[tokio::test]
async fn round_trip_up_then_down_returns_to_nil_version_with_palindromic_runs() {
    let (engine, database) = engine();
    engine.up().await.unwrap();
    let up_runs = database.runs();
    engine.down().await.unwrap();
    let all_runs = database.runs();
    let down_runs = &all_runs[up_runs.len()..];

    assert_eq!(down_runs.len(), up_runs.len());
    let mut expected: Vec<i64> = up_runs[..up_runs.len() - 1].iter().rev().copied().collect();
    expected.push(-1);
    assert_eq!(down_runs, expected.as_slice());

    let err = engine.version().await.unwrap_err();
    assert!(matches!(err.kind(), migrant_core::Kind::NilVersion));
}

#[tokio::test]
async fn graceful_stop_halts_after_in_flight_step_completes() {
    let (engine, database) = engine();
    engine.graceful_stop();
    engine.up().await.unwrap();
    assert!(database.runs().is_empty());
}

#[tokio::test]
async fn drop_invokes_driver_drop_under_the_lock() {
    let (engine, database) = engine();
    engine.up().await.unwrap();
    engine.drop().await.unwrap();
    assert_eq!(database.runs(), Vec::<i64>::new());
    let (locks, unlocks) = database.lock_unlock_counts();
    assert_eq!(locks, unlocks);
}
