use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use club_dues::{dues_core::FixedClock, Config, DuesEngine, JsonClubStorage};
use once_cell::sync::Lazy;
use tempfile::TempDir;

/// Holds TempDir guards so temporary folders live for the duration of the test run.
static TEST_DIRS: Lazy<Mutex<Vec<TempDir>>> = Lazy::new(|| Mutex::new(Vec::new()));

pub struct TestEnv {
    pub engine: DuesEngine,
    pub clock: Arc<FixedClock>,
    pub config: Config,
}

/// An engine over JSON storage in a fresh directory, clock at 2024-03-01 09:00 UTC.
pub fn setup_test_env(configure: impl FnOnce(&mut Config)) -> TestEnv {
    let temp = TempDir::new().expect("create temp dir");
    let base = temp.path().to_path_buf();
    TEST_DIRS.lock().expect("lock temp dir registry").push(temp);

    let mut config = Config::default().with_data_root(base.join("data"));
    configure(&mut config);
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()));
    let storage = Arc::new(JsonClubStorage::new(base.join("data")));
    let engine = DuesEngine::with_storage(config.clone(), storage, clock.clone());
    TestEnv {
        engine,
        clock,
        config,
    }
}
