use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use analysis_core::{Clock, SystemClock};

use crate::MonitorError;

/// `date (YYYY-MM-DD) -> rule id -> sent`.
pub type AlertState = BTreeMap<String, BTreeMap<String, bool>>;

pub trait AlertStateStore: Send + Sync {
    fn load(&self) -> Result<AlertState, MonitorError>;
    fn save(&self, state: &AlertState) -> Result<(), MonitorError>;
}

/// Whole-file JSON store. A missing file is an empty state.
#[derive(Debug, Clone)]
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AlertStateStore for JsonFileStateStore {
    fn load(&self) -> Result<AlertState, MonitorError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AlertState::new()),
            Err(e) => return Err(MonitorError::Persistence(format!("{}: {}", self.path.display(), e))),
        };
        if text.trim().is_empty() {
            return Ok(AlertState::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| MonitorError::Persistence(format!("{}: {}", self.path.display(), e)))
    }

    fn save(&self, state: &AlertState) -> Result<(), MonitorError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| MonitorError::Persistence(e.to_string()))?;
        }
        let json = serde_json::to_string_pretty(state).map_err(|e| MonitorError::Persistence(e.to_string()))?;
        fs::write(&self.path, json)
            .map_err(|e| MonitorError::Persistence(format!("{}: {}", self.path.display(), e)))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStateStore {
    state: Mutex<AlertState>,
    fail_saves: bool,
}

impl MemoryStateStore {
    pub fn new(state: AlertState) -> Self {
        Self {
            state: Mutex::new(state),
            fail_saves: false,
        }
    }

    /// A store whose every save fails, for exercising the in-memory fallback.
    pub fn read_only() -> Self {
        Self {
            state: Mutex::new(AlertState::new()),
            fail_saves: true,
        }
    }

    pub fn snapshot(&self) -> AlertState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl AlertStateStore for MemoryStateStore {
    fn load(&self) -> Result<AlertState, MonitorError> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &AlertState) -> Result<(), MonitorError> {
        if self.fail_saves {
            return Err(MonitorError::Persistence("store is read-only".to_string()));
        }
        let mut guard = self
            .state
            .lock()
            .map_err(|_| MonitorError::Persistence("state lock poisoned".to_string()))?;
        *guard = state.clone();
        Ok(())
    }
}

/// At-most-once-per-day gate for rule notifications.
///
/// State is read from the store on first use and written back in full after
/// every mark. A failed write is logged and the in-memory state stays
/// authoritative for the rest of the process. If the initial read fails the
/// store is never written, so dates already on disk are not lost.
pub struct DailyDedup {
    store: Arc<dyn AlertStateStore>,
    clock: Arc<dyn Clock>,
    state: AlertState,
    loaded: bool,
    persist: bool,
}

impl DailyDedup {
    pub fn new(store: Arc<dyn AlertStateStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            state: AlertState::new(),
            loaded: false,
            persist: true,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn load(&mut self) {
        if self.loaded {
            return;
        }
        self.loaded = true;
        match self.store.load() {
            Ok(state) => self.state = state,
            Err(e) => {
                self.persist = false;
                tracing::error!(
                    "Could not load alert state, dedup stays in memory for this run: {}",
                    e
                );
            }
        }
    }

    fn today_key(&self) -> String {
        self.clock.today().format("%Y-%m-%d").to_string()
    }

    /// Whether `rule_id` was already sent today, without marking it.
    pub fn was_sent_today(&mut self, rule_id: &str) -> bool {
        self.load();
        let today = self.today_key();
        self.state
            .get(&today)
            .and_then(|rules| rules.get(rule_id))
            .copied()
            .unwrap_or(false)
    }

    /// True the first time a rule is asked about on a calendar day, false after.
    /// A true answer marks the rule and persists the state.
    pub fn should_send(&mut self, rule_id: &str) -> bool {
        if self.was_sent_today(rule_id) {
            return false;
        }

        let today = self.today_key();
        self.state
            .entry(today)
            .or_default()
            .insert(rule_id.to_string(), true);

        if self.persist {
            if let Err(e) = self.store.save(&self.state) {
                tracing::error!("Failed to persist alert state: {}", e);
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::FixedClock;
    use chrono::NaiveDate;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn test_once_per_day() {
        let clock = Arc::new(FixedClock::new(day(14)));
        let mut dedup = DailyDedup::new(Arc::new(MemoryStateStore::default())).with_clock(clock.clone());

        assert!(dedup.should_send("rule_a"));
        assert!(!dedup.should_send("rule_a"));
        assert!(dedup.should_send("rule_b"));

        clock.advance_days(1);
        assert!(dedup.should_send("rule_a"));
        assert!(!dedup.should_send("rule_a"));
    }

    #[test]
    fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("alert_state.json");
        let clock = Arc::new(FixedClock::new(day(14)));

        let mut first = DailyDedup::new(Arc::new(JsonFileStateStore::new(&path))).with_clock(clock.clone());
        assert!(first.should_send("volatility_spike"));

        let mut second = DailyDedup::new(Arc::new(JsonFileStateStore::new(&path))).with_clock(clock.clone());
        assert!(!second.should_send("volatility_spike"));
        assert!(second.should_send("broad_selloff"));

        let saved: AlertState = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved["2025-03-14"]["volatility_spike"], true);
        assert_eq!(saved["2025-03-14"]["broad_selloff"], true);
    }

    #[test]
    fn test_old_dates_are_kept() {
        let mut initial = AlertState::new();
        initial
            .entry("2025-03-13".to_string())
            .or_default()
            .insert("rule_a".to_string(), true);
        let store = Arc::new(MemoryStateStore::new(initial));
        let mut dedup = DailyDedup::new(store.clone()).with_clock(Arc::new(FixedClock::new(day(14))));

        assert!(dedup.should_send("rule_a"));
        let state = store.snapshot();
        assert_eq!(state.len(), 2);
        assert!(state["2025-03-13"]["rule_a"]);
    }

    #[test]
    fn test_save_failure_keeps_memory_state() {
        let mut dedup = DailyDedup::new(Arc::new(MemoryStateStore::read_only()))
            .with_clock(Arc::new(FixedClock::new(day(14))));
        assert!(dedup.should_send("rule_a"));
        assert!(!dedup.should_send("rule_a"));
    }

    #[test]
    fn test_unreadable_state_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alert_state.json");
        fs::write(&path, "{\"2025-03-13\": {\"rule_a\": tru").unwrap();

        let mut dedup = DailyDedup::new(Arc::new(JsonFileStateStore::new(&path)))
            .with_clock(Arc::new(FixedClock::new(day(14))));
        assert!(dedup.should_send("rule_a"));
        assert!(!dedup.should_send("rule_a"));

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "{\"2025-03-13\": {\"rule_a\": tru"
        );
    }

    #[test]
    fn test_missing_and_empty_files_are_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let missing = JsonFileStateStore::new(dir.path().join("absent.json"));
        assert!(missing.load().unwrap().is_empty());

        let empty_path = dir.path().join("empty.json");
        fs::write(&empty_path, "").unwrap();
        assert!(JsonFileStateStore::new(&empty_path).load().unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_file_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            JsonFileStateStore::new(&path).load(),
            Err(MonitorError::Persistence(_))
        ));
    }
}
