use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use analysis_core::ValuationError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

const CSV_HEADER: [&str; 4] = ["currency_from", "currency_to", "rate", "last_updated"];

/// One row of the persisted rate table. Unique per ordered currency pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRateEntry {
    pub currency_from: String,
    pub currency_to: String,
    pub rate: f64,
    pub last_updated: NaiveDate,
}

/// Backing store for the rate table. Every save replaces the whole table.
pub trait RateStore: Send + Sync {
    fn load(&self) -> Result<Vec<ExchangeRateEntry>, ValuationError>;
    fn save(&self, entries: &[ExchangeRateEntry]) -> Result<(), ValuationError>;
}

/// CSV file store with a mandatory header row.
#[derive(Debug, Clone)]
pub struct CsvRateStore {
    path: PathBuf,
}

impl CsvRateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<(), ValuationError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                ValuationError::PersistenceError(format!("{}: {}", parent.display(), e))
            })?;
        }
        Ok(())
    }
}

impl RateStore for CsvRateStore {
    fn load(&self) -> Result<Vec<ExchangeRateEntry>, ValuationError> {
        if !self.path.exists() {
            // First run: lay down an empty table so the file is discoverable.
            self.save(&[])?;
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path).map_err(|e| {
            ValuationError::PersistenceError(format!("{}: {}", self.path.display(), e))
        })?;

        let mut entries = Vec::new();
        for (line, row) in reader.deserialize::<ExchangeRateEntry>().enumerate() {
            match row {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(
                    "Skipping malformed exchange-rate row {} in {}: {}",
                    line + 2,
                    self.path.display(),
                    e
                ),
            }
        }
        Ok(entries)
    }

    fn save(&self, entries: &[ExchangeRateEntry]) -> Result<(), ValuationError> {
        self.ensure_parent()?;
        let to_err =
            |e: csv::Error| ValuationError::PersistenceError(format!("{}: {}", self.path.display(), e));

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)
            .map_err(to_err)?;
        writer.write_record(CSV_HEADER).map_err(to_err)?;
        for entry in entries {
            writer.serialize(entry).map_err(to_err)?;
        }
        writer
            .flush()
            .map_err(|e| ValuationError::PersistenceError(e.to_string()))
    }
}

/// In-process store; counts saves so tests can observe write-through.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    entries: Mutex<Vec<ExchangeRateEntry>>,
    saves: Mutex<usize>,
    fail_saves: bool,
}

impl MemoryRateStore {
    pub fn new(entries: Vec<ExchangeRateEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            saves: Mutex::new(0),
            fail_saves: false,
        }
    }

    /// A store that loads `entries` but rejects every save.
    pub fn read_only(entries: Vec<ExchangeRateEntry>) -> Self {
        Self {
            fail_saves: true,
            ..Self::new(entries)
        }
    }

    pub fn snapshot(&self) -> Vec<ExchangeRateEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|s| *s).unwrap_or(0)
    }
}

impl RateStore for MemoryRateStore {
    fn load(&self) -> Result<Vec<ExchangeRateEntry>, ValuationError> {
        self.entries
            .lock()
            .map(|e| e.clone())
            .map_err(|e| ValuationError::PersistenceError(e.to_string()))
    }

    fn save(&self, entries: &[ExchangeRateEntry]) -> Result<(), ValuationError> {
        if self.fail_saves {
            return Err(ValuationError::PersistenceError("rate table is read-only".into()));
        }
        let mut guard = self
            .entries
            .lock()
            .map_err(|e| ValuationError::PersistenceError(e.to_string()))?;
        *guard = entries.to_vec();
        if let Ok(mut saves) = self.saves.lock() {
            *saves += 1;
        }
        Ok(())
    }
}
