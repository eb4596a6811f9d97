// src/store.rs
//! Daily record store: one JSON file mapping "YYYY-MM-DD" to a record,
//! read-modify-write under a mutex, atomic persist via tmp + rename.
//! Single-writer by design; last writer wins per date.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use crate::model::{BrandGroup, DailyRecord};

pub const DEFAULT_RECORDS_PATH: &str = "data/daily_records.json";

pub struct RecordStore {
    path: PathBuf,
    // Serializes whole read-modify-write cycles, not just single reads.
    lock: Mutex<()>,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fetch one day's record.
    pub fn get(&self, date: &str) -> Result<Option<DailyRecord>> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        Ok(self.load()?.remove(date))
    }

    /// Upsert one day's brand list. `created_at` is fixed at the first
    /// save for the date; `updated_at` refreshes every time. Returns the
    /// stored record.
    pub fn save(&self, date: &str, brands: Vec<BrandGroup>) -> Result<DailyRecord> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut records = self.load()?;
        let now = chrono::Utc::now().timestamp_millis();

        let record = DailyRecord {
            date: date.to_string(),
            brands,
            created_at: records.get(date).map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        records.insert(date.to_string(), record.clone());
        self.persist(&records)?;
        Ok(record)
    }

    /// Read-modify-write one day's brand list under the lock, so two
    /// concurrent merges cannot lose each other's cards. Timestamp
    /// handling matches `save`.
    pub fn update(
        &self,
        date: &str,
        f: impl FnOnce(Vec<BrandGroup>) -> Vec<BrandGroup>,
    ) -> Result<DailyRecord> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut records = self.load()?;
        let now = chrono::Utc::now().timestamp_millis();

        let existing = records.get(date);
        let created_at = existing.map(|r| r.created_at).unwrap_or(now);
        let brands = f(existing.map(|r| r.brands.clone()).unwrap_or_default());

        let record = DailyRecord {
            date: date.to_string(),
            brands,
            created_at,
            updated_at: now,
        };
        records.insert(date.to_string(), record.clone());
        self.persist(&records)?;
        Ok(record)
    }

    /// Remove one day's record. Returns whether anything was deleted.
    pub fn delete(&self, date: &str) -> Result<bool> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let mut records = self.load()?;
        let existed = records.remove(date).is_some();
        if existed {
            self.persist(&records)?;
        }
        Ok(existed)
    }

    /// All recorded dates, newest first.
    pub fn list_dates(&self) -> Result<Vec<String>> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let records = self.load()?;
        // Keys are "YYYY-MM-DD", so reverse lexicographic is newest-first.
        Ok(records.keys().rev().cloned().collect())
    }

    /// Recorded dates within one month, oldest first. `month` is 1-based.
    pub fn list_dates_in_month(&self, year: i32, month: u32) -> Result<Vec<String>> {
        let _guard = self.lock.lock().expect("store mutex poisoned");
        let records = self.load()?;
        let prefix = format!("{year:04}-{month:02}");
        Ok(records
            .keys()
            .filter(|d| d.starts_with(&prefix))
            .cloned()
            .collect())
    }

    fn load(&self) -> Result<BTreeMap<String, DailyRecord>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("reading records from {}", self.path.display()))
            }
        };
        match serde_json::from_str(&data) {
            Ok(records) => Ok(records),
            Err(e) => {
                // A corrupt file must not brick the service; start over.
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "records file is unreadable, treating as empty"
                );
                Ok(BTreeMap::new())
            }
        }
    }

    fn persist(&self, records: &BTreeMap<String, DailyRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string(records).context("serializing records")?;
        let tmp = self.path.with_extension("json.tmp");
        let mut f = fs::File::create(&tmp)
            .with_context(|| format!("creating {}", tmp.display()))?;
        f.write_all(json.as_bytes())
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming {} into place", tmp.display()))?;
        Ok(())
    }
}
