//! In-memory quota table.
//!
//! Records are keyed by `(export root, uid)` and consulted by WRITE
//! before data hits the filesystem: a write that would push `used` past
//! the hard limit is refused with DQUOT. A hard limit of zero means
//! unbounded. Nothing is persisted; the table starts empty on every boot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One quota record.
#[derive(Copy, Clone, Debug, Default)]
pub struct Quota {
    /// Advisory limit in bytes; crossing it is logged, not refused
    pub soft: u64,
    /// Hard limit in bytes; zero means unbounded
    pub hard: u64,
    /// Bytes charged so far
    pub used: u64,
}

/// Concurrency-safe quota bookkeeping.
#[derive(Default)]
pub struct QuotaTable {
    records: Mutex<HashMap<(PathBuf, u32), Quota>>,
}

impl QuotaTable {
    pub fn new() -> QuotaTable {
        QuotaTable::default()
    }

    /// Installs or replaces the quota for `(path, uid)`, keeping any
    /// usage already charged.
    pub fn set(&self, path: &Path, uid: u32, soft: u64, hard: u64) {
        let mut records = self.records.lock().unwrap();
        let entry = records.entry((path.to_path_buf(), uid)).or_default();
        entry.soft = soft;
        entry.hard = hard;
    }

    /// Removes the quota for `(path, uid)`.
    pub fn remove(&self, path: &Path, uid: u32) {
        self.records.lock().unwrap().remove(&(path.to_path_buf(), uid));
    }

    /// Current record, if any.
    pub fn get(&self, path: &Path, uid: u32) -> Option<Quota> {
        self.records.lock().unwrap().get(&(path.to_path_buf(), uid)).copied()
    }

    /// Charges `delta` bytes against the record, refusing the charge when
    /// it would exceed the hard limit. Absent records and zero hard
    /// limits admit everything.
    pub fn charge(&self, path: &Path, uid: u32, delta: u64) -> Result<(), QuotaExceeded> {
        if delta == 0 {
            return Ok(());
        }
        let mut records = self.records.lock().unwrap();
        let Some(record) = records.get_mut(&(path.to_path_buf(), uid)) else {
            return Ok(());
        };
        if record.hard != 0 && record.used.saturating_add(delta) > record.hard {
            return Err(QuotaExceeded);
        }
        record.used = record.used.saturating_add(delta);
        if record.soft != 0 && record.used > record.soft {
            tracing::warn!(
                "uid {uid} exceeded soft quota on {:?} ({} of {})",
                path,
                record.used,
                record.soft
            );
        }
        Ok(())
    }

    /// Returns `delta` bytes to the record, e.g. after a truncate.
    pub fn release(&self, path: &Path, uid: u32, delta: u64) {
        if let Some(record) =
            self.records.lock().unwrap().get_mut(&(path.to_path_buf(), uid))
        {
            record.used = record.used.saturating_sub(delta);
        }
    }
}

/// The charge would cross the hard limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct QuotaExceeded;
