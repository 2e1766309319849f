//! store.rs — durable per-user violation counts and custom flagged phrases.
//!
//! A JSON object keyed by user identity, loaded once at startup and
//! rewritten after every mutation (atomic temp-file + rename). Missing or
//! corrupt files degrade to empty defaults and are never fatal. All
//! mutations take the write lock for the whole read-modify-write, so
//! concurrent offense bumps and rule edits cannot lose updates.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// One user's record. Offenses only ever grow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub offenses: u32,
}

/// Key-value record store shared by the matcher, the policy engine, and the
/// review flows.
#[derive(Debug)]
pub struct RecordStore {
    path: PathBuf,
    inner: RwLock<HashMap<String, UserRecord>>,
    /// Bumped on every phrase mutation; lets the matcher cache its compiled
    /// pattern until the global flag set actually changes.
    rules_generation: AtomicU64,
}

impl RecordStore {
    /// Load from disk; a missing or unreadable file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let records = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, UserRecord>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "record store corrupt; starting empty");
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            path,
            inner: RwLock::new(records),
            rules_generation: AtomicU64::new(0),
        }
    }

    pub fn offenses(&self, user: &str) -> u32 {
        self.inner
            .read()
            .expect("record store lock poisoned")
            .get(user)
            .map(|r| r.offenses)
            .unwrap_or(0)
    }

    /// Increment the user's offense count by exactly one and persist.
    /// Returns the new count.
    pub fn record_offense(&self, user: &str) -> u32 {
        let mut guard = self.inner.write().expect("record store lock poisoned");
        let record = guard.entry(user.to_string()).or_default();
        record.offenses += 1;
        let count = record.offenses;
        self.persist(&guard);
        count
    }

    pub fn user_rules(&self, user: &str) -> Vec<String> {
        self.inner
            .read()
            .expect("record store lock poisoned")
            .get(user)
            .map(|r| r.rules.clone())
            .unwrap_or_default()
    }

    /// Add a flagged phrase for the user. Returns false on duplicate.
    pub fn add_rule(&self, user: &str, phrase: &str) -> bool {
        let mut guard = self.inner.write().expect("record store lock poisoned");
        let record = guard.entry(user.to_string()).or_default();
        if record.rules.iter().any(|r| r == phrase) {
            return false;
        }
        record.rules.push(phrase.to_string());
        self.persist(&guard);
        drop(guard);
        self.rules_generation.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Remove a flagged phrase. Returns false if the user never had it.
    pub fn remove_rule(&self, user: &str, phrase: &str) -> bool {
        let mut guard = self.inner.write().expect("record store lock poisoned");
        let Some(record) = guard.get_mut(user) else {
            return false;
        };
        let before = record.rules.len();
        record.rules.retain(|r| r != phrase);
        if record.rules.len() == before {
            return false;
        }
        self.persist(&guard);
        drop(guard);
        self.rules_generation.fetch_add(1, Ordering::SeqCst);
        true
    }

    /// Union of all users' flagged phrases, deduplicated and sorted.
    pub fn global_flags(&self) -> Vec<String> {
        let guard = self.inner.read().expect("record store lock poisoned");
        let set: BTreeSet<&str> = guard
            .values()
            .flat_map(|r| r.rules.iter().map(String::as_str))
            .collect();
        set.into_iter().map(str::to_string).collect()
    }

    /// Monotonic counter identifying the current global flag set.
    pub fn rules_generation(&self) -> u64 {
        self.rules_generation.load(Ordering::SeqCst)
    }

    /// Best-effort atomic rewrite; a failed save is logged, not raised.
    fn persist(&self, records: &HashMap<String, UserRecord>) {
        if let Err(e) = write_atomically(&self.path, records) {
            warn!(path = %self.path.display(), error = %e, "record store save failed");
        }
    }
}

fn write_atomically(path: &Path, records: &HashMap<String, UserRecord>) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(records).unwrap_or_else(|_| "{}".to_string());
    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp)?;
    f.write_all(json.as_bytes())?;
    fs::rename(tmp, path)?;
    Ok(())
}
