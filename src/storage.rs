//! Journal & snapshot store: the per-node durability layer.
//!
//! Recovery invariant: `snapshot ∘ replay(journal) = current committed
//! state`. After a successful snapshot rewrite, the journal is truncated
//! (removed).

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;

/// A tagged mutation record, used both as the on-disk journal entry and as
/// the payload carried by a `ReplicationEvent`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    Set { key: String, value: Value },
    Delete { key: String },
    BulkSet { items: Vec<(String, Value)> },
}

impl Operation {
    pub fn op_name(&self) -> &'static str {
        match self {
            Operation::Set { .. } => "set",
            Operation::Delete { .. } => "delete",
            Operation::BulkSet { .. } => "bulk_set",
        }
    }

    /// Apply this entry's mutation to `map`.
    pub fn apply(&self, map: &mut HashMap<String, Value>) {
        match self {
            Operation::Set { key, value } => {
                map.insert(key.clone(), value.clone());
            }
            Operation::Delete { key } => {
                map.remove(key);
            }
            Operation::BulkSet { items } => {
                for (key, value) in items {
                    map.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

/// The journal + snapshot durability layer for one node.
pub struct JournalStore {
    dir: PathBuf,
    drop_rate: f64,
    /// Serializes append and save_snapshot against each other. Always
    /// acquired *inside* the engine's own lock, never the reverse.
    lock: tokio::sync::Mutex<()>,
}

impl JournalStore {
    pub fn new(dir: impl Into<PathBuf>, drop_rate: f64) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            drop_rate,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot")
    }

    fn snapshot_tmp_path(&self) -> PathBuf {
        self.dir.join("snapshot.tmp")
    }

    fn journal_path(&self) -> PathBuf {
        self.dir.join("journal")
    }

    /// Load the snapshot (if present), then replay the journal tail on
    /// top of it. Missing files are equivalent to an empty map. Journal
    /// lines that fail to parse (e.g. a torn trailing write) are
    /// discarded rather than treated as an error.
    pub async fn load(&self) -> Result<HashMap<String, Value>> {
        let snapshot_path = self.snapshot_path();
        let journal_path = self.journal_path();
        tokio::task::spawn_blocking(move || -> Result<HashMap<String, Value>> {
            let mut map: HashMap<String, Value> = if snapshot_path.exists() {
                let bytes = std::fs::read(&snapshot_path)?;
                serde_json::from_slice(&bytes)?
            } else {
                HashMap::new()
            };

            if journal_path.exists() {
                let text = std::fs::read_to_string(&journal_path)?;
                for line in text.lines() {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Operation>(line) {
                        Ok(entry) => entry.apply(&mut map),
                        Err(_) => {
                            tracing::warn!("discarding malformed journal line on replay");
                        }
                    }
                }
            }

            Ok(map)
        })
        .await
        .map_err(|e| Error::Internal(format!("journal load task join error: {e}")))?
    }

    /// Append `entry` as one compact JSON line, flushed and fsync'd
    /// before returning. Durable before the caller may ack.
    pub async fn append(&self, entry: &Operation) -> Result<()> {
        let _guard = self.lock.lock().await;
        let line = serde_json::to_string(entry)? + "\n";
        let path = self.journal_path();
        tokio::task::spawn_blocking(move || -> Result<()> {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.flush()?;
            file.sync_all()?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(format!("journal append task join error: {e}")))??;
        Ok(())
    }

    /// Write the full map to a sibling temp file, fsync it, atomically
    /// rename it over the snapshot path, then remove the journal.
    ///
    /// When `simulate_drop` is set and `drop_rate > 0.0`, a random draw
    /// below `drop_rate` skips the write entirely, used to model an
    /// aborted checkpoint mid-sequence in fault-injection tests. This
    /// path never triggers unless the caller explicitly opts in.
    pub async fn save_snapshot(&self, map: HashMap<String, Value>, simulate_drop: bool) -> Result<()> {
        if simulate_drop && self.drop_rate > 0.0 && fastrand::f64() < self.drop_rate {
            return Ok(());
        }

        let _guard = self.lock.lock().await;
        let snapshot_path = self.snapshot_path();
        let tmp_path = self.snapshot_tmp_path();
        let journal_path = self.journal_path();

        tokio::task::spawn_blocking(move || -> Result<()> {
            use std::io::Write;
            let bytes = serde_json::to_vec(&map)?;
            {
                let mut file = std::fs::File::create(&tmp_path)?;
                file.write_all(&bytes)?;
                file.flush()?;
                file.sync_all()?;
            }
            std::fs::rename(&tmp_path, &snapshot_path)?;
            if journal_path.exists() {
                std::fs::remove_file(&journal_path)?;
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::Internal(format!("snapshot task join error: {e}")))??;
        Ok(())
    }
}
