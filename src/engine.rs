//! Storage engine: owns the primary map, the three secondary indexes, and
//! the journal/snapshot store behind a single mutex serializing all
//! mutations and reads of derived structures.

use crate::error::{Error, Result};
use crate::index::{extract_text, extract_vector, TextIndex, ValueIndex, VectorIndex};
use crate::storage::{JournalStore, Operation};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// One scored hit returned by `vector_search`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredKey {
    pub key: String,
    pub score: f64,
}

struct EngineState {
    map: HashMap<String, Value>,
    value_index: ValueIndex,
    text_index: TextIndex,
    vector_index: VectorIndex,
}

impl EngineState {
    fn index_value(&mut self, key: &str, value: &Value) {
        self.value_index.add(key, value);
        if let Some(text) = extract_text(value) {
            self.text_index.add_document(key, text);
        }
        if let Some(vector) = extract_vector(value) {
            self.vector_index.add(key, vector);
        }
    }

    fn unindex_value(&mut self, key: &str, value: &Value) {
        self.value_index.remove(key, value);
        if let Some(text) = extract_text(value) {
            self.text_index.remove_document(key, text);
        }
        if extract_vector(value).is_some() {
            self.vector_index.remove(key);
        }
    }
}

/// The storage engine. Cheaply cloneable handle (wrap in `Arc` at the call
/// site, since this type itself holds no `Arc`, matching how the dispatcher
/// and coordinator each receive a reference to one shared instance).
pub struct Engine {
    store: JournalStore,
    state: tokio::sync::Mutex<EngineState>,
}

impl Engine {
    /// Open the engine at `data_dir`, loading the map from the store and
    /// rebuilding all three indexes by iterating every `(key, value)`.
    pub async fn open(data_dir: impl AsRef<Path>, drop_rate: f64) -> Result<Self> {
        let store = JournalStore::new(data_dir.as_ref(), drop_rate)?;
        let map = store.load().await?;

        let mut state = EngineState {
            map: HashMap::new(),
            value_index: ValueIndex::new(),
            text_index: TextIndex::new(),
            vector_index: VectorIndex::new(),
        };
        for (key, value) in &map {
            state.index_value(key, value);
        }
        state.map = map;

        Ok(Self {
            store,
            state: tokio::sync::Mutex::new(state),
        })
    }

    /// Current value for `key`, or `Value::Null` if absent.
    pub async fn get(&self, key: &str) -> Value {
        let state = self.state.lock().await;
        state.map.get(key).cloned().unwrap_or(Value::Null)
    }

    pub async fn set(&self, key: &str, value: Value, simulate_drop: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        if let Some(old) = state.map.get(key).cloned() {
            state.unindex_value(key, &old);
        }
        self.store
            .append(&Operation::Set {
                key: key.to_string(),
                value: value.clone(),
            })
            .await?;
        state.map.insert(key.to_string(), value.clone());
        state.index_value(key, &value);
        self.store.save_snapshot(state.map.clone(), simulate_drop).await?;
        Ok(())
    }

    /// Idempotent: deleting an absent key is not an error.
    pub async fn delete(&self, key: &str, simulate_drop: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        self.store
            .append(&Operation::Delete {
                key: key.to_string(),
            })
            .await?;
        if let Some(old) = state.map.remove(key) {
            state.unindex_value(key, &old);
        }
        self.store.save_snapshot(state.map.clone(), simulate_drop).await?;
        Ok(())
    }

    /// Apply every `(key, value)` pair under one journal entry and one
    /// lock acquisition, atomic with respect to any concurrent mutation.
    pub async fn bulk_set(&self, items: Vec<(String, Value)>, simulate_drop: bool) -> Result<()> {
        let mut state = self.state.lock().await;
        self.store
            .append(&Operation::BulkSet {
                items: items.clone(),
            })
            .await?;
        for (key, value) in &items {
            if let Some(old) = state.map.get(key).cloned() {
                state.unindex_value(key, &old);
            }
            state.map.insert(key.clone(), value.clone());
            state.index_value(key, value);
        }
        self.store.save_snapshot(state.map.clone(), simulate_drop).await?;
        Ok(())
    }

    /// Apply a replicated event as the corresponding local mutation, with
    /// no further fan-out (the caller never re-enqueues a replication
    /// event for a replicated apply).
    pub async fn apply_replication(&self, op: &str, payload: &Value) -> Result<()> {
        match op {
            "set" => {
                let key = field_str(payload, "key")?;
                let value = payload.get("value").cloned().unwrap_or(Value::Null);
                self.set(&key, value, false).await
            }
            "delete" => {
                let key = field_str(payload, "key")?;
                self.delete(&key, false).await
            }
            "bulk_set" => {
                let items = parse_items(payload)?;
                self.bulk_set(items, false).await
            }
            "add_vector" => {
                let key = field_str(payload, "key")?;
                let vector = payload.get("vector").cloned().unwrap_or(Value::Null);
                self.set(&key, serde_json::json!({ "vector": vector }), false).await
            }
            other => Err(Error::UnknownOp(other.to_string())),
        }
    }

    pub async fn search_by_value(&self, value: &Value) -> Vec<String> {
        let state = self.state.lock().await;
        state.value_index.search(value)
    }

    pub async fn search_text(&self, term: &str) -> Vec<String> {
        let state = self.state.lock().await;
        state.text_index.search(term)
    }

    /// Equivalent to `set(key, {"vector": vector})`.
    pub async fn add_vector(&self, key: &str, vector: Vec<f64>, simulate_drop: bool) -> Result<()> {
        self.set(key, serde_json::json!({ "vector": vector }), simulate_drop).await
    }

    /// Up to `top_k` items sorted by descending cosine similarity.
    /// Entries whose vector length differs from `query` or whose norm is
    /// zero are excluded. Ties are broken by enumeration order, which is
    /// implementation-defined (HashMap iteration order), so callers must
    /// not depend on tie order.
    pub async fn vector_search(&self, query: &[f64], top_k: usize) -> Vec<ScoredKey> {
        let state = self.state.lock().await;
        let mut scored: Vec<ScoredKey> = state
            .vector_index
            .iter()
            .filter_map(|(key, candidate)| {
                cosine_similarity(query, candidate).map(|score| ScoredKey {
                    key: key.to_string(),
                    score,
                })
            })
            .collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

fn field_str(payload: &Value, field: &str) -> Result<String> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::missing_field(field))
}

fn parse_items(payload: &Value) -> Result<Vec<(String, Value)>> {
    let items = payload
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::missing_field("items"))?;
    items
        .iter()
        .map(|pair| {
            let pair = pair.as_array().ok_or_else(|| Error::missing_field("items"))?;
            let key = pair
                .first()
                .and_then(Value::as_str)
                .ok_or_else(|| Error::missing_field("items[].key"))?;
            let value = pair.get(1).cloned().unwrap_or(Value::Null);
            Ok((key.to_string(), value))
        })
        .collect()
}

/// `dot(a,b) / (|a|·|b|)`. Defined only when vectors have equal positive
/// length and both norms are non-zero.
fn cosine_similarity(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|y| y * y).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }
    Some(dot / (norm_a * norm_b))
}
