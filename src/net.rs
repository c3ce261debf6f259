//! TCP accept loop and per-connection request dispatch.
//!
//! One connection, one request, one response: one line in, one line out,
//! then the connection closes. There is no keep-alive and no pipelining.

use crate::cluster::ClusterState;
use crate::codec;
use crate::config::{Mode, Role};
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::replication::{ReplicationDispatcher, ReplicationEvent};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

pub struct NetContext {
    pub engine: Arc<Engine>,
    pub replicator: Arc<ReplicationDispatcher>,
    pub cluster: ClusterState,
    pub mode: Mode,
}

/// Accept connections until `listener` is dropped or the process is
/// signaled to shut down by the caller aborting this task's handle.
pub async fn serve(listener: TcpListener, ctx: Arc<NetContext>) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let ctx = ctx.clone();
        tokio::spawn(async move {
            if let Err(error) = handle_connection(stream, ctx).await {
                tracing::debug!(%peer_addr, %error, "connection closed with error");
            }
        });
    }
}

async fn handle_connection(stream: tokio::net::TcpStream, ctx: Arc<NetContext>) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Ok(());
    }

    let response = match codec::decode(line.trim_end()) {
        Ok(request) => handle_request(request, &ctx).await,
        Err(error) => serde_json::json!({"status": "error", "error": error.to_string()}),
    };

    write_half.write_all(&codec::encode(&response)).await?;
    write_half.flush().await?;
    Ok(())
}

/// Dispatch one decoded request to a JSON response, mirroring the
/// original handler's op table exactly: cluster ops (`who_is_primary`,
/// `promote`, `replicate`) bypass the primary-role gate; every other op
/// is rejected with `not_primary` in leader mode unless this node is the
/// primary.
async fn handle_request(request: Map<String, Value>, ctx: &NetContext) -> Value {
    let op = request.get("op").and_then(Value::as_str).unwrap_or("");

    match op {
        "who_is_primary" => {
            return serde_json::json!({"status": "ok", "role": ctx.cluster.role().as_str()});
        }
        "promote" => {
            ctx.cluster.set_role(Role::Primary);
            return serde_json::json!({"status": "ok"});
        }
        "replicate" => {
            let event = request.get("event").cloned().unwrap_or(Value::Null);
            let op_name = event.get("op").and_then(Value::as_str).unwrap_or("");
            let payload = event.get("payload").cloned().unwrap_or(Value::Null);
            return match ctx.engine.apply_replication(op_name, &payload).await {
                Ok(()) => serde_json::json!({"status": "ok"}),
                Err(error) => serde_json::json!({"status": "error", "error": error.to_string()}),
            };
        }
        _ => {}
    }

    if matches!(ctx.mode, Mode::Leader) && ctx.cluster.role() != Role::Primary {
        return serde_json::json!({"status": "error", "error": Error::NotPrimary.to_string()});
    }

    match handle_primary_op(op, &request, ctx).await {
        Ok(value) => value,
        Err(error) => serde_json::json!({"status": "error", "error": error.to_string()}),
    }
}

async fn handle_primary_op(op: &str, request: &Map<String, Value>, ctx: &NetContext) -> Result<Value> {
    let simulate_drop = request.get("simulate_drop").and_then(Value::as_bool).unwrap_or(false);

    match op {
        "get" => {
            let key = required_str(request, "key")?;
            let value = ctx.engine.get(&key).await;
            Ok(serde_json::json!({"status": "ok", "result": value}))
        }
        "set" => {
            let key = required_str(request, "key")?;
            let value = request.get("value").cloned().unwrap_or(Value::Null);
            ctx.engine.set(&key, value.clone(), simulate_drop).await?;
            ctx.replicator.enqueue(ReplicationEvent {
                op: "set".to_string(),
                payload: serde_json::json!({"key": key, "value": value}),
            });
            Ok(serde_json::json!({"status": "ok"}))
        }
        "delete" => {
            let key = required_str(request, "key")?;
            ctx.engine.delete(&key, simulate_drop).await?;
            ctx.replicator.enqueue(ReplicationEvent {
                op: "delete".to_string(),
                payload: serde_json::json!({"key": key}),
            });
            Ok(serde_json::json!({"status": "ok"}))
        }
        "bulk_set" => {
            let items_value = request.get("items").cloned().unwrap_or(Value::Null);
            let items = parse_bulk_items(&items_value)?;
            ctx.engine.bulk_set(items, simulate_drop).await?;
            ctx.replicator.enqueue(ReplicationEvent {
                op: "bulk_set".to_string(),
                payload: serde_json::json!({"items": items_value}),
            });
            Ok(serde_json::json!({"status": "ok"}))
        }
        "search_value" => {
            let value = request.get("value").cloned().unwrap_or(Value::Null);
            let keys = ctx.engine.search_by_value(&value).await;
            Ok(serde_json::json!({"status": "ok", "result": keys}))
        }
        "search_text" => {
            let term = request.get("term").and_then(Value::as_str).unwrap_or("");
            let keys = ctx.engine.search_text(term).await;
            Ok(serde_json::json!({"status": "ok", "result": keys}))
        }
        "add_vector" => {
            let key = required_str(request, "key")?;
            let vector = required_vector(request, "vector")?;
            ctx.engine.add_vector(&key, vector.clone(), simulate_drop).await?;
            ctx.replicator.enqueue(ReplicationEvent {
                op: "add_vector".to_string(),
                payload: serde_json::json!({"key": key, "vector": vector}),
            });
            Ok(serde_json::json!({"status": "ok"}))
        }
        "vector_search" => {
            let vector = required_vector(request, "vector")?;
            let top_k = request.get("top_k").and_then(Value::as_u64).unwrap_or(5) as usize;
            let results = ctx.engine.vector_search(&vector, top_k).await;
            Ok(serde_json::json!({"status": "ok", "result": results}))
        }
        other => Err(Error::UnknownOp(other.to_string())),
    }
}

fn required_str(request: &Map<String, Value>, field: &str) -> Result<String> {
    request
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| Error::missing_field(field))
}

fn required_vector(request: &Map<String, Value>, field: &str) -> Result<Vec<f64>> {
    let array = request
        .get(field)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::missing_field(field))?;
    array
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| Error::missing_field(field)))
        .collect()
}

/// Items travel as a JSON array of `[key, value]` pairs, matching the
/// wire shape the client sends (and the journal's `BulkSet` payload).
fn parse_bulk_items(value: &Value) -> Result<Vec<(String, Value)>> {
    let array = value.as_array().ok_or_else(|| Error::missing_field("items"))?;
    array
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
