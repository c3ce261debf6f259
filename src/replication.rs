//! Best-effort fire-and-forget replication: a background task drains an
//! mpsc queue and fans each event out to every configured peer, one
//! connection per peer per event. A peer that is unreachable or slow is
//! simply skipped. There is no retry and no acknowledgement tracking.

use crate::codec;
use crate::config::{ClusterConfig, NodeConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// A replicated mutation, carried on the wire as `{"op": "replicate",
/// "event": {"op": ..., "payload": ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationEvent {
    pub op: String,
    pub payload: Value,
}

/// Owns the outbound replication queue and the background fan-out task.
pub struct ReplicationDispatcher {
    sender: mpsc::UnboundedSender<ReplicationEvent>,
    handle: tokio::task::JoinHandle<()>,
}

impl ReplicationDispatcher {
    /// Spawn the background worker. If `config` has no peers the worker
    /// still runs but every enqueued event is a no-op fan-out over an
    /// empty peer list.
    pub fn spawn(config: ClusterConfig) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ReplicationEvent>();
        let handle = tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                for peer in &config.peers {
                    replicate_to_peer(peer, &event, config.replication_timeout).await;
                }
            }
        });
        Self { sender, handle }
    }

    /// Enqueue `event` for replication. Never blocks on the network;
    /// silently dropped if the worker has already stopped.
    pub fn enqueue(&self, event: ReplicationEvent) {
        let _ = self.sender.send(event);
    }

    /// Stop accepting new events and wait for the worker to drain.
    pub async fn stop(self) {
        drop(self.sender);
        let _ = self.handle.await;
    }
}

async fn replicate_to_peer(peer: &NodeConfig, event: &ReplicationEvent, replication_timeout: std::time::Duration) {
    let request = serde_json::json!({
        "op": "replicate",
        "event": { "op": event.op, "payload": event.payload },
    });
    if let Err(error) = send_and_await_reply(peer, &request, replication_timeout).await {
        tracing::debug!(node_id = peer.node_id, %error, "replication to peer failed, skipping");
    }
}

/// Connect to `node`, send one framed request, and read (and discard) one
/// reply line, all bounded by `request_timeout`. Used by both replication
/// fan-out and the leader-election probes below.
async fn send_and_await_reply(
    node: &NodeConfig,
    request: &Value,
    request_timeout: std::time::Duration,
) -> std::io::Result<Vec<u8>> {
    timeout(request_timeout, async {
        let mut stream = TcpStream::connect(node.addr()).await?;
        stream.write_all(&codec::encode(request)).await?;
        stream.flush().await?;
        let mut buf = vec![0u8; 4096];
        let n = stream.read(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    })
    .await
    .unwrap_or_else(|_| Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "replication request timed out")))
}

/// Probe `node`'s `who_is_primary` op and return its reported role, if
/// reachable and well-formed.
pub async fn query_role(node: &NodeConfig, request_timeout: std::time::Duration) -> Option<String> {
    let reply = send_and_await_reply(node, &serde_json::json!({"op": "who_is_primary"}), request_timeout)
        .await
        .ok()?;
    let line = std::str::from_utf8(&reply).ok()?;
    let map = codec::decode(line.trim_end()).ok()?;
    map.get("role").and_then(Value::as_str).map(str::to_string)
}

/// Send a `promote` op to `node`. Best-effort: errors are swallowed, the
/// same as every other inter-node call in this module.
pub async fn send_promote(node: &NodeConfig, request_timeout: std::time::Duration) {
    let _ = send_and_await_reply(node, &serde_json::json!({"op": "promote"}), request_timeout).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dispatcher_with_no_peers_drains_without_connecting() {
        let config = ClusterConfig {
            node_id: 1,
            host: "127.0.0.1".parse().unwrap(),
            port: 0,
            data_dir: std::env::temp_dir(),
            role: crate::config::Role::Primary,
            mode: crate::config::Mode::Leader,
            peers: vec![],
            replication_timeout: std::time::Duration::from_millis(50),
            election_interval: std::time::Duration::from_millis(50),
            heartbeat_interval: std::time::Duration::from_millis(50),
            drop_rate: 0.0,
        };
        let dispatcher = ReplicationDispatcher::spawn(config);
        dispatcher.enqueue(ReplicationEvent {
            op: "set".to_string(),
            payload: serde_json::json!({"key": "k", "value": "v"}),
        });
        dispatcher.stop().await;
    }

    #[tokio::test]
    async fn query_role_returns_none_when_peer_unreachable() {
        let node = NodeConfig {
            node_id: 2,
            host: "127.0.0.1".parse().unwrap(),
            port: 1,
        };
        let role = query_role(&node, std::time::Duration::from_millis(50)).await;
        assert!(role.is_none());
    }
}
