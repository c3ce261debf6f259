//! Cluster role tracking and the lowest-node-id election loop.
//!
//! There are no terms and no quorum: an election is just every reachable
//! node's `node_id` compared, lowest wins. Two sides of a network
//! partition can each elect a primary, and that is intentional, not a
//! bug to patch over.

use crate::config::{ClusterConfig, NodeConfig, Role};
use crate::replication;
use parking_lot::Mutex;
use std::sync::Arc;

/// Shared, lock-protected role for this node. Cheap to read/write; never
/// held across an `.await`.
#[derive(Clone)]
pub struct ClusterState {
    role: Arc<Mutex<Role>>,
}

impl ClusterState {
    pub fn new(initial: Role) -> Self {
        Self {
            role: Arc::new(Mutex::new(initial)),
        }
    }

    pub fn role(&self) -> Role {
        *self.role.lock()
    }

    pub fn set_role(&self, role: Role) {
        *self.role.lock() = role;
    }
}

/// Background election loop. Runs only when the node has peers, since a
/// single-node cluster never needs one, matching the original's
/// `start()` guard.
pub struct ClusterCoordinator {
    handle: tokio::task::JoinHandle<()>,
}

impl ClusterCoordinator {
    pub fn spawn(config: ClusterConfig, state: ClusterState) -> Self {
        let handle = tokio::spawn(async move {
            if config.peers.is_empty() {
                return;
            }
            let mut ticker = tokio::time::interval(config.election_interval);
            loop {
                ticker.tick().await;
                check_primary(&config, &state).await;
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

async fn check_primary(config: &ClusterConfig, state: &ClusterState) {
    if state.role() == Role::Primary {
        return;
    }
    if find_primary(config).await.is_none() {
        elect_new_primary(config, state).await;
    }
}

/// First peer that reports itself as primary, or `None` if none do (or
/// none are reachable).
async fn find_primary(config: &ClusterConfig) -> Option<NodeConfig> {
    for peer in &config.peers {
        if replication::query_role(peer, config.replication_timeout).await.as_deref() == Some("primary") {
            return Some(*peer);
        }
    }
    None
}

/// Collect every reachable node's id (this node always counts itself),
/// promote the lowest one. If the winner is this node, flip our own role
/// locally; otherwise send it a `promote` request.
async fn elect_new_primary(config: &ClusterConfig, state: &ClusterState) {
    let mut candidates = vec![config.node_id];
    for peer in &config.peers {
        if replication::query_role(peer, config.replication_timeout).await.is_some() {
            candidates.push(peer.node_id);
        }
    }
    let Some(&winner) = candidates.iter().min() else {
        return;
    };
    if winner == config.node_id {
        state.set_role(Role::Primary);
        return;
    }
    if let Some(peer) = config.peers.iter().find(|p| p.node_id == winner) {
        replication::send_promote(peer, config.replication_timeout).await;
    }
}
