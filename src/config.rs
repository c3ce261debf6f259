//! Cluster configuration.
//!
//! Mirrors the original implementation's `DatastoreSettings` /
//! `RemoteNodeConfig` split: an immutable identity/address for every node
//! in the cluster, and the settings this node was launched with.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identity and address of one node in the cluster. Immutable after
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub node_id: u64,
    pub host: std::net::IpAddr,
    pub port: u16,
}

impl NodeConfig {
    pub fn addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::new(self.host, self.port)
    }
}

/// Role of a node: only a primary accepts client mutations in leader mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Secondary,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Primary => "primary",
            Role::Secondary => "secondary",
        }
    }
}

/// Cluster topology mode. `Dynamo` is accepted for forward-compatibility
/// with the original's CLI surface but only `Leader` mode gates non-cluster
/// ops on role; `Dynamo` mode never rejects with `not_primary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Leader,
    Dynamo,
}

/// Settings this node was launched with, including the peer list.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    pub node_id: u64,
    pub host: std::net::IpAddr,
    pub port: u16,
    pub data_dir: PathBuf,
    pub role: Role,
    pub mode: Mode,
    pub peers: Vec<NodeConfig>,
    pub replication_timeout: std::time::Duration,
    pub election_interval: std::time::Duration,
    pub heartbeat_interval: std::time::Duration,
    pub drop_rate: f64,
}

impl ClusterConfig {
    /// All nodes in the cluster, including this one.
    pub fn all_nodes(&self) -> Vec<NodeConfig> {
        let mut nodes = vec![NodeConfig {
            node_id: self.node_id,
            host: self.host,
            port: self.port,
        }];
        nodes.extend(self.peers.iter().copied());
        nodes
    }
}
