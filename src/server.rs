//! Wires the engine, replication dispatcher, cluster coordinator, and the
//! TCP listener together into one running node.

use crate::cluster::{ClusterCoordinator, ClusterState};
use crate::config::ClusterConfig;
use crate::engine::Engine;
use crate::error::Result;
use crate::net::{self, NetContext};
use crate::replication::ReplicationDispatcher;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct Server {
    config: ClusterConfig,
}

impl Server {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    /// Bind the listener, start the background replication and election
    /// tasks, then serve connections until `shutdown` resolves.
    pub async fn run(self, shutdown: impl std::future::Future<Output = ()>) -> Result<()> {
        let config = self.config;
        tracing::info!(node_id = config.node_id, role = config.role.as_str(), "starting node");

        let engine = Arc::new(Engine::open(&config.data_dir, config.drop_rate).await?);
        let cluster = ClusterState::new(config.role);
        let replicator = Arc::new(ReplicationDispatcher::spawn(config.clone()));
        let coordinator = ClusterCoordinator::spawn(config.clone(), cluster.clone());

        let listener = TcpListener::bind((config.host, config.port)).await?;
        tracing::info!(addr = %listener.local_addr()?, "listening");

        let ctx = Arc::new(NetContext {
            engine,
            replicator: replicator.clone(),
            cluster,
            mode: config.mode,
        });

        tokio::select! {
            result = net::serve(listener, ctx) => {
                result?;
            }
            _ = shutdown => {
                tracing::info!("shutdown signal received");
            }
        }

        coordinator.stop();
        match Arc::try_unwrap(replicator) {
            Ok(replicator) => replicator.stop().await,
            Err(_) => tracing::warn!("replicator still has outstanding connection handlers at shutdown"),
        }
        Ok(())
    }
}
