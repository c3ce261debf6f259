//! `kvnode`: launch one node of a replicated kvstore cluster.

use clap::Parser;
use kvstore::config::{ClusterConfig, Mode, NodeConfig, Role};
use kvstore::logging;
use kvstore::server::Server;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Launch a single kvstore node.
#[derive(Debug, Parser)]
#[command(name = "kvnode", version, about)]
struct Args {
    /// Unique id of this node within the cluster
    #[arg(long)]
    node_id: u64,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Port to bind
    #[arg(long)]
    port: u16,

    /// Directory for the journal and snapshot files
    #[arg(long)]
    data_dir: PathBuf,

    /// Starting role
    #[arg(long, value_enum, default_value = "primary")]
    role: Role,

    /// Cluster topology mode
    #[arg(long, value_enum, default_value = "leader")]
    mode: Mode,

    /// Peer nodes, as a JSON array of `{"node_id", "host", "port"}`
    #[arg(long, default_value = "[]")]
    peers: String,

    /// Per-request timeout for replication and election RPCs, in seconds
    #[arg(long, default_value_t = 2.0)]
    replication_timeout: f64,

    /// Interval between election checks, in seconds
    #[arg(long, default_value_t = 0.5)]
    election_interval: f64,

    /// Interval between heartbeat probes, in seconds (reserved for future use)
    #[arg(long, default_value_t = 1.0)]
    heartbeat_interval: f64,

    /// Fraction of snapshot writes to randomly skip when a request opts into
    /// `simulate_drop`, for fault-injection testing
    #[arg(long, default_value_t = 0.0)]
    drop_rate: f64,

    /// Directory for rotated log files
    #[arg(long, default_value = "logs")]
    log_dir: String,

    /// Default log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init_logging(&args.log_dir, "kvnode.log", &args.log_level)?;

    let peers: Vec<NodeConfig> = serde_json::from_str(&args.peers)?;

    let config = ClusterConfig {
        node_id: args.node_id,
        host: args.host,
        port: args.port,
        data_dir: args.data_dir,
        role: args.role,
        mode: args.mode,
        peers,
        replication_timeout: Duration::from_secs_f64(args.replication_timeout),
        election_interval: Duration::from_secs_f64(args.election_interval),
        heartbeat_interval: Duration::from_secs_f64(args.heartbeat_interval),
        drop_rate: args.drop_rate,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let server = Server::new(config);
        server.run(async {
            let _ = tokio::signal::ctrl_c().await;
        }).await?;
        Ok(())
    })
}
