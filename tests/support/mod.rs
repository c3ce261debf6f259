use kvstore::config::{ClusterConfig, Mode, NodeConfig, Role};
use kvstore::server::Server;
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Reserve an ephemeral port by binding and immediately releasing it, the
/// same trick the original test suite uses to pick a free port before
/// the real server binds it.
pub async fn reserve_port() -> u16 {
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

pub struct TestNode {
    pub node_id: u64,
    pub addr: SocketAddr,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestNode {
    pub async fn spawn(node_id: u64, data_dir: &Path, role: Role, peers: Vec<NodeConfig>) -> Self {
        let port = reserve_port().await;
        Self::spawn_on_port(node_id, port, data_dir, role, peers).await
    }

    pub async fn spawn_on_port(node_id: u64, port: u16, data_dir: &Path, role: Role, peers: Vec<NodeConfig>) -> Self {
        let host = "127.0.0.1".parse().unwrap();
        let config = ClusterConfig {
            node_id,
            host,
            port,
            data_dir: data_dir.to_path_buf(),
            role,
            mode: Mode::Leader,
            peers,
            replication_timeout: Duration::from_millis(500),
            election_interval: Duration::from_millis(100),
            heartbeat_interval: Duration::from_millis(200),
            drop_rate: 0.0,
        };
        let addr = SocketAddr::new(host, port);
        let (tx, rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(async move {
            let server = Server::new(config);
            server
                .run(async {
                    let _ = rx.await;
                })
                .await
                .unwrap();
        });
        // give the listener a moment to bind before the first client connects
        tokio::time::sleep(Duration::from_millis(50)).await;
        Self {
            node_id,
            addr,
            shutdown: Some(tx),
            task,
        }
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            node_id: self.node_id,
            host: self.addr.ip(),
            port: self.addr.port(),
        }
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let _ = self.task.await;
    }
}

pub async fn request(addr: SocketAddr, payload: Value) -> Value {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let mut line = serde_json::to_vec(&payload).unwrap();
    line.push(b'\n');
    stream.write_all(&line).await.unwrap();
    stream.flush().await.unwrap();

    let (read_half, _) = stream.split();
    let mut reader = BufReader::new(read_half);
    let mut response_line = String::new();
    reader.read_line(&mut response_line).await.unwrap();
    serde_json::from_str(response_line.trim_end()).unwrap()
}
