mod support;

use kvstore::config::Role;
use serde_json::json;
use support::{request, TestNode};

/// Three nodes, primary is node 1. Killing it should leave node 2 (the
/// lowest remaining id) elected primary within a couple of election
/// intervals, with no term numbers or quorum involved.
#[tokio::test]
async fn lowest_id_survivor_is_elected_primary() {
    let dir = tempfile::tempdir().unwrap();

    let port1 = support::reserve_port().await;
    let port2 = support::reserve_port().await;
    let port3 = support::reserve_port().await;
    let host: std::net::IpAddr = "127.0.0.1".parse().unwrap();
    let node_cfg = |id: u64, port: u16| kvstore::config::NodeConfig { node_id: id, host, port };

    let node1 = TestNode::spawn_on_port(
        1,
        port1,
        &dir.path().join("node1"),
        Role::Primary,
        vec![node_cfg(2, port2), node_cfg(3, port3)],
    );
    let node2 = TestNode::spawn_on_port(
        2,
        port2,
        &dir.path().join("node2"),
        Role::Secondary,
        vec![node_cfg(1, port1), node_cfg(3, port3)],
    );
    let node3 = TestNode::spawn_on_port(
        3,
        port3,
        &dir.path().join("node3"),
        Role::Secondary,
        vec![node_cfg(1, port1), node_cfg(2, port2)],
    );
    let (node1, node2, node3) = tokio::join!(node1, node2, node3);

    let resp = request(node1.addr, json!({"op": "set", "key": "k", "value": "v1"})).await;
    assert_eq!(resp["status"], "ok");

    node1.shutdown().await;

    tokio::time::sleep(std::time::Duration::from_millis(400)).await;

    let role2 = request(node2.addr, json!({"op": "who_is_primary"})).await;
    let role3 = request(node3.addr, json!({"op": "who_is_primary"})).await;
    assert_eq!(role2["role"], "primary");
    assert_eq!(role3["role"], "secondary");

    let resp = request(node2.addr, json!({"op": "set", "key": "k", "value": "v2"})).await;
    assert_eq!(resp["status"], "ok");
    let resp = request(node2.addr, json!({"op": "get", "key": "k"})).await;
    assert_eq!(resp["result"], "v2");

    node2.shutdown().await;
    node3.shutdown().await;
}
