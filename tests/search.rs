mod support;

use serde_json::json;
use support::{request, TestNode};

#[tokio::test]
async fn exact_value_search_finds_every_matching_key() {
    let dir = tempfile::tempdir().unwrap();
    let node = TestNode::spawn(1, dir.path(), kvstore::config::Role::Primary, vec![]).await;

    request(node.addr, json!({"op": "set", "key": "k1", "value": "blue"})).await;
    request(node.addr, json!({"op": "set", "key": "k2", "value": "blue"})).await;
    request(node.addr, json!({"op": "set", "key": "k3", "value": "red"})).await;

    let resp = request(node.addr, json!({"op": "search_value", "value": "blue"})).await;
    let mut keys: Vec<String> = resp["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["k1", "k2"]);
    node.shutdown().await;
}

#[tokio::test]
async fn text_search_covers_plain_strings_and_text_field_objects() {
    let dir = tempfile::tempdir().unwrap();
    let node = TestNode::spawn(1, dir.path(), kvstore::config::Role::Primary, vec![]).await;

    request(node.addr, json!({"op": "set", "key": "doc1", "value": "hello world"})).await;
    request(
        node.addr,
        json!({"op": "set", "key": "doc2", "value": {"text": "hello kv store"}}),
    )
    .await;

    let resp = request(node.addr, json!({"op": "search_text", "term": "hello"})).await;
    let mut keys: Vec<String> = resp["result"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();
    keys.sort();
    assert_eq!(keys, vec!["doc1", "doc2"]);
    node.shutdown().await;
}

#[tokio::test]
async fn vector_search_ranks_the_closest_vector_first() {
    let dir = tempfile::tempdir().unwrap();
    let node = TestNode::spawn(1, dir.path(), kvstore::config::Role::Primary, vec![]).await;

    request(node.addr, json!({"op": "add_vector", "key": "v1", "vector": [1.0, 0.0]})).await;
    request(node.addr, json!({"op": "add_vector", "key": "v2", "vector": [0.0, 1.0]})).await;

    let resp = request(
        node.addr,
        json!({"op": "vector_search", "vector": [1.0, 0.0], "top_k": 1}),
    )
    .await;
    let results = resp["result"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["key"], "v1");
    node.shutdown().await;
}
