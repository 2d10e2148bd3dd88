use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::watch;

use super::*;
use crate::ConfigRule;
use crate::Key;
use crate::LiveConfig;
use crate::Schema;
use crate::StagedConfig;

fn live_config() -> LiveConfig {
    let schema = Schema::new()
        .rule(ConfigRule::scalar("name"))
        .rule(ConfigRule::scalar("age").int())
        .rule(ConfigRule::scalar("config-version").int().default("0"));
    let mut staged = StagedConfig::new();
    staged.insert(Key::scalar("name"), "James Dean");
    staged.insert(Key::scalar("age"), "12");

    LiveConfig::new(schema.apply(&staged).unwrap())
}

#[tokio::test]
async fn test_root_returns_live_snapshot_as_json() {
    let route = routes(live_config());

    // Simulate request
    let response = warp::test::request()
        .method("GET")
        .path("/")
        .reply(&route)
        .await;

    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers().get("Content-Type"),
        Some(&"application/json".parse().unwrap())
    );
    let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "name": "James Dean", "age": 12, "config-version": 0 })
    );
}

#[tokio::test]
async fn test_other_paths_are_not_found() {
    let route = routes(live_config());

    let response = warp::test::request()
        .method("GET")
        .path("/metrics")
        .reply(&route)
        .await;

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_server_stops_on_shutdown_signal() {
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let addr: SocketAddr = ([127, 0, 0, 1], 0).into();
    let server = tokio::spawn(start_server(addr, live_config(), shutdown_rx));

    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(1), server)
        .await
        .expect("server must stop after shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}
