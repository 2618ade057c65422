use std::env;

use zehnder_rainmaker::{Poller, RainmakerClient, presentables};

/// Run with: cargo test --test integration -- --ignored
/// Requires a reachable RainMaker deployment:
///   RAINMAKER_URL=https://api.example.com \
///   RAINMAKER_USER=... RAINMAKER_PASS=... cargo test --test integration -- --ignored
fn client_from_env() -> RainmakerClient {
    let base_url = env::var("RAINMAKER_URL").expect("RAINMAKER_URL not set");
    let username = env::var("RAINMAKER_USER").expect("RAINMAKER_USER not set");
    let password = env::var("RAINMAKER_PASS").expect("RAINMAKER_PASS not set");
    RainmakerClient::builder(base_url, username, password).build()
}

#[tokio::test]
#[ignore]
async fn connect_and_poll_live() {
    let mut client = client_from_env();
    client.connect().await.expect("connect failed");

    let mut poller = Poller::new(client);
    let snapshot = poller.refresh().await.expect("refresh failed");

    assert!(!snapshot.is_empty(), "account should have at least one node");
    for node in snapshot.nodes() {
        assert!(!node.params.is_empty(), "node {} has no params", node.node_id);
        // Every readable parameter should classify without panicking.
        let views = presentables(node);
        println!(
            "{} ({}): {} presentable params",
            node.display_name,
            node.node_id,
            views.len()
        );
    }
}

#[tokio::test]
#[ignore]
async fn second_refresh_supersedes_snapshot() {
    let mut client = client_from_env();
    client.connect().await.expect("connect failed");

    let mut poller = Poller::new(client);
    let first = poller.refresh().await.expect("first refresh failed");
    let second = poller.refresh().await.expect("second refresh failed");

    assert!(!std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.node_count(), second.node_count());
}
