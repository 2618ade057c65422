use std::env;
use std::time::Duration;

use zehnder_rainmaker::{Poller, Presentable, RainmakerClient, presentables};

#[tokio::main]
async fn main() -> zehnder_rainmaker::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let base_url = args
        .get(1)
        .expect("usage: monitor <base-url> <username> <password>");
    let username = args.get(2).expect("missing username");
    let password = args.get(3).expect("missing password");

    let mut client = RainmakerClient::builder(base_url, username, password).build();

    println!("Connecting to {base_url}...");
    client.connect().await?;
    println!("Connected. Polling every 30s...");

    let poller = Poller::new(client)
        .interval(Duration::from_secs(30))
        .on_snapshot(|snapshot| {
            for node in snapshot.nodes() {
                println!("== {} ({})", node.display_name, node.node_id);
                for view in presentables(node) {
                    match view {
                        Presentable::Climate(c) => println!(
                            "  climate: {:?} -> {:?}{}",
                            c.current_temperature(),
                            c.target_temperature(),
                            if c.is_off() { " | OFF" } else { "" },
                        ),
                        Presentable::Switch(s) => {
                            println!("  switch {}: {:?}", s.name, s.is_on())
                        }
                        Presentable::Number(n) => println!(
                            "  number {}: {:?} [{:?}..{:?}]",
                            n.name,
                            n.value(),
                            n.min(),
                            n.max(),
                        ),
                        Presentable::BinarySensor(b) => {
                            println!("  binary {}: {:?}", b.name, b.is_on())
                        }
                        Presentable::Sensor(s) => {
                            println!("  sensor {}: {}", s.name, s.value())
                        }
                    }
                }
            }
        })
        .on_error(|err| eprintln!("Poll error: {err}"));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(true);
    });

    poller.run(shutdown_rx).await;
    Ok(())
}
