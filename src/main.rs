use peer_dht::network::config::{NetworkConfig, parse_peer_addr};
use peer_dht::node::DhtNode;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} --config <file> [--self <addr:port>] [--verbose]", args[0]);
        eprintln!("Example: {} --config network.properties", args[0]);
        eprintln!(
            "Example: {} --config network.properties --self 127.0.0.1:20001",
            args[0]
        );

        std::process::exit(1);
    }

    let mut config_path: Option<PathBuf> = None;
    let mut self_arg: Option<String> = None;
    let mut verbose = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                config_path = Some(PathBuf::from(&args[i + 1]));
                i += 2;
            }
            "--self" if i + 1 < args.len() => {
                self_arg = Some(args[i + 1].clone());
                i += 2;
            }
            "--verbose" => {
                verbose = true;
                i += 1;
            }
            other => {
                eprintln!("Ignoring unknown argument {}", other);
                i += 1;
            }
        }
    }

    tracing_subscriber::fmt()
        .with_max_level(if verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config_path =
        config_path.ok_or_else(|| anyhow::anyhow!("--config <file> is required"))?;

    // 1. Static network description:
    let mut config = NetworkConfig::load(&config_path)?;
    if let Some(raw) = self_arg {
        let addr = parse_peer_addr(&raw, config.peer_port)?;
        config = config.with_self(addr)?;
    }

    tracing::info!(
        "Loaded {}: {} peers, {} replication node(s)",
        config_path.display(),
        config.network.len(),
        config.replication.len()
    );

    // 2. Peer components:
    let node = DhtNode::new(config)?;

    // 3. Spawn stats reporter:
    let stats_node = node.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));

        loop {
            interval.tick().await;
            let stats = stats_node.stats();
            tracing::info!(
                "Peer stats: {} owned, {} mirrored from {} owners, {} jobs pending",
                stats.partition_entries,
                stats.mirror_entries,
                stats.mirror_owners,
                stats.pending_replication
            );
            tracing::info!(
                "  - replication: delivered={} local={} unreachable={} errors={} dropped={}",
                stats.replication.delivered,
                stats.replication.applied_locally,
                stats.replication.unreachable,
                stats.replication.protocol_errors,
                stats.replication.dropped
            );
        }
    });

    // 4. Recover, then serve:
    node.run().await?;

    Ok(())
}
