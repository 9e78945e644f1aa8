use std::path::PathBuf;

use clap::Parser;

use crate::config::OracleConfig;

#[derive(Parser, Debug)]
pub struct Args {
    #[arg(short, long)]
    pub config: PathBuf,

    #[arg(long)]
    pub dump: bool,

    #[arg(long)]
    pub dump_toml: bool,
}

pub fn execute(args: Args) -> anyhow::Result<()> {
    let config = OracleConfig::from_file(&args.config)?;
    config.validate()?;

    if args.dump {
        println!("{}", serde_json::to_string_pretty(&config)?);
    } else if args.dump_toml {
        println!("{}", toml::to_string_pretty(&config)?);
    } else {
        println!("✓ Configuration valid: {}", args.config.display());
        println!();
        println!("Node:");
        println!("  ID: {}", config.node.id.as_deref().unwrap_or("<auto>"));
        println!("  Min stake: {}", config.node.min_stake);
        println!("  Router: {}", config.node.router_bind);
        println!("  Publisher: {}", config.node.publisher_bind);
        println!();
        println!("Consensus:");
        println!("  Min nodes: {}", config.consensus.min_nodes);
        println!("  Threshold: {}", config.consensus.threshold);
        println!("  Outlier tolerance: {}", config.consensus.outlier_tolerance);
        println!();
        println!("Ledger:");
        println!("  RPC: {}", config.ledger.rpc);
        println!("  Chain ID: {}", config.ledger.chain_id);
        println!("  Scale: {}", config.ledger.scale);
        println!();
        println!("Sensors: {}", config.sensors.len());
        for (sensor_id, sensor) in config.sensors.iter() {
            println!("  - {sensor_id} ({:?}, every {}s)", sensor.adapter, sensor.polling_interval_secs);
        }
        println!();
        println!("Peers: {}", config.peers.peer_nodes.len());
        for peer in &config.peers.peer_nodes {
            println!("  - {} @ {}", peer.id, peer.router_address);
        }
    }

    Ok(())
}
