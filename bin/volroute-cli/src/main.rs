//! VolRoute CLI - Volume lookup from the command line
//!
//! Connects to the masters as a client, then resolves file ids, reports
//! the leader, or follows the cluster's volume and peer changes.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use volroute_client::{MasterClient, PeerUpdate};
use volroute_common::{ClientConfig, Error, ServerAddress};

#[derive(Parser, Debug)]
#[command(name = "volroute-cli")]
#[command(about = "VolRoute master client CLI")]
#[command(version)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "/etc/volroute/client.toml")]
    config: String,

    /// Master address (host:port), may be repeated
    #[arg(short, long, env = "VOLROUTE_MASTERS", value_delimiter = ',')]
    master: Vec<String>,

    /// Filer group to join
    #[arg(long)]
    filer_group: Option<String>,

    /// Client type reported to the masters
    #[arg(long)]
    client_type: Option<String>,

    /// Preferred data center for lookups
    #[arg(long)]
    data_center: Option<String>,

    /// Seconds to wait for a leader before giving up
    #[arg(long, default_value_t = 10)]
    connect_wait: u64,

    /// Log level
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve file ids to download URLs
    Lookup {
        /// File ids (e.g. 3,01637037d6)
        #[arg(required = true)]
        file_ids: Vec<String>,
    },
    /// Show the current leader
    Leader,
    /// Follow volume and peer changes pushed by the leader
    Watch {
        /// Seconds between routing table summaries
        #[arg(short, long, default_value_t = 10)]
        interval: u64,
    },
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let mut config: ClientConfig = if std::path::Path::new(&args.config).exists() {
        let config_str = std::fs::read_to_string(&args.config)
            .with_context(|| format!("reading {}", args.config))?;
        toml::from_str(&config_str).unwrap_or_else(|e| {
            eprintln!("Warning: Failed to parse config file: {e}");
            ClientConfig::default()
        })
    } else {
        ClientConfig::default()
    };

    // CLI takes precedence
    if !args.master.is_empty() {
        config.masters.clone_from(&args.master);
    }
    if let Some(filer_group) = &args.filer_group {
        config.filer_group.clone_from(filer_group);
    }
    if let Some(client_type) = &args.client_type {
        config.client_type.clone_from(client_type);
    }
    if let Some(data_center) = &args.data_center {
        config.data_center.clone_from(data_center);
    }

    config.validate()?;
    Ok(config)
}

async fn wait_for_leader(client: &MasterClient, wait: Duration) -> Result<ServerAddress> {
    let leader = tokio::time::timeout(wait, client.wait_until_connected())
        .await
        .map_err(|_| Error::NoLeader)?;
    Ok(leader)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = load_config(&args)?;
    let client = Arc::new(MasterClient::with_grpc(&config)?);
    info!("Starting master client as {}", client.identity());
    let supervisor = client.start();
    let connect_wait = Duration::from_secs(args.connect_wait);

    match args.command {
        Commands::Lookup { file_ids } => {
            wait_for_leader(&client, connect_wait).await?;
            for file_id in &file_ids {
                match client.lookup_file_id_with_fallback(file_id).await {
                    Ok(urls) => {
                        for url in urls {
                            println!("{file_id}\t{url}");
                        }
                    }
                    Err(e) => println!("{file_id}\terror: {e}"),
                }
            }
        }
        Commands::Leader => {
            let leader = wait_for_leader(&client, connect_wait).await?;
            println!("Leader: {leader}");
            match client.find_leader_from_other_peers(&leader).await {
                Some(peer_view) if peer_view != leader => {
                    warn!("peers report a different leader: {}", peer_view);
                    println!("Peers report: {peer_view}");
                }
                _ => {}
            }
            println!("Masters:");
            for master in client.get_masters().await {
                println!("  {master}");
            }
        }
        Commands::Watch { interval } => {
            client.on_peer_update(Arc::new(|update: &PeerUpdate, at: SystemTime| {
                let at = at
                    .duration_since(SystemTime::UNIX_EPOCH)
                    .map_or(0, |d| d.as_secs());
                let sign = if update.is_add { '+' } else { '-' };
                println!(
                    "[{at}] {sign} {} {} leader:{}",
                    update.node_type, update.address, update.is_leader
                );
            }));

            let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let table = client.routing_table();
                        let master = client
                            .current_master()
                            .map_or_else(|| "(none)".to_string(), |m| m.to_string());
                        println!(
                            "master: {master} volumes: {} ec volumes: {}",
                            table.volume_count(),
                            table.ec_volume_count()
                        );
                    }
                    _ = tokio::signal::ctrl_c() => {
                        print!("{}", client.counters().export_prometheus());
                        break;
                    }
                }
            }
        }
    }

    supervisor.abort();
    Ok(())
}
