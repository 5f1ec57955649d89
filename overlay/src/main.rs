use clap::Parser;
use log::info;
use overlay::bridge::HostBridge;
use overlay::config::OverlayConfig;
use overlay::random::{RandomSource, StdRandom};
use overlay::session::InitialModeParams;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address the host bridge listens on
    #[arg(short = 'b', long, default_value = "127.0.0.1:27080")]
    bind: String,

    /// JSON config file; built-in defaults when omitted
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Requested initial mode (loading, connecting, ingame, queue)
    #[arg(short = 'g', long, conflicts_with = "query")]
    gamemode: Option<String>,

    /// Page query string to read the gamemode from, e.g. "?gamemode=loading"
    #[arg(short = 'q', long)]
    query: Option<String>,

    /// Running inside the game client
    #[arg(long)]
    platform_host: bool,

    /// Seed for cosmetic randomness and track shuffling
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Session tick in milliseconds
    #[arg(short = 't', long, default_value = "10")]
    tick_ms: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if args.tick_ms == 0 {
        return Err("tick must be at least 1ms".into());
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {}", path.display());
            OverlayConfig::load(path)?
        }
        None => OverlayConfig::default(),
    };

    let params = match &args.query {
        Some(query) => InitialModeParams::from_query(query, args.platform_host),
        None => InitialModeParams {
            gamemode: args.gamemode.clone(),
            platform_host: args.platform_host,
        },
    };

    let random: Box<dyn RandomSource> = match args.seed {
        Some(seed) => {
            info!("Using random seed {}", seed);
            Box::new(StdRandom::seeded(seed))
        }
        None => Box::new(StdRandom::from_entropy()),
    };

    info!("Starting overlay...");
    let mut bridge = HostBridge::bind(
        &args.bind,
        &config,
        &params,
        random,
        Duration::from_millis(args.tick_ms),
    )
    .await?;

    tokio::select! {
        result = bridge.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}
