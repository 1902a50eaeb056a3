//! # game_server: headless authoritative server
//!
//! Owns the simulation. Clients mirror it through synced values, transform
//! and args broadcasts, and custom messages, all carried over NATS.
//!
//! ## Startup Sequence
//!
//! 1. Build a headless [`Game`] and register the stock spawnables.
//! 2. Spawn the level, if one was given.
//! 3. Connect to NATS (`--nats-url`, else `NATS_URL`, else localhost) and
//!    hand the server network to the game.
//! 4. Pump inbound events into the game and drive the loop until Ctrl-C.

mod handlers;
mod level;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use game_core::{Game, GameConfig};
use game_entities::register_defaults;
use game_net::{NatsConnection, NatsServerNetwork, NetConfig, NetworkHandle};

#[derive(Parser, Debug)]
#[command(name = "game_server", about = "Headless authoritative game server over NATS")]
struct Args {
    /// NATS server URL. Defaults to `$NATS_URL` or `nats://localhost:4222`.
    #[arg(short, long)]
    nats_url: Option<String>,

    /// Physics ticks per second.
    #[arg(short, long, default_value_t = 60.0)]
    tickrate: f64,

    /// Warn when one frame has to run more ticks than this.
    #[arg(long, default_value_t = 30)]
    catch_up_warn_ticks: u32,

    /// Level file to spawn at startup.
    #[arg(short, long)]
    level: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("game_server=info".parse()?))
        .init();

    let args = Args::parse();
    info!(tickrate = args.tickrate, "game server starting");

    let config = GameConfig::default()
        .with_tickrate(args.tickrate)
        .with_catch_up_warn_ticks(args.catch_up_warn_ticks);
    let game = Game::new(config)?;
    register_defaults(&game)?;

    if let Some(path) = &args.level {
        let definitions = level::load(path)?;
        let spawned = game.spawn_many(&definitions, false).await;
        info!(
            level = %path.display(),
            spawned = spawned.len(),
            rejected = definitions.len() - spawned.len(),
            "level loaded"
        );
    }

    let net_config = match args.nats_url {
        Some(url) => NetConfig::from_env().with_url(url),
        None => NetConfig::from_env(),
    };
    info!(url = %net_config.url, "connecting to NATS");
    let conn = NatsConnection::connect(&net_config).await?;
    let (network, mut inbound) = NatsServerNetwork::start(conn).await?;
    game.init_network(NetworkHandle::Server(Arc::new(network)))?;
    handlers::install(&game);

    let pump = {
        let game = game.clone();
        tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                if let Err(e) = game.apply_inbound(event) {
                    warn!(error = %e, "inbound event rejected");
                }
            }
        })
    };
    let runner = {
        let game = game.clone();
        tokio::spawn(async move { game.run().await })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    game.shutdown().await;
    runner.await?;
    pump.abort();

    info!("game server shut down");
    Ok(())
}
