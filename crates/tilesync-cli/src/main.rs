//! tilesync -- tile ownership client.
//!
//! Usage:
//!   tilesync                          # Watch ownership changes (default)
//!   tilesync --config path.toml       # Run with custom config
//!   tilesync snapshot                 # Print the current ownership map
//!   tilesync click 12 FR              # Claim tile 12 for FR
//!   tilesync --offline watch          # Play against an in-memory backend

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use tilesync_cli::config::SyncConfig;
use tilesync_cli::{
    expand_tilde, load_tile_index, resolve_tile, spawn_stdin_lines, watch, Backend,
    DEFAULT_LOG_FILTER,
};
use tilesync_client::{OwnershipsGetter, TileClicker};

#[derive(Parser)]
#[command(name = "tilesync", about = "Tile ownership synchronization client")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "~/.tilesync/config.toml")]
    config: String,

    /// Override the backend base address
    #[arg(long)]
    base_address: Option<String>,

    /// Use an in-memory backend instead of the server
    #[arg(long)]
    offline: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the current ownership map as JSON
    Snapshot,
    /// Claim a tile for a country
    Click {
        /// Protocol tile id, or rendering id when a tile index is configured
        tile: String,
        /// Country code
        country: String,
    },
    /// Follow ownership changes; `<tile> <country>` lines on stdin submit clicks (default)
    Watch,
    /// Resolve a rendering tile id and show its owner
    Tile {
        /// Rendering tile id
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let mut cfg = SyncConfig::load_or_default(&config_path)?;
    if let Some(address) = cli.base_address {
        cfg.backend.base_address = address;
    }

    let backend = Backend::from_config(&cfg, cli.offline)?;
    let index = load_tile_index(&cfg)?;

    match cli.command {
        Some(Commands::Snapshot) => {
            let ownerships = backend.get_current_ownerships().await?;
            println!("{}", serde_json::to_string_pretty(&ownerships)?);
        }
        Some(Commands::Click { tile, country }) => {
            let tile_id = resolve_tile(index.as_ref(), &tile)?;
            backend.click_tile(tile_id, &country).await?;
            println!("Submitted click: tile {tile_id} -> {country}");
        }
        Some(Commands::Tile { name }) => {
            let Some(index) = index else {
                anyhow::bail!("no tile index configured ([tiles] index)");
            };
            let Some(tile_id) = index.id_of(&name) else {
                eprintln!("Unknown tile: {name}");
                std::process::exit(1);
            };
            let ownerships = backend.get_current_ownerships().await?;
            let owner = ownerships.get(&tile_id).map(String::as_str).unwrap_or("(none)");
            println!("Tile: {name}");
            println!("Id: {tile_id}");
            println!("Owner: {owner}");
        }
        Some(Commands::Watch) | None => {
            let shutdown = CancellationToken::new();
            {
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::info!("shutting down");
                    }
                    shutdown.cancel();
                });
            }
            let lines = spawn_stdin_lines();
            watch(backend, index, cfg.reconnect_policy(), lines, shutdown).await?;
        }
    }

    Ok(())
}
