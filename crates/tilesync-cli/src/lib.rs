//! tilesync CLI library -- config, backend selection and the `watch` loop.
//!
//! The binary in `main.rs` parses arguments and wires Ctrl-C and stdin into
//! the functions here.

pub mod config;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use tilesync_client::{
    ClientError, HttpBackend, LocalBackend, OwnershipStore, OwnershipsGetter, Ownerships,
    ReconnectPolicy, Subscription, SyncEvent, Synchronizer, TileClicker, TileId, TileIndex,
    UpdatesListener,
};

use crate::config::SyncConfig;

/// Log filter when `RUST_LOG` is unset. `tilesync` is the binary's target.
pub const DEFAULT_LOG_FILTER: &str = "tilesync=info,tilesync_cli=info,tilesync_client=info";

/// Lines buffered between the stdin thread and the click loop.
const STDIN_BUFFER: usize = 64;

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs_or_home() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn dirs_or_home() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// The backend the binary talks to, chosen at startup.
#[derive(Clone)]
pub enum Backend {
    Http(HttpBackend),
    Local(LocalBackend),
}

impl Backend {
    pub fn from_config(cfg: &SyncConfig, offline: bool) -> anyhow::Result<Self> {
        if offline {
            tracing::info!("using offline backend");
            return Ok(Self::Local(LocalBackend::new()));
        }
        let client = cfg.client_config();
        let backend = HttpBackend::connect(&client)
            .with_context(|| format!("invalid base address {:?}", client.base_address))?;
        tracing::info!(
            base = backend.transport().base_url(),
            push = %backend.transport().push_url(),
            "using http backend"
        );
        Ok(Self::Http(backend))
    }
}

impl TileClicker for Backend {
    async fn click_tile(&self, tile_id: TileId, country_id: &str) -> Result<(), ClientError> {
        match self {
            Self::Http(b) => b.click_tile(tile_id, country_id).await,
            Self::Local(b) => b.click_tile(tile_id, country_id).await,
        }
    }
}

impl OwnershipsGetter for Backend {
    async fn get_current_ownerships(&self) -> Result<Ownerships, ClientError> {
        match self {
            Self::Http(b) => b.get_current_ownerships().await,
            Self::Local(b) => b.get_current_ownerships().await,
        }
    }
}

impl UpdatesListener for Backend {
    async fn listen_for_updates<F>(&self, on_tile_changed: F) -> Result<Subscription, ClientError>
    where
        F: FnMut(TileId, String) + Send + 'static,
    {
        match self {
            Self::Http(b) => b.listen_for_updates(on_tile_changed).await,
            Self::Local(b) => b.listen_for_updates(on_tile_changed).await,
        }
    }
}

/// Load the tile index named in config, if any.
pub fn load_tile_index(cfg: &SyncConfig) -> anyhow::Result<Option<TileIndex>> {
    let Some(path) = cfg.tiles.index.as_deref() else {
        return Ok(None);
    };
    let path = expand_tilde(path);
    let index = TileIndex::load(&path)
        .with_context(|| format!("loading tile index {}", path.display()))?;
    Ok(Some(index))
}

/// A tile argument is either a protocol id or a rendering id from the index.
pub fn resolve_tile(index: Option<&TileIndex>, tile: &str) -> anyhow::Result<TileId> {
    if let Ok(id) = tile.parse::<TileId>() {
        return Ok(id);
    }
    let index = index.ok_or_else(|| {
        anyhow::anyhow!("tile {tile:?} is not numeric and no tile index is configured")
    })?;
    index
        .id_of(tile)
        .ok_or_else(|| anyhow::anyhow!("unknown tile {tile:?}"))
}

/// Parse a `<tile> <country>` line typed during `watch`. Blank lines and
/// `#` comments yield `None`.
pub fn parse_click_line(
    index: Option<&TileIndex>,
    line: &str,
) -> anyhow::Result<Option<(TileId, String)>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let mut parts = line.split_whitespace();
    let (Some(tile), Some(country), None) = (parts.next(), parts.next(), parts.next()) else {
        anyhow::bail!("expected `<tile> <country>`, got {line:?}");
    };
    Ok(Some((resolve_tile(index, tile)?, country.to_string())))
}

/// Read stdin lines on a dedicated OS thread.
///
/// A blocked read never holds up runtime shutdown: the thread is detached
/// and dies with the process.
pub fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(STDIN_BUFFER);
    let spawned = std::thread::Builder::new()
        .name("tilesync-stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin read failed");
                        break;
                    }
                }
            }
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "stdin reader not started");
    }
    rx
}

/// Submit a click for every `<tile> <country>` line until `shutdown` fires
/// or the line source ends.
pub async fn submit_clicks<B: TileClicker>(
    backend: B,
    index: Option<Arc<TileIndex>>,
    mut lines: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            _ = shutdown.cancelled() => return,
            line = lines.recv() => line,
        };
        let Some(line) = line else {
            return;
        };
        match parse_click_line(index.as_deref(), &line) {
            Ok(Some((tile_id, country_id))) => {
                if let Err(e) = backend.click_tile(tile_id, &country_id).await {
                    tracing::warn!(tile_id, error = %e, "click failed");
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring input"),
        }
    }
}

/// Follow ownership changes and submit clicks from `lines` until `shutdown`
/// fires or the reconnect policy gives up.
pub async fn watch(
    backend: Backend,
    index: Option<TileIndex>,
    policy: ReconnectPolicy,
    lines: mpsc::Receiver<String>,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let store = Arc::new(RwLock::new(OwnershipStore::new()));
    let sync = Synchronizer::new(backend.clone(), store, policy);
    let index = index.map(Arc::new);

    tokio::spawn(log_events(sync.subscribe_events(), index.clone()));
    tokio::spawn(submit_clicks(backend, index, lines, shutdown.clone()));

    let result = sync.run(shutdown.clone()).await;
    // Stops the click loop when the policy gave up.
    shutdown.cancel();
    result?;
    Ok(())
}

async fn log_events(mut events: broadcast::Receiver<SyncEvent>, index: Option<Arc<TileIndex>>) {
    loop {
        match events.recv().await {
            Ok(SyncEvent::Snapshot { tiles }) => {
                tracing::info!(tiles, "snapshot loaded");
            }
            Ok(SyncEvent::TileChanged {
                tile_id,
                country_id,
                previous,
            }) => {
                let name = index.as_deref().and_then(|i| i.tile_of(tile_id));
                tracing::info!(
                    tile_id,
                    tile = name.unwrap_or("-"),
                    country_id = %country_id,
                    previous = previous.as_deref().unwrap_or("-"),
                    "tile changed"
                );
            }
            Ok(SyncEvent::Disconnected { reason }) => {
                tracing::warn!(reason = %reason, "disconnected, resyncing");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
