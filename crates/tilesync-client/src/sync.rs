//! Synchronizer -- reconnecting snapshot + update loop over any backend.
//!
//! One session:
//!   1. subscribe, buffering updates
//!   2. fetch the snapshot and replace the store
//!   3. replay buffered updates, then live ones, in arrival order
//! On terminal loss the session restarts after backoff. Subscribing before
//! the snapshot means no update is missed between the two; replaying an
//! update the snapshot already reflects is harmless.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::backend::{OwnershipsGetter, UpdatesListener};
use crate::reconnect::ReconnectPolicy;
use crate::store::OwnershipStore;
use crate::{ClientError, CountryCode, TileId};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Store replaced from a fresh snapshot.
    Snapshot { tiles: usize },
    TileChanged {
        tile_id: TileId,
        country_id: CountryCode,
        previous: Option<CountryCode>,
    },
    /// Push channel lost; a resync follows unless the policy gives up.
    Disconnected { reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("gave up after {attempts} consecutive failures: {last}")]
    GaveUp { attempts: u32, last: String },
}

enum SessionEnd {
    Shutdown,
    Lost { reason: String },
}

pub struct Synchronizer<B> {
    backend: B,
    store: Arc<RwLock<OwnershipStore>>,
    policy: ReconnectPolicy,
    events: broadcast::Sender<SyncEvent>,
}

impl<B> Synchronizer<B>
where
    B: OwnershipsGetter + UpdatesListener,
{
    pub fn new(backend: B, store: Arc<RwLock<OwnershipStore>>, policy: ReconnectPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            store,
            policy,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &Arc<RwLock<OwnershipStore>> {
        &self.store
    }

    /// Run until `shutdown` fires or the policy gives up.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), SyncError> {
        let mut failures = 0u32;
        let mut last = String::new();

        loop {
            if failures > 0 {
                if !self.policy.allows(failures) {
                    tracing::error!(attempts = failures, last = %last, "giving up on resync");
                    return Err(SyncError::GaveUp {
                        attempts: failures,
                        last,
                    });
                }
                let delay = self.policy.delay(failures);
                tracing::info!(
                    attempt = failures,
                    delay_ms = delay.as_millis() as u64,
                    "resync after backoff"
                );
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.session(&shutdown).await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Lost { reason }) => {
                    tracing::warn!(reason = %reason, "push channel lost");
                    let _ = self.events.send(SyncEvent::Disconnected {
                        reason: reason.clone(),
                    });
                    // The session had synced, so the failure streak restarts.
                    failures = 1;
                    last = reason;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "sync session failed");
                    failures = failures.saturating_add(1);
                    last = e.to_string();
                }
            }
        }
    }

    async fn session(&self, shutdown: &CancellationToken) -> Result<SessionEnd, ClientError> {
        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        let subscription = self
            .backend
            .listen_for_updates(move |tile_id, country_id| {
                let _ = update_tx.send((tile_id, country_id));
            })
            .await?;

        let snapshot = tokio::select! {
            _ = shutdown.cancelled() => {
                subscription.close();
                return Ok(SessionEnd::Shutdown);
            }
            snapshot = self.backend.get_current_ownerships() => snapshot?,
        };

        let tiles = snapshot.len();
        self.store.write().await.replace(snapshot);
        tracing::info!(tiles, "ownerships synchronised");
        let _ = self.events.send(SyncEvent::Snapshot { tiles });

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    subscription.close();
                    return Ok(SessionEnd::Shutdown);
                }
                update = update_rx.recv() => match update {
                    Some((tile_id, country_id)) => self.apply(tile_id, country_id).await,
                    // The reader dropped its callback: every delivered update
                    // has been applied and the subscription is over.
                    None => {
                        let end = subscription.closed().await;
                        return Ok(SessionEnd::Lost { reason: end.to_string() });
                    }
                },
            }
        }
    }

    async fn apply(&self, tile_id: TileId, country_id: CountryCode) {
        let previous = self.store.write().await.apply(tile_id, country_id.clone());
        tracing::debug!(tile_id, country_id = %country_id, ?previous, "tile changed");
        let _ = self.events.send(SyncEvent::TileChanged {
            tile_id,
            country_id,
            previous,
        });
    }
}
