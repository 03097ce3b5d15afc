//! In-memory backend for offline play and tests.
//!
//! A click is applied immediately and broadcast to every listener, the same
//! shape the server produces: acknowledgement arrives as an update.

use std::sync::{Arc, RwLock};

use tilesync_protocol::TileUpdate;
use tokio::sync::broadcast;

use crate::backend::{OwnershipsGetter, TileClicker, UpdatesListener};
use crate::subscription::{Subscription, SubscriptionEnd};
use crate::{ClientError, Ownerships, TileId};

/// Updates buffered per listener before it starts lagging.
const UPDATE_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct LocalBackend {
    inner: Arc<LocalState>,
}

struct LocalState {
    bindings: RwLock<Ownerships>,
    updates: broadcast::Sender<TileUpdate>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::with_ownerships(Ownerships::new())
    }

    pub fn with_ownerships(ownerships: Ownerships) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);
        Self {
            inner: Arc::new(LocalState {
                bindings: RwLock::new(ownerships),
                updates,
            }),
        }
    }

    fn read(&self) -> Ownerships {
        match self.inner.bindings.read() {
            Ok(bindings) => bindings.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl TileClicker for LocalBackend {
    async fn click_tile(&self, tile_id: TileId, country_id: &str) -> Result<(), ClientError> {
        {
            let mut bindings = match self.inner.bindings.write() {
                Ok(bindings) => bindings,
                Err(poisoned) => poisoned.into_inner(),
            };
            bindings.insert(tile_id, country_id.to_string());
        }
        // No listeners is fine.
        let listeners = self
            .inner
            .updates
            .send(TileUpdate {
                tile_id,
                country_id: country_id.to_string(),
            })
            .unwrap_or(0);
        tracing::debug!(tile_id, country_id, listeners, "local click applied");
        Ok(())
    }
}

impl OwnershipsGetter for LocalBackend {
    async fn get_current_ownerships(&self) -> Result<Ownerships, ClientError> {
        Ok(self.read())
    }
}

impl UpdatesListener for LocalBackend {
    async fn listen_for_updates<F>(&self, mut on_tile_changed: F) -> Result<Subscription, ClientError>
    where
        F: FnMut(TileId, String) + Send + 'static,
    {
        let mut updates = self.inner.updates.subscribe();
        let (subscription, guard) = Subscription::pair();

        tokio::spawn(async move {
            let end = loop {
                let received = tokio::select! {
                    biased;
                    _ = guard.cancelled() => break SubscriptionEnd::Disposed,
                    received = updates.recv() => received,
                };
                match received {
                    Ok(update) => {
                        if !guard.is_open() {
                            break SubscriptionEnd::Disposed;
                        }
                        on_tile_changed(update.tile_id, update.country_id);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "local listener lagged, updates dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break SubscriptionEnd::Closed,
                }
            };
            guard.finish(end);
        });

        Ok(subscription)
    }
}
