//! Backend facade -- the three capabilities application code consumes.
//!
//! Each capability is its own trait so a test can fake one without the
//! others. [`HttpBackend`] implements all three over any [`Transport`].

use std::future::Future;

use reqwest::Method;
use tilesync_protocol::{
    decode, encode, ownerships_from_wire, ClickRequest, OwnershipsSnapshot, TileUpdate,
    CLICK_PATH, OWNERSHIPS_PATH,
};

use crate::subscription::Subscription;
use crate::transport::{ClientConfig, HttpTransport, Transport, TransportError};
use crate::{ClientError, Ownerships, TileId};

/// Submit a claim. Resolves on transport acceptance only; the authoritative
/// result arrives later as a push update.
pub trait TileClicker: Send + Sync {
    fn click_tile(
        &self,
        tile_id: TileId,
        country_id: &str,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;
}

/// One-shot read of the full ownership mapping.
pub trait OwnershipsGetter: Send + Sync {
    fn get_current_ownerships(&self) -> impl Future<Output = Result<Ownerships, ClientError>> + Send;
}

/// Live ownership changes, in arrival order, until the subscription closes.
pub trait UpdatesListener: Send + Sync {
    fn listen_for_updates<F>(
        &self,
        on_tile_changed: F,
    ) -> impl Future<Output = Result<Subscription, ClientError>> + Send
    where
        F: FnMut(TileId, String) + Send + 'static;
}

/// Networked backend: protobuf over the request/response and push channels.
#[derive(Debug, Clone)]
pub struct HttpBackend<T = HttpTransport> {
    transport: T,
}

impl HttpBackend<HttpTransport> {
    pub fn connect(config: &ClientConfig) -> Result<Self, TransportError> {
        Ok(Self::new(HttpTransport::new(config)?))
    }
}

impl<T: Transport> HttpBackend<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> TileClicker for HttpBackend<T> {
    async fn click_tile(&self, tile_id: TileId, country_id: &str) -> Result<(), ClientError> {
        let payload = encode(&ClickRequest {
            tile_id,
            country_id: country_id.to_string(),
        });
        tracing::debug!(tile_id, country_id, "submitting click");
        match self
            .transport
            .send(Method::POST, CLICK_PATH, Some(&payload))
            .await
        {
            Ok(_) => Ok(()),
            // The status was already a success; whatever the body holds is
            // not part of the click contract.
            Err(TransportError::Envelope(e)) => {
                tracing::debug!(tile_id, error = %e, "ignoring click response body");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<T: Transport> OwnershipsGetter for HttpBackend<T> {
    async fn get_current_ownerships(&self) -> Result<Ownerships, ClientError> {
        // An empty snapshot encodes to zero bytes, which the server sends as
        // an absent payload.
        let Some(bytes) = self.transport.send(Method::GET, OWNERSHIPS_PATH, None).await? else {
            return Ok(Ownerships::new());
        };
        let snapshot: OwnershipsSnapshot = decode(&bytes)?;
        let ownerships = ownerships_from_wire(snapshot)?;
        tracing::debug!(tiles = ownerships.len(), "fetched ownership snapshot");
        Ok(ownerships)
    }
}

impl<T: Transport> UpdatesListener for HttpBackend<T> {
    async fn listen_for_updates<F>(&self, mut on_tile_changed: F) -> Result<Subscription, ClientError>
    where
        F: FnMut(TileId, String) + Send + 'static,
    {
        let subscription = self
            .transport
            .subscribe(move |frame: &[u8]| {
                dispatch_frame(frame, &mut on_tile_changed);
            })
            .await?;
        Ok(subscription)
    }
}

/// Decode one push frame and hand it to the callback. Malformed frames are
/// logged and dropped. Returns whether the callback ran.
pub(crate) fn dispatch_frame<F>(frame: &[u8], on_tile_changed: &mut F) -> bool
where
    F: FnMut(TileId, String),
{
    match decode::<TileUpdate>(frame) {
        Ok(update) => {
            on_tile_changed(update.tile_id, update.country_id);
            true
        }
        Err(e) => {
            tracing::warn!(len = frame.len(), error = %e, "dropping malformed push frame");
            false
        }
    }
}
