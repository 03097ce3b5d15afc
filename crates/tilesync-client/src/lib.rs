//! tilesync client -- keeps tile ownership in step with the server.
//!
//! Layers, leaves first:
//!   transport    HTTP request/response + WebSocket push under one base address
//!   backend      the three capability traits and the networked facade
//!   local        in-memory backend for offline play and tests
//!   store        caller-owned ownership mapping
//!   reconnect    backoff policy
//!   sync         subscribe, snapshot, replay, resubscribe on loss
//!   tiles        rendering tile id <-> protocol tile id lookup

pub mod backend;
pub mod local;
pub mod reconnect;
pub mod store;
pub mod subscription;
pub mod sync;
pub mod tiles;
pub mod transport;

pub use backend::{HttpBackend, OwnershipsGetter, TileClicker, UpdatesListener};
pub use local::LocalBackend;
pub use reconnect::ReconnectPolicy;
pub use store::OwnershipStore;
pub use subscription::{Subscription, SubscriptionEnd, SubscriptionGuard};
pub use sync::{SyncError, SyncEvent, Synchronizer};
pub use tiles::{TileIndex, TileIndexError};
pub use transport::{ClientConfig, HttpTransport, Transport, TransportError};

pub use reqwest::Method;
pub use tilesync_protocol::{CountryCode, DecodeError, Ownerships, TileId};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}
