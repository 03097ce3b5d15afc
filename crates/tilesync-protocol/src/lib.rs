//! tilesync protocol -- wire messages, protobuf codec, JSON envelope.
//!
//! Request/response bodies: protobuf bytes wrapped in a JSON envelope.
//! Push frames: raw protobuf `TileUpdate`, one per binary WebSocket frame.

pub mod codec;
pub mod envelope;
pub mod messages;

pub use codec::{decode, decode_message, encode, ownerships_from_wire, ownerships_to_wire};
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use messages::*;

use std::collections::BTreeMap;

/// Protocol-side tile identifier.
///
/// Tile ids are non-negative. The server numbers tiles from zero, so `uint32`
/// on the wire is byte-identical to a non-negative `int32`. Snapshot keys
/// that do not parse as `u32` (including negative ones) are rejected.
pub type TileId = u32;

/// Owning country code (e.g. "US").
pub type CountryCode = String;

/// Typed ownership mapping: at most one owner per tile.
pub type Ownerships = BTreeMap<TileId, CountryCode>;

/// Request path for click submission.
pub const CLICK_PATH: &str = "/app/click";

/// Request path for the ownership snapshot.
pub const OWNERSHIPS_PATH: &str = "/app/ownerships";

/// Push channel path, appended to the base address.
pub const LISTEN_PATH: &str = "/ws/listen";

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to decode {kind} from {len} bytes: {source}")]
    Malformed {
        kind: MessageKind,
        len: usize,
        source: prost::DecodeError,
    },
    #[error("invalid tile key {key:?} in {kind} of {len} bytes")]
    InvalidTileKey {
        kind: MessageKind,
        len: usize,
        key: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum EnvelopeError {
    /// Bad JSON, or a `data` field that is not valid base64.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
