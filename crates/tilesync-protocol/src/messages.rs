//! Wire message types.
//!
//! Hand-derived `prost` messages for the `clicks` schema. Field tags are the
//! schema version: never renumber, only add.

use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Click submission
// ============================================================================

/// "This country claims this tile." Sent once, never acknowledged directly.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct ClickRequest {
    #[prost(uint32, tag = "1")]
    pub tile_id: u32,
    #[prost(string, tag = "2")]
    pub country_id: String,
}

// ============================================================================
// Ownership snapshot
// ============================================================================

/// Full ownership mapping as carried on the wire.
///
/// Keys are decimal tile ids; see `codec::ownerships_from_wire`.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct OwnershipsSnapshot {
    #[prost(map = "string, string", tag = "1")]
    pub bindings: HashMap<String, String>,
}

// ============================================================================
// Push updates
// ============================================================================

/// One mapping entry changed. Delivered on the push channel.
#[derive(Clone, PartialEq, Eq, prost::Message)]
pub struct TileUpdate {
    #[prost(uint32, tag = "1")]
    pub tile_id: u32,
    #[prost(string, tag = "2")]
    pub country_id: String,
}

// ============================================================================
// Kinds
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    ClickRequest,
    OwnershipsSnapshot,
    TileUpdate,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::ClickRequest => "ClickRequest",
            MessageKind::OwnershipsSnapshot => "Ownerships",
            MessageKind::TileUpdate => "TileUpdate",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Any of the three wire messages, for kind-driven decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    ClickRequest(ClickRequest),
    OwnershipsSnapshot(OwnershipsSnapshot),
    TileUpdate(TileUpdate),
}

impl Message {
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::ClickRequest(_) => MessageKind::ClickRequest,
            Message::OwnershipsSnapshot(_) => MessageKind::OwnershipsSnapshot,
            Message::TileUpdate(_) => MessageKind::TileUpdate,
        }
    }
}

/// Binds a message type to its kind tag.
pub trait WireMessage: prost::Message + Default + Sized {
    const KIND: MessageKind;
}

impl WireMessage for ClickRequest {
    const KIND: MessageKind = MessageKind::ClickRequest;
}

impl WireMessage for OwnershipsSnapshot {
    const KIND: MessageKind = MessageKind::OwnershipsSnapshot;
}

impl WireMessage for TileUpdate {
    const KIND: MessageKind = MessageKind::TileUpdate;
}
