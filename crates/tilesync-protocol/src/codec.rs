//! Protobuf codec for the three wire messages.
//!
//! Stateless: `encode` never fails, `decode` reports the attempted kind and
//! the offending byte length.

use prost::Message as _;

use crate::messages::{Message, MessageKind, OwnershipsSnapshot, WireMessage};
use crate::{ClickRequest, DecodeError, Ownerships, TileUpdate};

/// Encode any wire message to protobuf bytes.
pub fn encode<M: WireMessage>(message: &M) -> Vec<u8> {
    message.encode_to_vec()
}

/// Decode bytes as a specific message type.
pub fn decode<M: WireMessage>(bytes: &[u8]) -> Result<M, DecodeError> {
    M::decode(bytes).map_err(|source| DecodeError::Malformed {
        kind: M::KIND,
        len: bytes.len(),
        source,
    })
}

/// Decode bytes as the message named by `kind`.
pub fn decode_message(kind: MessageKind, bytes: &[u8]) -> Result<Message, DecodeError> {
    Ok(match kind {
        MessageKind::ClickRequest => Message::ClickRequest(decode::<ClickRequest>(bytes)?),
        MessageKind::OwnershipsSnapshot => {
            Message::OwnershipsSnapshot(decode::<OwnershipsSnapshot>(bytes)?)
        }
        MessageKind::TileUpdate => Message::TileUpdate(decode::<TileUpdate>(bytes)?),
    })
}

/// Convert the wire snapshot (string keys) into the typed mapping.
pub fn ownerships_from_wire(snapshot: OwnershipsSnapshot) -> Result<Ownerships, DecodeError> {
    let len = snapshot.encoded_len();
    snapshot
        .bindings
        .into_iter()
        .map(|(key, country)| match key.parse() {
            Ok(tile_id) => Ok((tile_id, country)),
            Err(_) => Err(DecodeError::InvalidTileKey {
                kind: MessageKind::OwnershipsSnapshot,
                len,
                key,
            }),
        })
        .collect()
}

/// Inverse of `ownerships_from_wire`.
pub fn ownerships_to_wire(ownerships: &Ownerships) -> OwnershipsSnapshot {
    OwnershipsSnapshot {
        bindings: ownerships
            .iter()
            .map(|(tile_id, country)| (tile_id.to_string(), country.clone()))
            .collect(),
    }
}
