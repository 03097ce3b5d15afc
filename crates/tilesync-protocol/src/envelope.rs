//! Text-safe JSON envelope for request/response bodies.
//!
//! Requests carry the encoded message as a JSON array of byte values:
//! `{"data": [8, 3, 18, 2, 68, 69]}`. Responses carry it as base64 text:
//! `{"data": "CAMSAkRF"}`. A missing, null or empty `data` field is
//! "absent", which is not the same thing as zero decoded bytes.

use serde::{Deserialize, Serialize};

use crate::EnvelopeError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub data: Vec<u8>,
}

impl RequestEnvelope {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn from_json(body: &[u8]) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_slice(body)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(default, with = "base64_payload")]
    pub data: Option<Vec<u8>>,
}

impl ResponseEnvelope {
    pub fn new(data: Option<Vec<u8>>) -> Self {
        Self { data }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Unwrap a response body. An empty body is treated as an absent payload.
    pub fn unwrap_body(body: &[u8]) -> Result<Option<Vec<u8>>, EnvelopeError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        let envelope: ResponseEnvelope = serde_json::from_slice(body)?;
        Ok(envelope.data)
    }
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Serialize `Option<Vec<u8>>` as base64 text; accept base64 text or a byte
/// array on the way in. Empty text or an empty array means absent.
mod base64_payload {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{self, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Text(String),
        Bytes(Vec<u8>),
    }

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let repr = Option::<Repr>::deserialize(deserializer)?;
        let bytes = match repr {
            None => return Ok(None),
            Some(Repr::Text(s)) => STANDARD.decode(&s).map_err(serde::de::Error::custom)?,
            Some(Repr::Bytes(b)) => b,
        };
        Ok(if bytes.is_empty() { None } else { Some(bytes) })
    }
}
