//! Outer message envelope and payload encoding.
//!
//! Bodies are serialised to JSON, encoded as padded standard base64, and
//! carried as the envelope's `payload` string.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::framing::encode_frame;
use crate::messages::{INVALID_MESSAGE_FORMAT, MessageType, UNSUPPORTED_MESSAGE_TYPE};

/// The outer shape shared by every frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Message tag.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Base64-encoded JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl Envelope {
    /// Builds an envelope with no payload.
    #[must_use]
    pub fn bare(message_type: MessageType) -> Self {
        Self {
            message_type: String::from(message_type.as_str()),
            payload: None,
        }
    }

    /// Builds an envelope carrying `body`.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when `body` cannot be serialised.
    pub fn with_body<T: Serialize>(
        message_type: MessageType,
        body: &T,
    ) -> Result<Self, EncodeError> {
        Ok(Self {
            message_type: String::from(message_type.as_str()),
            payload: Some(encode_payload(body)?),
        })
    }

    /// Parses the outer shape of a frame.
    ///
    /// Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Envelope`] when the frame is not a JSON object
    /// with a string `type`.
    pub fn decode(frame: &[u8]) -> Result<Self, DecodeError> {
        serde_json::from_slice(frame.trim_ascii()).map_err(DecodeError::Envelope)
    }

    /// Serialises the envelope without a delimiter.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when serialisation fails.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Serialises the envelope and terminates it as a frame.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError`] when serialisation fails.
    pub fn to_frame(&self) -> Result<Vec<u8>, EncodeError> {
        self.encode().map(|bytes| encode_frame(&bytes))
    }

    /// Known tag of this envelope.
    #[must_use]
    pub fn known_type(&self) -> Option<MessageType> {
        MessageType::parse(&self.message_type)
    }

    /// Decodes the payload as `T`.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Payload`] when the payload is absent, not
    /// base64, or not the expected shape.
    pub fn body<T: DeserializeOwned>(&self) -> Result<T, DecodeError> {
        decode_payload(self.payload.as_deref()).map_err(|source| DecodeError::Payload {
            message_type: self.message_type.clone(),
            source,
        })
    }
}

/// Encodes `body` as a base64 JSON payload.
///
/// # Errors
///
/// Returns [`EncodeError`] when `body` cannot be serialised.
pub fn encode_payload<T: Serialize>(body: &T) -> Result<String, EncodeError> {
    let json = serde_json::to_vec(body)?;
    Ok(STANDARD.encode(json))
}

/// Decodes a base64 JSON payload.
///
/// # Errors
///
/// Returns [`PayloadError`] when the payload is absent, not base64, or does
/// not deserialise as `T`.
pub fn decode_payload<T: DeserializeOwned>(payload: Option<&str>) -> Result<T, PayloadError> {
    let text = payload.ok_or(PayloadError::Missing)?;
    let json = STANDARD.decode(text.trim())?;
    serde_json::from_slice(&json).map_err(PayloadError::Body)
}

/// Reasons a payload could not be decoded.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// The envelope had no payload.
    #[error("payload is missing")]
    Missing,
    /// The payload was not valid base64.
    #[error("payload is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded payload did not match the expected body.
    #[error("payload body is malformed: {0}")]
    Body(#[source] serde_json::Error),
}

/// Errors raised while decoding inbound frames.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The frame is not a valid envelope.
    #[error("invalid envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// The tag is unknown or not a request.
    #[error("unsupported message type '{0}'")]
    Unsupported(String),
    /// The payload does not match the tag.
    #[error("invalid payload for '{message_type}': {source}")]
    Payload {
        /// Tag of the offending envelope.
        message_type: String,
        /// Underlying failure.
        #[source]
        source: PayloadError,
    },
}

impl DecodeError {
    /// Message reported to the peer for this failure.
    #[must_use]
    pub const fn peer_message(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => UNSUPPORTED_MESSAGE_TYPE,
            Self::Envelope(_) | Self::Payload { .. } => INVALID_MESSAGE_FORMAT,
        }
    }
}

/// Errors raised while encoding outbound messages.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Serialisation failed.
    #[error("failed to serialise message: {0}")]
    Json(#[from] serde_json::Error),
}

pub(crate) mod base64_bytes {
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S: Serializer>(
        bytes: &[u8],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(D::Error::custom)
    }
}
