//! The message unit carried across the queue boundary.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::destination::Destination;

/// Queue message pairing one destination with the original webhook payload.
///
/// Created by ingestion fan-out, serialized onto the durable queue, and
/// consumed by the delivery worker. The body bytes are identical between
/// what ingestion read and what the worker sends; nothing in the relay
/// inspects or rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// The delivery target, owned by value.
    pub destination: Destination,

    /// Opaque payload, forwarded verbatim. Travels as standard base64 inside
    /// the envelope JSON so non-JSON bodies survive the queue hop unchanged.
    #[serde(with = "body_transport")]
    pub body: Bytes,

    /// Name of the request header this destination was extracted from.
    /// Diagnostic only.
    pub origin_header: String,
}

impl Envelope {
    /// Pairs a destination with the payload it should receive.
    pub fn new(destination: Destination, body: Bytes, origin_header: impl Into<String>) -> Self {
        Self { destination, body, origin_header: origin_header.into() }
    }

    /// Serializes the envelope into its queue wire form.
    ///
    /// # Errors
    ///
    /// Returns the underlying serialization error; callers treat this as a
    /// per-declaration failure.
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Deserializes an envelope from its queue wire form.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error. A payload that fails
    /// here can never become well-formed on retry, so workers reject the
    /// message terminally.
    pub fn from_bytes(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

mod body_transport {
    //! Standard-base64 transport for the envelope body bytes.

    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map(Bytes::from).map_err(serde::de::Error::custom)
    }
}
