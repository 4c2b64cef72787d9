//! Destination declarations and their transport codec.
//!
//! A destination is one delivery target: the URL to POST to plus the
//! authorization material the outbound call must carry. Destinations travel
//! inside request header values as standard base64 over the text form
//! `url|auth_type|auth_value`.

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field delimiter inside the decoded declaration text.
const DELIMITER: char = '|';

/// Number of delimited fields in a declaration.
const PART_COUNT: usize = 3;

/// Errors produced while decoding a destination declaration.
///
/// Decode failures are per-declaration: the caller skips the offending
/// declaration and continues with its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The value is not valid base64, or decodes to non-UTF-8 bytes.
    #[error("destination declaration is not valid base64 text")]
    BadEncoding,

    /// The decoded text does not have the `url|auth_type|auth_value` shape,
    /// or the url field is empty.
    #[error("destination declaration must be url|auth_type|auth_value")]
    MalformedShape,
}

/// Authorization scheme attached to a destination.
///
/// The scheme set is closed-then-open: the well-known `none`/`bearer`/`basic`
/// schemes get dedicated variants, and any other scheme name is carried as a
/// custom header name/value pair.
#[derive(Clone, PartialEq, Eq)]
pub enum AuthScheme {
    /// No authorization header on the outbound call.
    None,
    /// `Authorization: Bearer <secret>`.
    Bearer(String),
    /// `Authorization: Basic <credentials>`, passed through as-is.
    Basic(String),
    /// A header named after the scheme itself, set to the declared value.
    Custom {
        /// Header name, taken verbatim from the declared scheme name.
        header: String,
        /// Header value.
        value: String,
    },
}

impl AuthScheme {
    /// Builds a scheme from the `(auth_type, auth_value)` string pair used
    /// by the transport encoding.
    pub fn from_parts(auth_type: &str, auth_value: &str) -> Self {
        match auth_type {
            "none" => Self::None,
            "bearer" => Self::Bearer(auth_value.to_owned()),
            "basic" => Self::Basic(auth_value.to_owned()),
            custom => Self::Custom { header: custom.to_owned(), value: auth_value.to_owned() },
        }
    }

    /// Returns the `(auth_type, auth_value)` string pair for the transport
    /// encoding.
    pub fn as_parts(&self) -> (&str, &str) {
        match self {
            Self::None => ("none", ""),
            Self::Bearer(secret) => ("bearer", secret),
            Self::Basic(credentials) => ("basic", credentials),
            Self::Custom { header, value } => (header, value),
        }
    }
}

// Credential material must never reach logs, so Debug redacts it.
impl fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bearer(_) => f.write_str("Bearer(***)"),
            Self::Basic(_) => f.write_str("Basic(***)"),
            Self::Custom { header, .. } => write!(f, "Custom {{ header: {header:?}, value: *** }}"),
        }
    }
}

/// One delivery target.
///
/// Immutable once constructed; fully determined by its URL and auth scheme.
/// The URL is guaranteed non-empty by [`Destination::decode`], the only
/// boundary where declarations enter the system; its format is not otherwise
/// validated here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "DestinationWire", into = "DestinationWire")]
pub struct Destination {
    /// HTTP endpoint to deliver to.
    pub url: String,
    /// Authorization the outbound call carries.
    pub auth: AuthScheme,
}

impl Destination {
    /// Decodes a destination declaration from a header value.
    ///
    /// The value is standard base64 over `url|auth_type|auth_value`. The
    /// split is bounded to three parts, so an `auth_value` containing `|`
    /// is preserved verbatim.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::BadEncoding`] when the value is not valid
    /// base64 text, and [`DecodeError::MalformedShape`] when the decoded
    /// text does not carry exactly three fields or the url is empty.
    pub fn decode(raw: &str) -> Result<Self, DecodeError> {
        let bytes = BASE64.decode(raw).map_err(|_| DecodeError::BadEncoding)?;
        let text = String::from_utf8(bytes).map_err(|_| DecodeError::BadEncoding)?;

        let mut parts = text.splitn(PART_COUNT, DELIMITER);
        let (Some(url), Some(auth_type), Some(auth_value)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(DecodeError::MalformedShape);
        };
        if url.is_empty() {
            return Err(DecodeError::MalformedShape);
        }

        Ok(Self { url: url.to_owned(), auth: AuthScheme::from_parts(auth_type, auth_value) })
    }

    /// Encodes this destination into its header-value transport form.
    pub fn encode(&self) -> String {
        let (auth_type, auth_value) = self.auth.as_parts();
        BASE64.encode(format!("{}{DELIMITER}{auth_type}{DELIMITER}{auth_value}", self.url))
    }
}

/// Wire layout of a destination inside envelope JSON.
#[derive(Serialize, Deserialize)]
struct DestinationWire {
    url: String,
    auth_type: String,
    auth_value: String,
}

impl From<DestinationWire> for Destination {
    fn from(wire: DestinationWire) -> Self {
        Self { url: wire.url, auth: AuthScheme::from_parts(&wire.auth_type, &wire.auth_value) }
    }
}

impl From<Destination> for DestinationWire {
    fn from(destination: Destination) -> Self {
        let (auth_type, auth_value) = destination.auth.as_parts();
        Self {
            auth_type: auth_type.to_owned(),
            auth_value: auth_value.to_owned(),
            url: destination.url,
        }
    }
}
