//! Webhook ingestion and destination fan-out.
//!
//! Scans the request headers for destination declarations, decodes each one,
//! and publishes one envelope per valid declaration. Declarations are
//! processed sequentially in header-iteration order with no atomicity across
//! the set: a request carrying three destinations may queue one, two, or
//! three envelopes depending on per-declaration outcomes.

use axum::{
    extract::{rejection::BytesRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use hookrelay_core::{Destination, Envelope};
use serde::Serialize;
use tracing::{debug, error, instrument, warn};

use crate::{error::ApiError, server::AppState};

/// Exact reserved header name for multi-valued destination declarations.
pub const DEST_HEADER: &str = "x-dest";

/// Prefix for distinctly named destination headers.
pub const DEST_HEADER_PREFIX: &str = "x-dest-";

/// Response from webhook acceptance.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    /// Always `"accepted"`; per-declaration outcomes are not reported.
    pub status: String,
}

/// Handles `POST /webhook`.
///
/// Answers `202 Accepted` once every declaration has been attempted,
/// regardless of individual outcomes: a destination that was found but
/// failed to decode or publish is logged and skipped, not reported.
/// `400 Bad Request` is returned only when no recognized destination header
/// name is present, before any publish attempt.
#[instrument(name = "ingest_webhook", skip_all)]
pub async fn ingest_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            error!(error = %rejection, "failed to read request body");
            return ApiError::UnreadableBody.into_response();
        },
    };

    let mut found = false;
    for (name, value) in &headers {
        // Header names are lowercased by the HTTP layer.
        let name = name.as_str();
        if name != DEST_HEADER && !name.starts_with(DEST_HEADER_PREFIX) {
            continue;
        }
        found = true;

        let Ok(raw) = value.to_str() else {
            warn!(header = name, "skipping destination header with non-ASCII value");
            continue;
        };

        let destination = match Destination::decode(raw) {
            Ok(destination) => destination,
            Err(decode_error) => {
                warn!(
                    header = name,
                    error = %decode_error,
                    "skipping undecodable destination declaration"
                );
                continue;
            },
        };

        publish_envelope(&state, Envelope::new(destination, body.clone(), name)).await;
    }

    if !found {
        warn!("request carried no destination headers");
        return ApiError::MissingDestinations.into_response();
    }

    (StatusCode::ACCEPTED, Json(IngestResponse { status: "accepted".to_owned() })).into_response()
}

/// Publishes one envelope, downgrading failures to per-declaration logs.
async fn publish_envelope(state: &AppState, envelope: Envelope) {
    let payload = match envelope.to_bytes() {
        Ok(payload) => payload,
        Err(serialize_error) => {
            warn!(
                header = %envelope.origin_header,
                url = %envelope.destination.url,
                error = %serialize_error,
                "failed to serialize envelope"
            );
            return;
        },
    };

    match state.queue.publish(&state.subject, payload).await {
        Ok(()) => {
            debug!(
                header = %envelope.origin_header,
                url = %envelope.destination.url,
                "queued webhook for delivery"
            );
        },
        Err(publish_error) => {
            warn!(
                header = %envelope.origin_header,
                url = %envelope.destination.url,
                error = %publish_error,
                "failed to publish envelope"
            );
        },
    }
}
