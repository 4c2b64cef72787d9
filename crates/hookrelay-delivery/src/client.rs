//! HTTP client for outbound webhook delivery.
//!
//! Handles request construction and transport error categorization. The
//! client reports what happened; deciding whether to acknowledge is the
//! worker's job.

use std::time::{Duration, Instant};

use bytes::Bytes;
use hookrelay_core::Destination;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    auth::auth_headers,
    error::{DeliveryError, Result},
};

/// Configuration for the delivery client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Timeout applied to every outbound request.
    pub timeout: Duration,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(crate::DEFAULT_TIMEOUT_SECONDS),
            user_agent: concat!("hookrelay/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

/// What an outbound delivery attempt produced.
///
/// Only attempts that reached the destination produce an outcome; transport
/// failures surface as errors instead.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryOutcome {
    /// HTTP status the destination answered with.
    pub status: u16,
    /// Total request duration.
    pub duration: Duration,
}

impl DeliveryOutcome {
    /// Whether the destination accepted the delivery ([200,400)).
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// HTTP client optimized for webhook delivery.
///
/// Uses connection pooling and a bounded per-request timeout so a stuck
/// destination can only hold a worker for the configured window.
#[derive(Debug, Clone)]
pub struct DeliveryClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl DeliveryClient {
    /// Creates a delivery client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the underlying HTTP client
    /// cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config })
    }

    /// Creates a delivery client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the underlying HTTP client
    /// cannot be built.
    pub fn with_defaults() -> Result<Self> {
        Self::new(ClientConfig::default())
    }

    /// POSTs a payload to a destination with its auth headers.
    ///
    /// The body is sent verbatim with `Content-Type: application/json`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` or `Network` for transport-level failures. A
    /// response from the destination, whatever its status, is an `Ok`
    /// outcome.
    pub async fn deliver(&self, destination: &Destination, body: Bytes) -> Result<DeliveryOutcome> {
        let start = Instant::now();

        let mut request = self
            .client
            .post(&destination.url)
            .header("content-type", "application/json")
            .body(body);

        for (name, value) in auth_headers(&destination.auth) {
            request = request.header(name, value);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                DeliveryError::timeout(self.config.timeout.as_secs())
            } else if e.is_connect() {
                DeliveryError::network(format!("connection failed: {e}"))
            } else {
                DeliveryError::network(e.to_string())
            }
        })?;

        let outcome =
            DeliveryOutcome { status: response.status().as_u16(), duration: start.elapsed() };

        debug!(
            url = %destination.url,
            status = outcome.status,
            duration_ms = outcome.duration.as_millis(),
            "destination responded"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use hookrelay_core::AuthScheme;
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn destination(url: String, auth: AuthScheme) -> Destination {
        Destination { url, auth }
    }

    #[tokio::test]
    async fn successful_delivery_reports_success() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock_server)
            .await;

        let client = DeliveryClient::with_defaults().unwrap();
        let destination = destination(format!("{}/hook", mock_server.uri()), AuthScheme::None);

        let outcome =
            client.deliver(&destination, Bytes::from_static(b"{}")).await.expect("delivery");

        assert_eq!(outcome.status, 200);
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn redirect_statuses_count_as_success() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let client = DeliveryClient::with_defaults().unwrap();
        let destination = destination(mock_server.uri(), AuthScheme::None);

        let outcome =
            client.deliver(&destination, Bytes::from_static(b"{}")).await.expect("delivery");
        assert!(outcome.is_success());

        assert!(DeliveryOutcome { status: 302, duration: Duration::ZERO }.is_success());
        assert!(!DeliveryOutcome { status: 400, duration: Duration::ZERO }.is_success());
    }

    #[tokio::test]
    async fn server_error_is_an_unsuccessful_outcome_not_an_error() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let client = DeliveryClient::with_defaults().unwrap();
        let destination = destination(mock_server.uri(), AuthScheme::None);

        let outcome =
            client.deliver(&destination, Bytes::from_static(b"{}")).await.expect("delivery");

        assert_eq!(outcome.status, 500);
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn connection_refused_maps_to_network_error() {
        let client = DeliveryClient::with_defaults().unwrap();
        // Port 9 is the discard port; nothing listens there.
        let destination = destination("http://127.0.0.1:9/hook".to_owned(), AuthScheme::None);

        let result = client.deliver(&destination, Bytes::from_static(b"{}")).await;

        assert!(matches!(result, Err(DeliveryError::Network { .. })));
    }

    #[tokio::test]
    async fn bearer_auth_header_is_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::header("Authorization", "Bearer tok123"))
            .and(matchers::header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = DeliveryClient::with_defaults().unwrap();
        let destination =
            destination(mock_server.uri(), AuthScheme::Bearer("tok123".to_owned()));

        client.deliver(&destination, Bytes::from_static(b"{}")).await.expect("delivery");
    }

    #[tokio::test]
    async fn custom_auth_headers_are_sent() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::header("X-Api-Key", "secret"))
            .and(matchers::header("X-Webhook-Auth-Type", "X-Api-Key"))
            .and(matchers::header("X-Webhook-Auth-Value", "secret"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = DeliveryClient::with_defaults().unwrap();
        let destination = destination(mock_server.uri(), AuthScheme::Custom {
            header: "X-Api-Key".to_owned(),
            value: "secret".to_owned(),
        });

        client.deliver(&destination, Bytes::from_static(b"{}")).await.expect("delivery");
    }

    #[tokio::test]
    async fn body_bytes_are_forwarded_verbatim() {
        let mock_server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::body_bytes(br#"{"a":1}"#.to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = DeliveryClient::with_defaults().unwrap();
        let destination = destination(mock_server.uri(), AuthScheme::None);

        client
            .deliver(&destination, Bytes::from_static(br#"{"a":1}"#))
            .await
            .expect("delivery");
    }
}
