//! Error types for delivery operations.
//!
//! Every failure is categorized by whether the queue should eventually
//! re-offer the message. Failures of the outbound call itself are uniformly
//! retryable, including 4xx responses; only payloads that can never succeed
//! and local misconfiguration are terminal.

use std::time::Duration;

use thiserror::Error;

/// Result type alias for delivery operations.
pub type Result<T> = std::result::Result<T, DeliveryError>;

/// Errors raised while delivering envelopes.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    /// Transport-level connectivity failure.
    #[error("network connection failed: {message}")]
    Network {
        /// Description of the transport failure.
        message: String,
    },

    /// Outbound request exceeded its timeout.
    #[error("request timeout after {timeout_seconds}s")]
    Timeout {
        /// Configured timeout in seconds.
        timeout_seconds: u64,
    },

    /// Destination answered outside the success range [200,400).
    #[error("destination answered HTTP {status}")]
    Status {
        /// Returned HTTP status code.
        status: u16,
    },

    /// Envelope payload could not be deserialized.
    #[error("corrupt envelope: {message}")]
    CorruptEnvelope {
        /// Underlying deserialization error.
        message: String,
    },

    /// The durable queue failed.
    #[error("queue error: {message}")]
    Queue {
        /// Underlying queue error.
        message: String,
    },

    /// Local configuration problem, e.g. an unbuildable HTTP client.
    #[error("invalid delivery configuration: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A worker task panicked.
    #[error("worker {worker_id} panicked: {message}")]
    WorkerPanic {
        /// Identifier of the panicked worker.
        worker_id: usize,
        /// Join error description.
        message: String,
    },

    /// Graceful shutdown did not finish in time.
    #[error("worker shutdown timed out after {timeout:?}")]
    ShutdownTimeout {
        /// Shutdown timeout that was exceeded.
        timeout: Duration,
    },
}

impl DeliveryError {
    /// Creates a network error from a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a timeout error.
    pub fn timeout(timeout_seconds: u64) -> Self {
        Self::Timeout { timeout_seconds }
    }

    /// Creates a non-success status error.
    pub fn status(status: u16) -> Self {
        Self::Status { status }
    }

    /// Creates a corrupt-envelope error.
    pub fn corrupt_envelope(message: impl Into<String>) -> Self {
        Self::CorruptEnvelope { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether the queue should eventually re-offer the message.
    ///
    /// Outbound failures retry uniformly: a destination that answers 404
    /// today may be deployed tomorrow, and the relay deliberately does not
    /// distinguish "temporarily down" from "permanently rejecting".
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::Status { .. }
            | Self::Queue { .. } => true,

            Self::CorruptEnvelope { .. }
            | Self::Configuration { .. }
            | Self::WorkerPanic { .. }
            | Self::ShutdownTimeout { .. } => false,
        }
    }
}

impl From<hookrelay_core::QueueError> for DeliveryError {
    fn from(err: hookrelay_core::QueueError) -> Self {
        Self::Queue { message: err.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_failures_retry_uniformly() {
        assert!(DeliveryError::network("connection refused").is_retryable());
        assert!(DeliveryError::timeout(10).is_retryable());
        assert!(DeliveryError::status(500).is_retryable());
        // 4xx is retried like any other non-success status.
        assert!(DeliveryError::status(404).is_retryable());
        assert!(DeliveryError::status(429).is_retryable());
    }

    #[test]
    fn terminal_failures_do_not_retry() {
        assert!(!DeliveryError::corrupt_envelope("truncated").is_retryable());
        assert!(!DeliveryError::configuration("bad client").is_retryable());
    }

    #[test]
    fn error_display_format() {
        assert_eq!(DeliveryError::timeout(10).to_string(), "request timeout after 10s");
        assert_eq!(DeliveryError::status(503).to_string(), "destination answered HTTP 503");
    }
}
