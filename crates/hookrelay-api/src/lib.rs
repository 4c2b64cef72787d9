//! HTTP ingestion API for the hookrelay webhook relay.
//!
//! Accepts inbound webhooks on `POST /webhook`, fans each request out into
//! one queue envelope per destination declared in its headers, and answers
//! the caller as soon as every declaration has been attempted. Delivery
//! outcomes are invisible to the caller by design; acceptance is
//! fire-and-forget.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;

pub use config::Config;
pub use error::ApiError;
pub use server::{create_router, start_server, AppState};
