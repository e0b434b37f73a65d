//! Redcrawl API client
//!
//! Talks to the Redcrawl compliance-monitoring backend on behalf of an
//! operator.
//!
//! This crate provides:
//! - A pluggable credential store for the access/refresh token pair
//! - An authenticated HTTP client that refreshes an expired access token once
//! - A session that tracks the signed-in user
//! - A consumer for the live observability stream (outbox + runs)
//! - Typed calls for sources, subscriptions, scheduling and documents

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod forms;
pub mod live;
pub mod pagination;
pub mod session;
pub mod sse;
pub mod tokens;
pub mod transport;

pub use api::User;
pub use client::{ApiClient, LoginRedirect};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use live::{ConnectionState, LiveSnapshot, LiveStream, LiveView};
pub use pagination::{Page, Pagination};
pub use session::{RouteDecision, Session, SessionState};
pub use tokens::{MemoryTokenStore, TokenPair, TokenStore};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};

#[cfg(test)]
pub(crate) mod testing;
