//! This crate provides [`Transport`], an async HTTP client for the GavaConnect
//! API which wraps every outbound call with a uniform retry/backoff policy,
//! pluggable authentication and a structured-error translation layer.
//!
//! You'll want to instantiate [`Transport`] using [`TransportBuilder`], attach
//! any request/response hooks, and from then on issue calls through
//! [`Transport::request`]:
//!
//! ```no_run
//! use gavaconnect::{RequestOptions, Transport, TransportConfig};
//!
//! async fn run() -> gavaconnect::Result<()> {
//!     let config = TransportConfig::new("https://sbx.kra.go.ke".parse().unwrap());
//!     let transport = Transport::new(config)?;
//!     let resp = transport
//!         .request(reqwest::Method::GET, "/v1/ping", RequestOptions::new())
//!         .await?;
//!     println!("status: {}", resp.status());
//!     Ok(())
//! }
//! ```
//!
//! Retries interleave three failure sources under a single attempt budget:
//! network/protocol errors, retryable HTTP statuses (honouring `Retry-After`)
//! and a one-shot credential refresh after a 401. Requests are rebuilt from
//! the caller-supplied parameters on every attempt, so a body consumed by a
//! failed send is never resent.
//!
//! Authentication is supplied per request as an [`AuthPolicy`]: either static
//! Basic credentials ([`BasicAuthPolicy`]) or a bearer token fetched and
//! cached by a [`TokenProvider`] ([`BearerAuthPolicy`]).

pub mod auth;
pub mod config;
pub mod error;
pub mod hooks;
pub mod retry;
pub mod transport;

pub use auth::providers::{
    BasicTokenEndpointProvider, ClientCredentialsProvider, TokenProvider, TokenRequestMethod,
};
pub use auth::{AuthPolicy, BasicAuthPolicy, BasicCredentials, BearerAuthPolicy};
pub use config::{RetryPolicy, TransportConfig};
pub use error::{classify_response, ApiError, Error, Result};
pub use hooks::{LoggingRequestHook, LoggingResponseHook, RequestHook, ResponseHook};
pub use retry::idempotency_headers;
pub use transport::{RequestOptions, Transport, TransportBuilder};
