//! Authentication policies attached to transport requests.

mod basic;
mod bearer;
pub mod providers;

pub use basic::{BasicAuthPolicy, BasicCredentials};
pub use bearer::BearerAuthPolicy;

use reqwest::Request;

use crate::error::Result;

/// Capability contract for attaching credentials to outgoing requests.
///
/// `authorize` is called on every attempt of a logical request and must only
/// mutate the outgoing authorization header, so repeated calls are safe.
///
/// `on_unauthorized` is the one-shot recovery path after a 401: it returns
/// `Ok(true)` only if credentials actually changed since the last
/// `authorize`. `Ok(false)` (or an error) tells the transport the 401 is not
/// recoverable by refreshing, and the response is surfaced as-is.
#[async_trait::async_trait]
pub trait AuthPolicy: 'static + Send + Sync {
    async fn authorize(&self, req: &mut Request) -> Result<()>;

    async fn on_unauthorized(&self) -> Result<bool>;
}
