use std::sync::Arc;

use http::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;
use tokio::sync::Mutex;

use crate::auth::providers::TokenProvider;
use crate::auth::AuthPolicy;
use crate::error::{Error, Result};

/// Bearer-token policy delegating to a [`TokenProvider`].
///
/// `authorize` records the token it attached as "last seen";
/// `on_unauthorized` forces a provider refresh and reports whether the token
/// actually changed, which is what gates the transport's single 401 retry.
pub struct BearerAuthPolicy {
    provider: Arc<dyn TokenProvider>,
    last_seen: Mutex<String>,
}

impl BearerAuthPolicy {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            last_seen: Mutex::new(String::new()),
        }
    }
}

#[async_trait::async_trait]
impl AuthPolicy for BearerAuthPolicy {
    async fn authorize(&self, req: &mut Request) -> Result<()> {
        let token = self.provider.get_token().await?;
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| Error::Builder(e.into()))?;
        value.set_sensitive(true);
        *self.last_seen.lock().await = token;
        req.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn on_unauthorized(&self) -> Result<bool> {
        let fresh = self.provider.refresh().await?;
        let mut last_seen = self.last_seen.lock().await;
        let changed = fresh != *last_seen;
        *last_seen = fresh;
        Ok(changed)
    }
}
