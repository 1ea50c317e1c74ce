use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use http::header::{HeaderValue, AUTHORIZATION};
use reqwest::Request;

use crate::auth::AuthPolicy;
use crate::error::{Error, Result};

/// Static Basic-auth credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl BasicCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }
}

/// Attaches a precomputed `Basic` authorization header. Basic credentials are
/// static, so `on_unauthorized` never reports a refresh.
pub struct BasicAuthPolicy {
    header: String,
}

impl BasicAuthPolicy {
    pub fn new(creds: &BasicCredentials) -> Self {
        let encoded = STANDARD.encode(format!("{}:{}", creds.client_id, creds.client_secret));
        Self {
            header: format!("Basic {encoded}"),
        }
    }
}

#[async_trait::async_trait]
impl AuthPolicy for BasicAuthPolicy {
    async fn authorize(&self, req: &mut Request) -> Result<()> {
        let mut value =
            HeaderValue::from_str(&self.header).map_err(|e| Error::Builder(e.into()))?;
        value.set_sensitive(true);
        req.headers_mut().insert(AUTHORIZATION, value);
        Ok(())
    }

    async fn on_unauthorized(&self) -> Result<bool> {
        Ok(false)
    }
}
