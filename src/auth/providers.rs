//! Token providers backing [`BearerAuthPolicy`](crate::BearerAuthPolicy).
//!
//! Both providers cache the fetched token with its expiry behind a mutex held
//! for the whole check-then-fetch sequence, so concurrent callers trigger at
//! most one token-endpoint call and all observe the same result.

use std::time::{Duration, Instant};

use reqwest::{Client, Response, Url};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::auth::BasicCredentials;
use crate::error::{classify_response, Result};

/// Floor on a computed token lifetime, preventing rapid-refresh loops when a
/// server advertises a TTL shorter than the early-refresh margin.
const MIN_TOKEN_TTL: Duration = Duration::from_secs(30);

const DEFAULT_TTL_SECS: f64 = 3600.0;
const DEFAULT_EARLY_REFRESH: Duration = Duration::from_secs(60);

/// Capability contract for bearer-token sources.
///
/// `get_token` returns a cached token while it is unexpired, fetching
/// otherwise; `refresh` unconditionally fetches and replaces the cache.
/// Implementations never return an expired token.
#[async_trait::async_trait]
pub trait TokenProvider: 'static + Send + Sync {
    async fn get_token(&self) -> Result<String>;

    async fn refresh(&self) -> Result<String>;
}

struct TokenState {
    token: String,
    expires_at: Instant,
}

/// Mutex-guarded lazy token cache. Token and expiry are swapped together, so
/// readers never observe a half-updated state.
struct TokenCache {
    state: Mutex<Option<TokenState>>,
}

impl TokenCache {
    fn new() -> Self {
        Self {
            state: Mutex::new(None),
        }
    }

    async fn get_or_fetch<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(String, Instant)>>,
    {
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            if Instant::now() < cached.expires_at {
                return Ok(cached.token.clone());
            }
        }
        let (token, expires_at) = fetch().await?;
        *state = Some(TokenState {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    async fn replace<F, Fut>(&self, fetch: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<(String, Instant)>>,
    {
        let mut state = self.state.lock().await;
        let (token, expires_at) = fetch().await?;
        *state = Some(TokenState {
            token: token.clone(),
            expires_at,
        });
        Ok(token)
    }

    #[cfg(test)]
    async fn seed(&self, token: &str, expires_at: Instant) {
        *self.state.lock().await = Some(TokenState {
            token: token.to_owned(),
            expires_at,
        });
    }
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<f64>,
}

/// Expiry for a freshly fetched token: `now + max(30s, ttl - early_refresh)`.
/// The early-refresh margin renews the token before the upstream server would
/// start rejecting it.
fn token_expiry(now: Instant, ttl_secs: f64, early_refresh: Duration) -> Instant {
    let effective = (ttl_secs - early_refresh.as_secs_f64()).max(MIN_TOKEN_TTL.as_secs_f64());
    // A TTL too large for a Duration (or the clock) falls back to the
    // default lifetime rather than panicking on endpoint-controlled input.
    let effective = Duration::try_from_secs_f64(effective)
        .unwrap_or_else(|_| Duration::from_secs_f64(DEFAULT_TTL_SECS));
    now.checked_add(effective)
        .unwrap_or_else(|| now + Duration::from_secs_f64(DEFAULT_TTL_SECS))
}

async fn decode_token_response(resp: Response, early_refresh: Duration) -> Result<(String, Instant)> {
    let resp = classify_response(resp).await?;
    let payload: TokenEndpointResponse = resp.json().await?;
    let ttl = payload.expires_in.unwrap_or(DEFAULT_TTL_SECS);
    Ok((payload.access_token, token_expiry(Instant::now(), ttl, early_refresh)))
}

/// OAuth2 client-credentials provider: form-encoded POST of
/// `grant_type=client_credentials` (plus `scope` when configured) to the
/// token endpoint, authenticated with HTTP Basic client id/secret.
pub struct ClientCredentialsProvider {
    client: Client,
    token_url: Url,
    credentials: BasicCredentials,
    scope: Option<String>,
    early_refresh: Duration,
    cache: TokenCache,
}

impl ClientCredentialsProvider {
    pub fn new(client: Client, token_url: Url, credentials: BasicCredentials) -> Self {
        Self {
            client,
            token_url,
            credentials,
            scope: None,
            early_refresh: DEFAULT_EARLY_REFRESH,
            cache: TokenCache::new(),
        }
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn with_early_refresh(mut self, early_refresh: Duration) -> Self {
        self.early_refresh = early_refresh;
        self
    }

    async fn fetch(&self) -> Result<(String, Instant)> {
        let mut form: Vec<(&str, &str)> = vec![("grant_type", "client_credentials")];
        if let Some(scope) = self.scope.as_deref() {
            form.push(("scope", scope));
        }
        let resp = self
            .client
            .post(self.token_url.clone())
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&form)
            .send()
            .await?;
        decode_token_response(resp, self.early_refresh).await
    }
}

#[async_trait::async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn get_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    async fn refresh(&self) -> Result<String> {
        self.cache.replace(|| self.fetch()).await
    }
}

/// Verb used by [`BasicTokenEndpointProvider`] against the token endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRequestMethod {
    Get,
    Post,
}

/// Provider for token endpoints that mint a bearer token from a plain
/// Basic-authenticated GET or POST, with no OAuth2 grant body.
pub struct BasicTokenEndpointProvider {
    client: Client,
    token_url: Url,
    credentials: BasicCredentials,
    method: TokenRequestMethod,
    early_refresh: Duration,
    cache: TokenCache,
}

impl BasicTokenEndpointProvider {
    pub fn new(
        client: Client,
        token_url: Url,
        credentials: BasicCredentials,
        method: TokenRequestMethod,
    ) -> Self {
        Self {
            client,
            token_url,
            credentials,
            method,
            early_refresh: DEFAULT_EARLY_REFRESH,
            cache: TokenCache::new(),
        }
    }

    pub fn with_early_refresh(mut self, early_refresh: Duration) -> Self {
        self.early_refresh = early_refresh;
        self
    }

    async fn fetch(&self) -> Result<(String, Instant)> {
        let builder = match self.method {
            TokenRequestMethod::Get => self.client.get(self.token_url.clone()),
            TokenRequestMethod::Post => self.client.post(self.token_url.clone()),
        };
        let resp = builder
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .send()
            .await?;
        decode_token_response(resp, self.early_refresh).await
    }
}

#[async_trait::async_trait]
impl TokenProvider for BasicTokenEndpointProvider {
    async fn get_token(&self) -> Result<String> {
        self.cache.get_or_fetch(|| self.fetch()).await
    }

    async fn refresh(&self) -> Result<String> {
        self.cache.replace(|| self.fetch()).await
    }
}
