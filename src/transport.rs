//! The send/retry/reauth loop at the heart of the crate.
//!
//! Every API-specific client goes through [`Transport::request`], which owns
//! the connection pool and interleaves three retry causes under one attempt
//! budget: network/protocol failures, retryable statuses (honouring
//! `Retry-After` with a ±10% wiggle) and a single 401-triggered credential
//! refresh. The request is rebuilt from the caller-supplied parameters on
//! every attempt — a body consumed by a failed send is never resent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use http::header::{HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use http::Method;
use reqwest::{Client, Request, Response, StatusCode, Url};
use tokio::time::sleep;

use crate::auth::AuthPolicy;
use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::hooks::{RequestHook, ResponseHook};
use crate::retry::{full_jitter, parse_retry_after, retry_after_wiggle, retry_eligible};

const X_CLIENT_VERSION: HeaderName = HeaderName::from_static("x-client-version");

/// Per-call parameters for [`Transport::request`].
///
/// These are the inputs every attempt is rebuilt from, so they stay untouched
/// across retries.
#[derive(Default)]
pub struct RequestOptions {
    auth: Option<Arc<dyn AuthPolicy>>,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    json: Option<serde_json::Value>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authentication policy for this call.
    pub fn auth<A: AuthPolicy>(self, policy: A) -> Self {
        self.auth_arc(Arc::new(policy))
    }

    /// [`auth`](Self::auth) for a policy shared across calls.
    pub fn auth_arc(mut self, policy: Arc<dyn AuthPolicy>) -> Self {
        self.auth = Some(policy);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Merge a set of headers into the ones already set.
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Append a query-string pair.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// JSON request body.
    pub fn json<T: serde::Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.json = Some(serde_json::to_value(body).map_err(|e| Error::Builder(e.into()))?);
        Ok(self)
    }

    /// Override the configured total timeout for this call only. Applies per
    /// attempt, like the configured timeouts.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A `TransportBuilder` is used to attach observer hooks before building a
/// [`Transport`].
pub struct TransportBuilder {
    config: TransportConfig,
    on_request: Vec<Arc<dyn RequestHook>>,
    on_response: Vec<Arc<dyn ResponseHook>>,
}

impl TransportBuilder {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            on_request: Vec::new(),
            on_response: Vec::new(),
        }
    }

    /// Convenience method to attach a request hook.
    ///
    /// If you need to keep a reference to the hook after attaching, use
    /// [`with_request_hook_arc`](Self::with_request_hook_arc).
    pub fn with_request_hook<H: RequestHook>(self, hook: H) -> Self {
        self.with_request_hook_arc(Arc::new(hook))
    }

    pub fn with_request_hook_arc(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.on_request.push(hook);
        self
    }

    /// Convenience method to attach a response hook.
    pub fn with_response_hook<H: ResponseHook>(self, hook: H) -> Self {
        self.with_response_hook_arc(Arc::new(hook))
    }

    pub fn with_response_hook_arc(mut self, hook: Arc<dyn ResponseHook>) -> Self {
        self.on_response.push(hook);
        self
    }

    /// Returns a `Transport` using this builder configuration.
    pub fn build(self) -> Result<Transport> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            X_CLIENT_VERSION,
            HeaderValue::from_str(&self.config.user_agent).map_err(|e| Error::Builder(e.into()))?,
        );
        let client = Client::builder()
            .user_agent(self.config.user_agent.clone())
            .default_headers(default_headers)
            .connect_timeout(self.config.connect_timeout)
            .read_timeout(self.config.read_timeout)
            .timeout(self.config.total_timeout)
            .build()?;
        Ok(Transport {
            client,
            config: self.config,
            on_request: self.on_request.into_boxed_slice(),
            on_response: self.on_response.into_boxed_slice(),
        })
    }
}

/// Shared HTTP transport: owns the connection pool and is safe for many
/// concurrent in-flight requests. Within one logical request, attempts are
/// strictly sequential.
pub struct Transport {
    client: Client,
    config: TransportConfig,
    on_request: Box<[Arc<dyn RequestHook>]>,
    on_response: Box<[Arc<dyn ResponseHook>]>,
}

impl Transport {
    /// See [`TransportBuilder`] to also attach hooks.
    pub fn new(config: TransportConfig) -> Result<Self> {
        TransportBuilder::new(config).build()
    }

    /// Release this handle's pooled connections. The pool itself is dropped
    /// once every clone of the underlying client is gone; consuming `self`
    /// makes a double close unrepresentable.
    pub fn close(self) {}

    /// Send a request, retrying per the configured [`RetryPolicy`] and
    /// refreshing credentials once on a 401.
    ///
    /// Returns the terminal response, success or not — run the result through
    /// [`classify_response`](crate::classify_response) before trusting the
    /// body. `Err` means the request never produced a terminal response
    /// (network failure with retries exhausted, or an unbuildable request).
    ///
    /// [`RetryPolicy`]: crate::RetryPolicy
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions,
    ) -> Result<Response> {
        let url = self
            .config
            .base_url
            .join(path)
            .map_err(|e| Error::Builder(anyhow!("invalid request path {path:?}: {e}")))?;
        let policy = &self.config.retry;
        let mut attempt: u32 = 1;
        let mut did_refresh_auth = false;
        let mut req = self.prepare(&method, &url, &options).await?;

        loop {
            let outbound = req
                .try_clone()
                .ok_or_else(|| Error::Builder(anyhow!("request body is not replayable")))?;
            let resp = match self.client.execute(outbound).await {
                Ok(resp) => resp,
                Err(err) => {
                    if attempt > policy.max_attempts || !retry_eligible(&method, req.headers()) {
                        return Err(Error::Transport(err));
                    }
                    let delay = full_jitter(policy.base_backoff, attempt, policy.max_cap);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "network error, sleeping before retry"
                    );
                    sleep(delay).await;
                    attempt += 1;
                    req = self.prepare(&method, &url, &options).await?;
                    continue;
                }
            };

            // Response hooks see every attempt, retried or not.
            for hook in self.on_response.iter() {
                if let Err(err) = hook.on_response(&req, &resp).await {
                    tracing::debug!(error = %err, "response hook failed, continuing");
                }
            }

            // Give auth one chance to refresh per logical request. A failed
            // refresh leaves the 401 to be surfaced as terminal below.
            if resp.status() == StatusCode::UNAUTHORIZED && !did_refresh_auth {
                if let Some(auth) = &options.auth {
                    let refreshed = match auth.on_unauthorized().await {
                        Ok(refreshed) => refreshed,
                        Err(err) => {
                            tracing::debug!(error = %err, "credential refresh failed");
                            false
                        }
                    };
                    if refreshed {
                        did_refresh_auth = true;
                        attempt += 1;
                        // No sleep: auth retries are not rate-limited.
                        req = self.prepare(&method, &url, &options).await?;
                        continue;
                    }
                }
            }

            if policy.retry_on_status.contains(&resp.status().as_u16())
                && attempt <= policy.max_attempts
                && retry_eligible(&method, req.headers())
            {
                let hint = resp
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(parse_retry_after);
                let delay = match hint {
                    Some(hint) => retry_after_wiggle(hint),
                    None => full_jitter(policy.base_backoff, attempt, policy.max_cap),
                };
                tracing::warn!(
                    attempt,
                    status = resp.status().as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "retryable status, sleeping before retry"
                );
                sleep(delay).await;
                attempt += 1;
                req = self.prepare(&method, &url, &options).await?;
                continue;
            }

            return Ok(resp);
        }
    }

    /// Build a fresh request from the caller-supplied parameters, authorize
    /// it and run the request hooks. Called once per attempt.
    async fn prepare(&self, method: &Method, url: &Url, options: &RequestOptions) -> Result<Request> {
        let mut builder = self
            .client
            .request(method.clone(), url.clone())
            .headers(options.headers.clone());
        if !options.query.is_empty() {
            builder = builder.query(&options.query);
        }
        if let Some(body) = &options.json {
            builder = builder.json(body);
        }
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let mut req = builder.build()?;
        if let Some(auth) = &options.auth {
            auth.authorize(&mut req).await?;
        }
        for hook in self.on_request.iter() {
            if let Err(err) = hook.on_request(&req).await {
                tracing::debug!(error = %err, "request hook failed, continuing");
            }
        }
        Ok(req)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // hook stacks are not Debug
        f.debug_struct("Transport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
