//! Request/response observers injected into a [`Transport`](crate::Transport)
//! at construction.
//!
//! Hooks are best-effort instrumentation: the transport invokes them on every
//! attempt, including attempts that will be retried, and a hook error is
//! logged and swallowed — telemetry never aborts business traffic.

use reqwest::{Request, Response};

use crate::error::X_REQUEST_ID;

/// Observer invoked with every outgoing request, once per attempt.
#[async_trait::async_trait]
pub trait RequestHook: 'static + Send + Sync {
    async fn on_request(&self, req: &Request) -> anyhow::Result<()>;
}

/// Observer invoked with every received response, including responses the
/// retry loop will discard.
#[async_trait::async_trait]
pub trait ResponseHook: 'static + Send + Sync {
    async fn on_response(&self, req: &Request, resp: &Response) -> anyhow::Result<()>;
}

/// Emits a `tracing` debug event per outgoing attempt. The authorization
/// header is never logged.
pub struct LoggingRequestHook;

#[async_trait::async_trait]
impl RequestHook for LoggingRequestHook {
    async fn on_request(&self, req: &Request) -> anyhow::Result<()> {
        tracing::debug!(method = %req.method(), url = %req.url(), "sending request");
        Ok(())
    }
}

/// Emits a `tracing` info event per received response, carrying the server's
/// request id when present.
pub struct LoggingResponseHook;

#[async_trait::async_trait]
impl ResponseHook for LoggingResponseHook {
    async fn on_response(&self, req: &Request, resp: &Response) -> anyhow::Result<()> {
        let request_id = resp
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok());
        tracing::info!(
            method = %req.method(),
            url = %req.url(),
            status = resp.status().as_u16(),
            request_id,
            "received response"
        );
        Ok(())
    }
}
