use http::header::HeaderName;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

pub(crate) const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

#[derive(Error, Debug)]
pub enum Error {
    /// Network/protocol failure, retries exhausted or request ineligible
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Malformed configuration or unbuildable request; never retried
    #[error("request build error: {0}")]
    Builder(#[from] anyhow::Error),
    /// Terminal non-2xx API response
    #[error(transparent)]
    Api(ApiError),
    /// Specialisation of [`Error::Api`] for HTTP 429, so callers can
    /// special-case backoff-and-resume logic
    #[error(transparent)]
    RateLimit(ApiError),
}

impl Error {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Error::RateLimit(_))
    }

    /// HTTP status associated with this error, if any.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Transport(e) => e.status(),
            Error::Builder(_) => None,
            Error::Api(e) | Error::RateLimit(e) => Some(e.status),
        }
    }

    /// Diagnostic context of the API error, if this is one.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(e) | Error::RateLimit(e) => Some(e),
            _ => None,
        }
    }
}

/// Decoded error envelope of a terminal non-2xx response.
#[derive(Error, Debug)]
#[error("{error_type} ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub error_type: String,
    pub message: String,
    pub code: Option<String>,
    pub request_id: Option<String>,
    /// Server-suggested wait before retrying, in seconds.
    pub retry_after_secs: Option<f64>,
    /// Raw response body, kept for diagnostics.
    pub body: Vec<u8>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: Option<String>,
    message: Option<String>,
    code: Option<String>,
    retry_after: Option<f64>,
}

/// Translate a terminal response into a typed error.
///
/// Statuses below 400 pass through untouched. Otherwise the body is decoded
/// as a `{"error": {...}}` envelope, falling back to the raw response text
/// when it isn't JSON, and surfaced as [`Error::RateLimit`] for 429 or
/// [`Error::Api`] for everything else.
pub async fn classify_response(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.as_u16() < 400 {
        return Ok(resp);
    }
    let request_id = resp
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let body = resp.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
    let text = String::from_utf8_lossy(&body).into_owned();
    let detail = serde_json::from_slice::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|envelope| envelope.error);
    let (error_type, message, code, retry_after_secs) = match detail {
        Some(detail) => (
            detail.error_type.unwrap_or_else(|| "api_error".to_owned()),
            detail.message.unwrap_or_else(|| text.clone()),
            detail.code,
            detail.retry_after,
        ),
        None => ("api_error".to_owned(), text, None, None),
    };
    let api = ApiError {
        status,
        error_type,
        message,
        code,
        request_id,
        retry_after_secs,
        body,
    };
    Err(if status == StatusCode::TOO_MANY_REQUESTS {
        Error::RateLimit(api)
    } else {
        Error::Api(api)
    })
}
