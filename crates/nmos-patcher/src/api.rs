//! HTTP collaborator for the NMOS node and connection APIs.
//!
//! [`ConnectionApi`] is the seam the negotiator and discovery code talk to;
//! [`HttpClient`] is the `reqwest` implementation used by the binary.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GET failed: {url} -> {status}")]
    Fetch { url: String, status: u16 },
    #[error("PATCH failed: {url} -> {status}: {body}")]
    Patch {
        url: String,
        status: u16,
        body: String,
    },
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("invalid JSON from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Fetch { status, .. } | ApiError::Patch { status, .. } => Some(*status),
            ApiError::Http { source, .. } => source.status().map(|s| s.as_u16()),
            ApiError::Decode { .. } => None,
        }
    }
}

// ── Collaborator trait ──────────────────────────────────────────────

/// Read and write access to NMOS HTTP resources.
///
/// Reads succeed only on `200 OK`; writes succeed on `200 OK` or
/// `202 Accepted`.
pub trait ConnectionApi {
    /// GET a JSON document.
    fn fetch_json(&self, url: &str) -> impl Future<Output = Result<Value, ApiError>> + Send;

    /// GET a text body (SDP manifests).
    fn fetch_text(&self, url: &str) -> impl Future<Output = Result<String, ApiError>> + Send;

    /// PATCH a JSON body and return the decoded response (`Null` when empty).
    fn apply_patch<B>(
        &self,
        url: &str,
        body: &B,
    ) -> impl Future<Output = Result<Value, ApiError>> + Send
    where
        B: Serialize + Sync;
}

// ── reqwest implementation ──────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
}

impl HttpClient {
    /// Build a client. `timeout` applies per request; `None` waits forever.
    ///
    /// NMOS nodes live on the media network, so system proxies are ignored.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder().no_proxy();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    async fn get_ok(&self, url: &str) -> Result<String, ApiError> {
        tracing::debug!(url, "GET");
        let resp = self.client.get(url).send().await.map_err(|e| http_error(url, e))?;
        let status = resp.status();
        if status != StatusCode::OK {
            return Err(ApiError::Fetch {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        resp.text().await.map_err(|e| http_error(url, e))
    }
}

impl ConnectionApi for HttpClient {
    async fn fetch_json(&self, url: &str) -> Result<Value, ApiError> {
        let text = self.get_ok(url).await?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode {
            url: url.to_string(),
            source,
        })
    }

    async fn fetch_text(&self, url: &str) -> Result<String, ApiError> {
        self.get_ok(url).await
    }

    async fn apply_patch<B>(&self, url: &str, body: &B) -> Result<Value, ApiError>
    where
        B: Serialize + Sync,
    {
        let resp = self
            .client
            .patch(url)
            .json(body)
            .send()
            .await
            .map_err(|e| http_error(url, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| http_error(url, e))?;
        let shown = if text.trim().is_empty() { "(no body)" } else { text.as_str() };
        tracing::info!(url, status = status.as_u16(), body = shown, "PATCH response");

        if status != StatusCode::OK && status != StatusCode::ACCEPTED {
            return Err(ApiError::Patch {
                url: url.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        Ok(decode_patch_response(&text))
    }
}

fn http_error(url: &str, source: reqwest::Error) -> ApiError {
    ApiError::Http {
        url: url.to_string(),
        source,
    }
}

/// Decode a PATCH response body; non-JSON text is kept as a string.
fn decode_patch_response(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
