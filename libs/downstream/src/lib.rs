use std::{error::Error as _, fmt, time::Duration};

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Connect,
    Status,
    Decode,
    Transport,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Status => "status",
            Self::Decode => "decode",
            Self::Transport => "transport",
        };
        f.write_str(s)
    }
}

impl From<&reqwest::Error> for FailureKind {
    /// Classify a reqwest error. A body that could not be read or parsed
    /// counts as `Decode`.
    fn from(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else if err.is_status() {
            Self::Status
        } else if err.is_body() || err.is_decode() {
            Self::Decode
        } else {
            Self::Transport
        }
    }
}

/// A downstream call that did not produce a usable JSON body.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{cause}")]
pub struct UpstreamFailure {
    pub kind: FailureKind,
    pub cause: String,
    pub original_status: Option<u16>,
}

impl UpstreamFailure {
    fn from_reqwest(err: &reqwest::Error, url: &str, timeout: Duration) -> Self {
        let kind = FailureKind::from(err);

        let cause = match kind {
            FailureKind::Timeout => format!(
                "request to {} timed out after {}ms",
                url,
                timeout.as_millis()
            ),
            _ => describe(err),
        };

        Self {
            kind,
            cause,
            original_status: err.status().map(|s| s.as_u16()),
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == FailureKind::Timeout
    }
}

/// Flatten an error and its sources into one line.
fn describe(err: &reqwest::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !out.contains(&text) {
            out.push_str(": ");
            out.push_str(&text);
        }
        source = inner.source();
    }
    out
}

/// Client for a single downstream service with a fixed per-call timeout.
///
/// Does not retry; a failed call is reported to the caller immediately.
#[derive(Debug, Clone)]
pub struct DownstreamClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DownstreamClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self::with_client(Client::new(), base_url, timeout)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// GET `base_url + path` and return the body as opaque JSON.
    pub async fn get_json(&self, path: &str) -> Result<Value, UpstreamFailure> {
        let url = self.url_for(path);
        tracing::debug!(%url, timeout_ms = self.timeout.as_millis() as u64, "Calling downstream");

        let fail = |err: reqwest::Error| {
            let failure = UpstreamFailure::from_reqwest(&err, &url, self.timeout);
            tracing::warn!(
                %url,
                kind = %failure.kind,
                status = ?failure.original_status,
                "Downstream call failed: {}",
                failure.cause
            );
            failure
        };

        // The timeout covers connect, headers and body.
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(fail)?
            .error_for_status()
            .map_err(fail)?;

        response.json::<Value>().await.map_err(fail)
    }
}

/// One bounded GET against `base_url + path` on a fresh client.
pub async fn call_downstream(
    base_url: &str,
    path: &str,
    timeout: Duration,
) -> Result<Value, UpstreamFailure> {
    DownstreamClient::new(base_url, timeout).get_json(path).await
}
