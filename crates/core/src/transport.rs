//! HTTP transport used to reach Bilibili, either directly or through a relay.
//! Failures carry a structural kind so callers never inspect message text.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

/// Failure reported by a transport or generator collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The host could not be reached at all (connect failure or timeout).
    #[error("network unreachable, the relay might be blocked or the URL is unreachable: {0}")]
    Unreachable(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Any other request or body failure.
    #[error("request failed: {0}")]
    Other(String),
}

impl TransportError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            Self::Unreachable(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Self::Other(err.to_string())
        }
    }
}

/// Fetches a URL and hands back its body as text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_text(&self, url: &str) -> Result<String, TransportError>;
}

/// `reqwest` backed transport with a configurable timeout.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, TransportError> {
        trace!("get_text url={}", url);
        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let text = resp.text().await?;
        debug!("received {} bytes from {}", text.len(), url);
        Ok(text)
    }
}

/// Wrap `target` so it is fetched through `relay`, or return it unchanged
/// when no relay is configured.
pub fn relayed(relay: Option<&str>, target: &str) -> String {
    match relay {
        Some(relay) => format!("{}?url={}", relay, urlencoding::encode(target)),
        None => target.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[test]
    fn relays_encode_the_target() {
        assert_eq!(
            relayed(Some("https://relay/raw"), "https://a/b?x=1&y=2"),
            "https://relay/raw?url=https%3A%2F%2Fa%2Fb%3Fx%3D1%26y%3D2"
        );
        assert_eq!(relayed(None, "https://a/b"), "https://a/b");
    }

    #[tokio::test]
    async fn non_success_status_is_structural() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing");
                then.status(503).body("busy");
            })
            .await;
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport.get_text(&server.url("/missing")).await.unwrap_err();
        match err {
            TransportError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let transport = HttpTransport::new(Duration::from_secs(5)).unwrap();
        let err = transport.get_text("http://127.0.0.1:1/").await.unwrap_err();
        assert!(err.is_unreachable(), "got {err:?}");
    }
}
