//! HTTP transport seam.
//!
//! [`Transport`] moves one serialized request to the server and returns the
//! raw response body. [`HttpTransport`] is the `reqwest` implementation; each
//! instance owns its own cookie jar, so the session cookie set by `login`
//! stays scoped to the session that created the transport.

use std::time::Duration;

use async_trait::async_trait;
use nso_core::{NsoError, Result};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};

/// Moves serialized JSON-RPC requests to the server.
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` and return the response body.
    ///
    /// A request that does not complete within `timeout` fails with
    /// [`NsoError::Timeout`]. Connection failures and non-success HTTP
    /// statuses fail with [`NsoError::Transport`].
    async fn post(&self, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>>;
}

/// Transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    /// Create a transport posting to `url`.
    ///
    /// With `tls_verify` false, invalid server certificates are accepted.
    pub fn new(url: impl Into<String>, tls_verify: bool) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .cookie_store(true)
            .danger_accept_invalid_certs(!tls_verify)
            .user_agent(concat!("nso-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| NsoError::transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// URL requests are posted to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.url)
            .timeout(timeout)
            .body(body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(NsoError::Transport {
                message: format!("HTTP {status}: {text}"),
                status: Some(status.as_u16()),
            });
        }

        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(bytes.to_vec())
    }
}

fn map_reqwest_error(e: reqwest::Error) -> NsoError {
    if e.is_timeout() {
        NsoError::Timeout {
            message: e.to_string(),
        }
    } else {
        NsoError::Transport {
            message: e.to_string(),
            status: e.status().map(|s| s.as_u16()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn url(server: &MockServer) -> String {
        format!("{}/jsonrpc", server.uri())
    }

    #[tokio::test]
    async fn posts_json_with_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jsonrpc"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"ok":true}"#))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(url(&server), true).unwrap();
        let body = transport
            .post(b"{}".to_vec(), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(body, br#"{"ok":true}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let transport = HttpTransport::new(url(&server), true).unwrap();
        let err = transport
            .post(b"{}".to_vec(), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_matches!(err, NsoError::Transport { status: Some(503), .. });
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{}")
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(url(&server), true).unwrap();
        let err = transport
            .post(b"{}".to_vec(), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_matches!(err, NsoError::Timeout { .. });
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let transport = HttpTransport::new("http://127.0.0.1:1/jsonrpc", true).unwrap();
        let err = transport
            .post(b"{}".to_vec(), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert_matches!(err, NsoError::Transport { status: None, .. });
    }

    #[tokio::test]
    async fn session_cookie_is_replayed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("cookie", "sessionid=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("second"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("set-cookie", "sessionid=abc; Path=/")
                    .set_body_string("first"),
            )
            .mount(&server)
            .await;

        let transport = HttpTransport::new(url(&server), true).unwrap();
        let first = transport.post(b"{}".to_vec(), Duration::from_secs(5)).await.unwrap();
        let second = transport.post(b"{}".to_vec(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(first, b"first");
        assert_eq!(second, b"second");

        // A second transport has its own, empty jar.
        let other = HttpTransport::new(url(&server), true).unwrap();
        let fresh = other.post(b"{}".to_vec(), Duration::from_secs(5)).await.unwrap();
        assert_eq!(fresh, b"first");
    }
}
