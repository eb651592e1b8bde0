//! SpaceAPI HTTP transport adapter.
//!
//! Implements the [`spaceapi::Transport`] trait with [`reqwest`]. Two clients
//! are built up front, one verifying TLS certificates and one accepting any
//! certificate, so the per-request `verify_tls` choice costs nothing at call
//! time. Connection pools are shared across requests on each client.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Connection handling, TLS, redirects and error
//! classification live here. The [`spaceapi`] crate sees only
//! [`spaceapi::HttpResponse`] and [`spaceapi::TransportError`].

use std::time::Duration;

use async_trait::async_trait;
use spaceapi::{HttpResponse, Transport, TransportError, TransportOptions};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors building the transport.
#[derive(Debug, Error)]
pub enum HttpTransportError {
    /// The underlying client could not be constructed (e.g. TLS backend failure).
    #[error("Failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// User agent string.
    pub user_agent: String,
    /// Connection establishment timeout, independent of the per-request timeout.
    pub connect_timeout: Option<Duration>,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("spaceapi-client/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Some(Duration::from_secs(10)),
            max_redirects: 10,
        }
    }
}

/// [`Transport`] implementation over [`reqwest`].
#[derive(Clone)]
pub struct ReqwestTransport {
    verifying: reqwest::Client,
    insecure: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: &HttpTransportConfig) -> Result<Self, HttpTransportError> {
        Ok(Self {
            verifying: build_client(config, true)?,
            insecure: build_client(config, false)?,
        })
    }

    /// Create a transport with default configuration.
    pub fn with_defaults() -> Result<Self, HttpTransportError> {
        Self::new(&HttpTransportConfig::default())
    }
}

fn build_client(config: &HttpTransportConfig, verify_tls: bool) -> Result<reqwest::Client, reqwest::Error> {
    let mut builder = reqwest::Client::builder()
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(!verify_tls);

    if let Some(timeout) = config.connect_timeout {
        builder = builder.connect_timeout(timeout);
    }

    builder.build()
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[instrument(skip(self, options), fields(verify_tls = options.verify_tls))]
    async fn get(&self, url: &str, options: &TransportOptions) -> Result<HttpResponse, TransportError> {
        let client = if options.verify_tls {
            &self.verifying
        } else {
            &self.insecure
        };

        let mut request = client.get(url);
        if let Some(timeout) = options.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();
        let body = response.bytes().await.map_err(classify)?;

        debug!(status, bytes = body.len(), "GET complete");
        Ok(HttpResponse::new(status, headers, body))
    }
}

/// Maps a reqwest failure onto the transport error kinds the resolver understands.
fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn options(timeout: Option<Duration>) -> TransportOptions {
        TransportOptions {
            verify_tls: true,
            timeout,
        }
    }

    #[tokio::test]
    async fn parses_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spaceapi.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"space":"Foo"}"#, "application/json"),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::with_defaults().unwrap();
        let response = transport
            .get(&format!("{}/spaceapi.json", server.uri()), &options(None))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type(), Some("application/json"));
        assert_eq!(response.document().unwrap().get_str("space").unwrap(), "Foo");
    }

    #[tokio::test]
    async fn html_body_has_no_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html><head></head></html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let transport = ReqwestTransport::with_defaults().unwrap();
        let response = transport.get(&server.uri(), &options(None)).await.unwrap();

        assert!(response.is_html());
        assert!(response.json.is_none());
        assert!(response.text().contains("<head>"));
    }

    #[tokio::test]
    async fn error_status_is_still_a_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::with_defaults().unwrap();
        let response = transport.get(&server.uri(), &options(None)).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(response.document().is_none());
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = ReqwestTransport::with_defaults().unwrap();
        let err = transport
            .get(&server.uri(), &options(Some(Duration::from_millis(100))))
            .await
            .unwrap_err();

        assert_eq!(err, TransportError::Timeout);
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let transport = ReqwestTransport::with_defaults().unwrap();
        let err = transport
            .get(&format!("http://127.0.0.1:{port}/"), &options(Some(Duration::from_secs(5))))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Connect(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn invalid_url_is_other_error() {
        let transport = ReqwestTransport::with_defaults().unwrap();
        let err = transport.get("not a url", &options(None)).await.unwrap_err();
        assert!(matches!(err, TransportError::Other(_)), "got {err:?}");
    }
}
