//! Endpoint resolution: the fallback chain that turns a base URL into a
//! SpaceAPI document.
//!
//! ## Stages
//!
//! | Stage | Request | Used when |
//! |-------|---------|-----------|
//! | `direct` | GET the base URL | body is a JSON object |
//! | `html_link` | GET the `<link rel="space-api">` target | base response is HTML and carries the link |
//! | `well_known` | GET `{scheme}://{host}/status.json` | body is a JSON object |
//! | `dns` | SRV + TXT for the default service, then GET `https://{target}:{port}{path}` | body is a JSON object |
//!
//! Only "no JSON document here" moves on to the next stage. A transport
//! failure anywhere is an immediate [`ApiError::Connect`], and a missing DNS
//! record is an immediate [`ApiError::Discovery`]; the chain never keeps
//! hammering a host that has stopped answering. When every stage has run
//! without producing a document the result is [`ApiError::Parse`].

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::{
    html, txt_path, ApiError, ClientConfig, DnsError, HttpResponse, NameResolver, RequestOptions,
    SpaceDocument, SpaceUrl, Transport, TransportError, TransportOptions,
};

/// Resolves base URLs to SpaceAPI documents.
///
/// Cheap to share: components hold it behind an [`Arc`].
pub struct Resolver {
    transport: Arc<dyn Transport>,
    names: Arc<dyn NameResolver>,
    config: ClientConfig,
}

impl Resolver {
    /// Creates a resolver over the given adapters.
    pub fn new(
        transport: Arc<dyn Transport>,
        names: Arc<dyn NameResolver>,
        config: ClientConfig,
    ) -> Self {
        Self {
            transport,
            names,
            config,
        }
    }

    /// Instance-level configuration used when a call leaves options unset.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Runs the fallback chain for `url`.
    ///
    /// # Errors
    ///
    /// - [`ApiError::Connect`] if any request fails at the transport level.
    /// - [`ApiError::Discovery`] if the DNS stage is reached and a record is absent.
    /// - [`ApiError::Parse`] if every stage completed without a document.
    #[instrument(skip_all, fields(url = %url))]
    pub async fn resolve(
        &self,
        url: &SpaceUrl,
        options: &RequestOptions,
    ) -> Result<SpaceDocument, ApiError> {
        let opts = self.config.transport_options(options);

        let page = self.fetch(url.as_str(), &opts).await?;
        if let Some(doc) = page.document() {
            debug!(stage = "direct", "Resolved");
            return Ok(doc);
        }

        if page.is_html() {
            if let Some(doc) = self.follow_html_link(url, &page, &opts).await? {
                debug!(stage = "html_link", "Resolved");
                return Ok(doc);
            }
        }

        let well_known = url.well_known();
        if let Some(doc) = self.fetch(well_known.as_str(), &opts).await?.document() {
            debug!(stage = "well_known", "Resolved");
            return Ok(doc);
        }

        let target = self.locate_default_service().await?;
        if let Some(doc) = self.fetch(&target, &opts).await?.document() {
            debug!(stage = "dns", target = %target, "Resolved");
            return Ok(doc);
        }

        debug!("No stage produced a document");
        Err(ApiError::Parse {
            url: url.to_string(),
        })
    }

    /// Looks up the default service in DNS and returns its endpoint URL.
    ///
    /// # Errors
    ///
    /// [`ApiError::Discovery`] if the SRV or TXT record is absent,
    /// [`ApiError::Connect`] if the lookup itself fails.
    #[instrument(skip(self), fields(name = %self.config.default_service_name))]
    pub async fn locate_default_service(&self) -> Result<String, ApiError> {
        let name = self.config.default_service_name.as_str();

        let srv = self
            .names
            .query_srv(name)
            .await
            .map_err(|e| map_dns_error(name, e))?;
        let txt = self
            .names
            .query_txt(name)
            .await
            .map_err(|e| map_dns_error(name, e))?;

        let path = txt_path(txt.iter().flatten().map(String::as_str));
        let url = format!("https://{}:{}{}", srv.host(), srv.port, path);
        debug!(url = %url, "Located default service");
        Ok(url)
    }

    /// Issues one GET, mapping every transport failure to [`ApiError::Connect`].
    pub(crate) async fn fetch(
        &self,
        url: &str,
        options: &TransportOptions,
    ) -> Result<HttpResponse, ApiError> {
        self.transport
            .get(url, options)
            .await
            .map_err(|e| map_transport_error(url, e))
    }

    async fn follow_html_link(
        &self,
        base: &SpaceUrl,
        page: &HttpResponse,
        options: &TransportOptions,
    ) -> Result<Option<SpaceDocument>, ApiError> {
        let Some(href) = html::find_space_api_link(&page.text()) else {
            debug!("HTML page has no space-api link");
            return Ok(None);
        };

        let target = match base.join(&href) {
            Ok(target) => target,
            Err(err) => {
                warn!(href = %href, error = %err, "Ignoring unusable space-api link");
                return Ok(None);
            }
        };

        debug!(target = %target, "Following space-api link");
        Ok(self.fetch(target.as_str(), options).await?.document())
    }
}

fn map_transport_error(url: &str, err: TransportError) -> ApiError {
    ApiError::connect(url, err.to_string())
}

fn map_dns_error(name: &str, err: DnsError) -> ApiError {
    match err {
        DnsError::NotFound { record, .. } => {
            ApiError::discovery(name, format!("no {record} record"))
        }
        DnsError::Transport(message) => ApiError::connect(name, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{html, json, MockNames, MockTransport};
    use crate::ApiErrorKind;

    fn resolver(transport: &Arc<MockTransport>, names: &Arc<MockNames>) -> Resolver {
        Resolver::new(transport.clone(), names.clone(), ClientConfig::default())
    }

    fn url(s: &str) -> SpaceUrl {
        SpaceUrl::parse(s).unwrap()
    }

    #[tokio::test]
    async fn direct_json_stops_the_chain() {
        let transport = Arc::new(
            MockTransport::new()
                .route("http://foo.org/", json(r#"{"space":"Foo","address":"1 Main St"}"#)),
        );
        let names = Arc::new(MockNames::present("api.foo.org.", 443, &["path=/x"]));

        let doc = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap();

        assert_eq!(doc.get_str("space").unwrap(), "Foo");
        assert_eq!(doc.get_str("address").unwrap(), "1 Main St");
        assert_eq!(transport.calls(), vec!["http://foo.org/"]);
        assert_eq!(names.srv_calls(), 0);
    }

    #[tokio::test]
    async fn follows_html_link() {
        let transport = Arc::new(
            MockTransport::new()
                .route(
                    "http://foo.org/wiki",
                    html(r#"<head><link rel="space-api" href="/spaceapi.json"></head>"#),
                )
                .route("http://foo.org/spaceapi.json", json(r#"{"space":"Foo"}"#)),
        );
        let names = Arc::new(MockNames::absent());

        let doc = resolver(&transport, &names)
            .resolve(&url("http://foo.org/wiki"), &RequestOptions::inherit())
            .await
            .unwrap();

        assert_eq!(doc.get_str("space").unwrap(), "Foo");
        assert_eq!(
            transport.calls(),
            vec!["http://foo.org/wiki", "http://foo.org/spaceapi.json"]
        );
    }

    #[tokio::test]
    async fn falls_back_to_well_known_path() {
        let transport = Arc::new(
            MockTransport::new()
                .route("https://foo.org:8443/home", html("<p>hello</p>"))
                .route("https://foo.org:8443/status.json", json(r#"{"space":"WK"}"#)),
        );
        let names = Arc::new(MockNames::absent());

        let doc = resolver(&transport, &names)
            .resolve(&url("https://foo.org:8443/home"), &RequestOptions::inherit())
            .await
            .unwrap();

        assert_eq!(doc.get_str("space").unwrap(), "WK");
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn html_link_without_json_falls_through() {
        let transport = Arc::new(
            MockTransport::new()
                .route(
                    "http://foo.org/",
                    html(r#"<link rel="space-api" href="broken.json">"#),
                )
                .route("http://foo.org/broken.json", html("<p>not json</p>"))
                .route("http://foo.org/status.json", json(r#"{"space":"WK"}"#)),
        );
        let names = Arc::new(MockNames::absent());

        let doc = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap();

        assert_eq!(doc.get_str("space").unwrap(), "WK");
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn dns_stage_builds_url_from_srv_and_txt() {
        let transport = Arc::new(
            MockTransport::new()
                .route("https://api.example.net:8443/spaceapi.json", json(r#"{"space":"DNS"}"#)),
        );
        let names = Arc::new(MockNames::present(
            "api.example.net.",
            8443,
            &["version=1", "path=/spaceapi.json"],
        ));

        let doc = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap();

        assert_eq!(doc.get_str("space").unwrap(), "DNS");
        assert_eq!(
            transport.calls(),
            vec![
                "http://foo.org/",
                "http://foo.org/status.json",
                "https://api.example.net:8443/spaceapi.json",
            ]
        );
        assert_eq!(names.srv_calls(), 1);
        assert_eq!(names.txt_calls(), 1);
    }

    #[tokio::test]
    async fn missing_srv_is_discovery_error() {
        let transport = Arc::new(MockTransport::new());
        let names = Arc::new(MockNames::absent());

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Discovery);
        assert_eq!(names.txt_calls(), 0);
    }

    #[tokio::test]
    async fn missing_txt_is_discovery_error() {
        let transport = Arc::new(MockTransport::new());
        let names = Arc::new(MockNames::srv_only("api.example.net.", 443));

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Discovery);
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn no_document_anywhere_is_parse_error() {
        let transport = Arc::new(MockTransport::new());
        let names = Arc::new(MockNames::present("api.example.net.", 443, &[]));

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Parse);
        assert_eq!(transport.calls().last().unwrap(), "https://api.example.net:443/");
    }

    #[tokio::test]
    async fn timeout_on_first_stage_aborts() {
        let transport = Arc::new(
            MockTransport::new().route("http://foo.org/", Err(TransportError::Timeout)),
        );
        let names = Arc::new(MockNames::present("api.example.net.", 443, &[]));

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Connect);
        assert_eq!(transport.calls().len(), 1);
        assert_eq!(names.srv_calls(), 0);
    }

    #[tokio::test]
    async fn connect_error_on_html_link_aborts() {
        let transport = Arc::new(
            MockTransport::new()
                .route(
                    "http://foo.org/",
                    html(r#"<link rel="space-api" href="https://down.example/s.json">"#),
                )
                .route(
                    "https://down.example/s.json",
                    Err(TransportError::Connect("refused".into())),
                ),
        );
        let names = Arc::new(MockNames::present("api.example.net.", 443, &[]));

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Connect);
        assert_eq!(transport.calls().len(), 2);
        assert_eq!(names.srv_calls(), 0);
    }

    #[tokio::test]
    async fn connect_error_on_well_known_aborts() {
        let transport = Arc::new(
            MockTransport::new()
                .route("http://foo.org/", html("<p>hi</p>"))
                .route("http://foo.org/status.json", Err(TransportError::Timeout)),
        );
        let names = Arc::new(MockNames::present("api.example.net.", 443, &[]));

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Connect);
        assert_eq!(names.srv_calls(), 0);
    }

    #[tokio::test]
    async fn dns_transport_failure_is_connect_error() {
        let transport = Arc::new(MockTransport::new());
        let names = Arc::new(MockNames::failing("SERVFAIL"));

        let err = resolver(&transport, &names)
            .resolve(&url("http://foo.org/"), &RequestOptions::inherit())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ApiErrorKind::Connect);
    }

    #[tokio::test]
    async fn per_call_options_override_instance_defaults() {
        let transport = Arc::new(
            MockTransport::new().route("https://foo.org/", json(r#"{"space":"Foo"}"#)),
        );
        let names = Arc::new(MockNames::absent());
        let resolver = Resolver::new(
            transport.clone(),
            names,
            ClientConfig::builder()
                .verify_tls(true)
                .timeout(std::time::Duration::from_secs(30))
                .build(),
        );

        resolver
            .resolve(
                &url("https://foo.org/"),
                &RequestOptions::inherit()
                    .verify_tls(false)
                    .timeout(std::time::Duration::from_secs(1)),
            )
            .await
            .unwrap();

        let seen = transport.last_options().unwrap();
        assert!(!seen.verify_tls);
        assert_eq!(seen.timeout, Some(std::time::Duration::from_secs(1)));
    }
}
