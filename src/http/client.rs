//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Pool connections to upstreams (hyper-util legacy client)
//! - Speak TLS to `https` upstreams (rustls, platform roots)
//! - Bound connect and response-head time
//! - Classify failures into `UpstreamError`
//!
//! # Design Decisions
//! - One client shared by every route; hosts get separate pools
//! - Only the response head is deadline-bound; bodies stream indefinitely
//! - Nothing is retried

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rustls::{ClientConfig, RootCertStore};

use crate::config::schema::TimeoutConfig;
use crate::error::UpstreamError;
use crate::resilience::timeouts::{error_chain, is_timeout, with_deadline, Deadline};

type HttpsClient = Client<HttpsConnector<HttpConnector>, Body>;

/// Shared, cloneable upstream client.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: HttpsClient,
    connect_timeout: Duration,
    response_timeout: Duration,
}

impl std::fmt::Debug for UpstreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamClient")
            .field("connect_timeout", &self.connect_timeout)
            .field("response_timeout", &self.response_timeout)
            .finish()
    }
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig) -> Result<Self, rustls::Error> {
        let connect_timeout = Duration::from_secs(timeouts.connect_secs);
        let response_timeout = Duration::from_secs(timeouts.request_secs);

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_connect_timeout(Some(connect_timeout));
        http.set_nodelay(true);

        let https = HttpsConnectorBuilder::new()
            .with_tls_config(tls_config()?)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(https);

        Ok(Self {
            inner,
            connect_timeout,
            response_timeout,
        })
    }

    /// Send `request` and wait for the response head.
    pub async fn forward(
        &self,
        route_id: &str,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, UpstreamError> {
        let target = request.uri().to_string();

        match with_deadline(self.response_timeout, self.inner.request(request)).await {
            Deadline::Completed(response) => Ok(response),
            Deadline::Elapsed => Err(UpstreamError::Timeout {
                route_id: route_id.to_string(),
                target,
                timeout: self.response_timeout,
            }),
            Deadline::Failed(e) => Err(self.classify(route_id, target, &e)),
        }
    }

    fn classify(
        &self,
        route_id: &str,
        target: String,
        err: &hyper_util::client::legacy::Error,
    ) -> UpstreamError {
        let route_id = route_id.to_string();
        if is_timeout(err) {
            UpstreamError::Timeout {
                route_id,
                target,
                timeout: self.connect_timeout,
            }
        } else if err.is_connect() {
            UpstreamError::Connect {
                route_id,
                target,
                reason: error_chain(err),
            }
        } else {
            UpstreamError::Protocol {
                route_id,
                target,
                reason: error_chain(err),
            }
        }
    }
}

fn tls_config() -> Result<ClientConfig, rustls::Error> {
    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();
    for error in &native.errors {
        tracing::warn!(error = %error, "Failed to load a platform certificate");
    }
    let (added, ignored) = roots.add_parsable_certificates(native.certs);
    tracing::debug!(added, ignored, "Loaded platform root certificates");
    if roots.is_empty() {
        tracing::warn!("No platform root certificates found; https upstreams will fail");
    }

    let config = ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .with_root_certificates(roots)
    .with_no_client_auth();

    Ok(config)
}
