//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4)
//! - Prepare headers for forwarding to an upstream
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - The request ID travels upstream and back to the client
//! - Original request preserved for logging; modified copy forwarded

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::http::response::strip_hop_by_hop;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Generates a fresh UUID v4 for each request without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Read the request id assigned by the request-id layer.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl RequestIdExt for HeaderMap {
    fn request_id(&self) -> &str {
        self.get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
    }
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> &str {
        self.headers().request_id()
    }
}

/// Rewrite inbound headers into the headers sent upstream.
///
/// Hop-by-hop headers are dropped, `Host` becomes the upstream authority,
/// and the `x-forwarded-*` headers describe the original request.
pub fn prepare_upstream_headers(headers: &mut HeaderMap, client: SocketAddr, target: &Uri) {
    let original_host = headers.get(header::HOST).cloned();
    strip_hop_by_hop(headers);

    let client_ip = client.ip().to_string();
    let forwarded_for = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) => format!("{}, {}", prior, client_ip),
        None => client_ip,
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    if let Some(host) = original_host {
        headers.insert(X_FORWARDED_HOST, host);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));

    match target.authority().map(|a| HeaderValue::from_str(a.as_str())) {
        Some(Ok(authority)) => {
            headers.insert(header::HOST, authority);
        }
        _ => {
            headers.remove(header::HOST);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_upstream_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("gateway.local:8080"));
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("10.0.0.1"));
        headers.insert(X_REQUEST_ID, HeaderValue::from_static("req-1"));

        let client: SocketAddr = "192.168.1.5:50000".parse().unwrap();
        let target: Uri = "http://localhost:9200/customers".parse().unwrap();
        prepare_upstream_headers(&mut headers, client, &target);

        assert_eq!(headers[header::HOST], "localhost:9200");
        assert_eq!(headers[X_FORWARDED_HOST], "gateway.local:8080");
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.5");
        assert_eq!(headers[X_FORWARDED_PROTO], "http");
        assert_eq!(headers.request_id(), "req-1");
        assert!(headers.get(header::CONNECTION).is_none());
    }

    #[test]
    fn test_make_request_uuid() {
        let request = Request::new(());
        let id = MakeRequestUuid.make_request_id(&request).unwrap();
        let text = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(text).is_ok());
    }
}
