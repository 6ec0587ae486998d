//! Request handling and transformation.
//!
//! # Responsibilities
//! - Rewrite the inbound URI to point at the chosen backend
//! - Strip hop-by-hop headers, keep everything else (including `Host`)
//! - Append the client IP to `X-Forwarded-For`
//!
//! The request ID is assigned by `tower_http::request_id` before the
//! dispatcher runs, so it is forwarded with the other headers.

use std::net::SocketAddr;
use axum::body::Body;
use axum::http::{
    header::{self, HeaderMap, HeaderName, HeaderValue},
    uri::Scheme,
    Request, Uri, Version,
};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");
const PROXY_CONNECTION: HeaderName = HeaderName::from_static("proxy-connection");

/// Remove connection-scoped headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let named: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|token| HeaderName::from_bytes(token.trim().as_bytes()).ok())
        .collect();
    for name in named {
        headers.remove(name);
    }

    for name in [
        header::CONNECTION,
        PROXY_CONNECTION,
        KEEP_ALIVE,
        header::PROXY_AUTHENTICATE,
        header::PROXY_AUTHORIZATION,
        header::TE,
        header::TRAILER,
        header::TRANSFER_ENCODING,
        header::UPGRADE,
    ] {
        headers.remove(name);
    }
}

/// `http://<addr><path-and-query>` for the given inbound URI.
pub fn upstream_uri(original: &Uri, addr: &str) -> Result<Uri, axum::http::Error> {
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(addr)
        .path_and_query(path_and_query)
        .build()
}

/// Turn an inbound request into the request sent to `addr`.
pub fn prepare_upstream_request(
    request: Request<Body>,
    addr: &str,
    client: Option<SocketAddr>,
) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    parts.uri = upstream_uri(&parts.uri, addr)?;
    // The upstream client speaks HTTP/1.1 regardless of the inbound version.
    parts.version = Version::HTTP_11;
    strip_hop_by_hop(&mut parts.headers);

    if let Some(client) = client {
        let ip = client.ip().to_string();
        let forwarded = match parts.headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
            Some(prior) => format!("{}, {}", prior, ip),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded) {
            parts.headers.insert(X_FORWARDED_FOR, value);
        }
    }

    Ok(Request::from_parts(parts, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_uri_keeps_path_and_query() {
        let original: Uri = "/api/items?page=2".parse().unwrap();
        let uri = upstream_uri(&original, "127.0.0.1:8081").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8081/api/items?page=2");

        let bare: Uri = "http://balancer.local".parse().unwrap();
        let uri = upstream_uri(&bare, "127.0.0.1:8081").unwrap();
        assert_eq!(uri.to_string(), "http://127.0.0.1:8081/");
    }

    #[test]
    fn test_upstream_uri_rejects_bad_authority() {
        let original: Uri = "/".parse().unwrap();
        assert!(upstream_uri(&original, "bad host").is_err());
    }

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert(KEEP_ALIVE, HeaderValue::from_static("timeout=5"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::HOST, HeaderValue::from_static("balancer.local"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        strip_hop_by_hop(&mut headers);

        assert_eq!(headers.len(), 2);
        assert!(headers.contains_key(header::HOST));
        assert!(headers.contains_key(header::CONTENT_TYPE));
    }

    #[test]
    fn test_prepare_upstream_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/submit")
            .header(X_REQUEST_ID, "req-1")
            .header(X_FORWARDED_FOR, "10.0.0.1")
            .header(header::CONNECTION, "close")
            .body(Body::from("payload"))
            .unwrap();
        let client: SocketAddr = "192.168.1.7:50000".parse().unwrap();

        let upstream = prepare_upstream_request(request, "127.0.0.1:8082", Some(client)).unwrap();
        assert_eq!(upstream.method(), "POST");
        assert_eq!(upstream.uri().to_string(), "http://127.0.0.1:8082/submit");
        assert_eq!(upstream.headers()[X_REQUEST_ID], "req-1");
        assert_eq!(upstream.headers()[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.7");
        assert!(!upstream.headers().contains_key(header::CONNECTION));
    }
}
