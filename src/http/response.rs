//! Response handling and transformation.
//!
//! # Responsibilities
//! - Return the backend response with status and body untouched
//! - Strip hop-by-hop headers
//! - Keep the backend's connection count held until the body is done
//! - Map dispatch errors to HTTP status codes

use axum::body::Body;
use axum::http::{Response, StatusCode};
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use hyper::body::Incoming;

use crate::http::dispatcher::DispatchError;
use crate::http::request::strip_hop_by_hop;
use crate::load_balancer::BackendConnectionGuard;

/// Convert a backend response into the client response.
///
/// The guard moves into the body stream, so the connection is released when
/// the body finishes or is dropped.
pub fn into_client_response(
    response: Response<Incoming>,
    guard: BackendConnectionGuard,
) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);

    let body = body.map_frame(move |frame| {
        let _held = &guard;
        frame
    });
    Response::from_parts(parts, Body::new(body))
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::NoBackend => StatusCode::SERVICE_UNAVAILABLE,
            DispatchError::InvalidUpstream(_) | DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
            DispatchError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> axum::response::Response {
        let body = match self {
            DispatchError::NoBackend => "There are no servers available",
            DispatchError::InvalidUpstream(_) | DispatchError::Upstream(_) => "Upstream request failed",
            DispatchError::UpstreamTimeout(_) => "Upstream request timed out",
        };
        (self.status(), body).into_response()
    }
}
