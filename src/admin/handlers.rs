use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::config::validate_backend_address;
use crate::load_balancer::Membership;
use crate::observability::metrics;

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub healthy: usize,
    pub unhealthy: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackendStatus {
    pub address: String,
    pub status: Membership,
    pub connections: usize,
}

#[derive(Debug, Deserialize)]
pub struct AddBackend {
    pub address: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let (healthy, unhealthy) = state.pool.counts();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        healthy,
        unhealthy,
    })
}

pub async fn get_backends(State(state): State<AdminState>) -> Json<Vec<BackendStatus>> {
    let statuses = state
        .pool
        .members()
        .into_iter()
        .map(|(backend, status)| BackendStatus {
            address: backend.addr().to_string(),
            status,
            connections: backend.connections(),
        })
        .collect();
    Json(statuses)
}

pub async fn add_backend(
    State(state): State<AdminState>,
    Json(body): Json<AddBackend>,
) -> impl IntoResponse {
    if let Err(e) = validate_backend_address(&body.address) {
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }
    state.pool.add(&body.address);
    tracing::info!(addr = %body.address, "Backend added via admin API");
    record_sizes(&state);

    let created = BackendStatus {
        status: state.pool.membership(&body.address).unwrap_or(Membership::Healthy),
        connections: state.pool.get(&body.address).map(|b| b.connections()).unwrap_or(0),
        address: body.address,
    };
    (StatusCode::CREATED, Json(created)).into_response()
}

pub async fn discard_backend(
    State(state): State<AdminState>,
    Path(address): Path<String>,
) -> StatusCode {
    match state.pool.discard(&address) {
        Some(_) => {
            record_sizes(&state);
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}

fn record_sizes(state: &AdminState) {
    let (healthy, unhealthy) = state.pool.counts();
    metrics::record_pool_size(healthy, unhealthy);
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::admin::setup_admin_router;
    use crate::load_balancer::{Membership, ServerPool};
    use super::*;

    const KEY: &str = "test-key";

    fn request(method: &str, uri: &str, body: Option<&str>) -> Request<Body> {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::AUTHORIZATION, format!("Bearer {}", KEY));
        match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_requires_api_key() {
        let app = setup_admin_router(Arc::new(ServerPool::new()), KEY);
        let res = app
            .oneshot(Request::builder().uri("/admin/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_list_backends() {
        let pool = Arc::new(ServerPool::with_backends(["127.0.0.1:8081", "127.0.0.1:8082"]));
        pool.remove("127.0.0.1:8082");
        let app = setup_admin_router(pool, KEY);

        let res = app.oneshot(request("GET", "/admin/backends", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let list: Vec<BackendStatus> = serde_json::from_slice(&bytes).unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(list[0].address, "127.0.0.1:8081");
        assert_eq!(list[0].status, Membership::Healthy);
        assert_eq!(list[1].status, Membership::Unhealthy);
    }

    #[tokio::test]
    async fn test_add_and_discard() {
        let pool = Arc::new(ServerPool::new());
        let app = setup_admin_router(pool.clone(), KEY);

        let res = app
            .clone()
            .oneshot(request("POST", "/admin/backends", Some(r#"{"address":"127.0.0.1:9001"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        assert_eq!(pool.membership("127.0.0.1:9001"), Some(Membership::Healthy));

        let res = app
            .clone()
            .oneshot(request("POST", "/admin/backends", Some(r#"{"address":"not an address"}"#)))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let res = app
            .clone()
            .oneshot(request("DELETE", "/admin/backends/127.0.0.1:9001", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert!(pool.is_empty());

        let res = app
            .oneshot(request("DELETE", "/admin/backends/127.0.0.1:9001", None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let pool = Arc::new(ServerPool::with_backends(["a:1", "b:2", "c:3"]));
        pool.remove("c:3");
        let app = setup_admin_router(pool, KEY);

        let res = app.oneshot(request("GET", "/admin/status", None)).await.unwrap();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let status: SystemStatus = serde_json::from_slice(&bytes).unwrap();
        assert_eq!((status.healthy, status.unhealthy), (2, 1));
    }
}
