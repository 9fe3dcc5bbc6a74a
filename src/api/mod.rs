//! HTTP API — thin axum layer over the storage facade.

pub mod dashboard;
pub mod export;
pub mod records;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;

use crate::error::DatabaseError;
use crate::models::{GpsCoordinate, Sentiment, ValidationError, Vlog};
use crate::store::Storage;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<Storage>,
}

/// Build the full router: record endpoints, export, dashboard and health.
pub fn router(storage: Arc<Storage>) -> Router {
    let state = AppState { storage };

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route(
            "/vlogs",
            get(records::list::<Vlog>).post(records::create::<Vlog>),
        )
        .route(
            "/sentiments",
            get(records::list::<Sentiment>).post(records::create::<Sentiment>),
        )
        .route(
            "/gps",
            get(records::list::<GpsCoordinate>).post(records::create::<GpsCoordinate>),
        )
        .route("/export", get(export::export_data))
        .route("/dashboard", get(dashboard::dashboard))
        .route("/export-page", get(dashboard::dashboard))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Response envelope used by every JSON endpoint.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl ApiResponse {
    pub fn ok(message: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            count: None,
        }
    }

    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Handler error, rendered as `{"detail": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    /// Wrap a storage failure with context about what was being done.
    pub fn storage(context: &str, e: DatabaseError) -> Self {
        tracing::error!(error = %e, "{context}");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("{context}: {e}"))
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "detail": self.detail })),
        )
            .into_response()
    }
}

// ── Root & health ───────────────────────────────────────────────────────

async fn root() -> Json<ApiResponse> {
    Json(ApiResponse::ok(
        "Welcome to EmoGo Backend API!",
        serde_json::json!({
            "endpoints": ["/vlogs", "/sentiments", "/gps", "/export", "/dashboard", "/export-page", "/health"]
        }),
    ))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.storage.resolve_backend().await;
    Json(serde_json::json!({
        "status": "ok",
        "service": "emogo-backend",
        "backend": backend.kind(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::config::StorageConfig;

    fn app() -> Router {
        router(Arc::new(Storage::new(StorageConfig::default())))
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_memory_backend() {
        let (status, body) = send(&app(), get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn root_lists_endpoints() {
        let (status, body) = send(&app(), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert!(body["data"]["endpoints"].as_array().unwrap().len() >= 3);
    }

    #[tokio::test]
    async fn create_then_list_sentiments() {
        let app = app();
        let (status, created) = send(
            &app,
            post_json(
                "/sentiments",
                json!({
                    "text": "sunny walk",
                    "mood": "good",
                    "mood_score": "4/5",
                    "sentiment_score": 0.7,
                    "timestamp": "2025-11-20T08:00:00Z",
                    "user_id": "u1",
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["data"]["id"], "1");

        let (status, listed) = send(&app, get("/sentiments")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed["count"], 1);
        assert_eq!(listed["data"]["sentiments"][0]["mood"], "good");
        assert_eq!(listed["data"]["sentiments"][0]["id"], "1");
    }

    #[tokio::test]
    async fn invalid_coordinate_is_rejected() {
        let (status, body) = send(
            &app(),
            post_json(
                "/gps",
                json!({ "latitude": 123.0, "longitude": 0.0, "timestamp": "2025-11-20T08:00:00Z" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("latitude"));
    }

    #[tokio::test]
    async fn list_paginates_and_clamps_negative_values() {
        let app = app();
        for i in 0..5 {
            let (status, _) = send(
                &app,
                post_json(
                    "/gps",
                    json!({ "latitude": i as f64, "longitude": 0.0, "timestamp": "2025-11-20T08:00:00Z" }),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, page) = send(&app, get("/gps?skip=1&limit=2")).await;
        let coords = page["data"]["coordinates"].as_array().unwrap();
        assert_eq!(coords.len(), 2);
        assert_eq!(coords[0]["latitude"], 1.0);
        assert_eq!(page["count"], 5);

        let (_, clamped) = send(&app, get("/gps?skip=-3&limit=-1")).await;
        assert_eq!(clamped["data"]["coordinates"].as_array().unwrap().len(), 5);

        let (_, zero_limit) = send(&app, get("/gps?limit=0")).await;
        assert_eq!(zero_limit["data"]["coordinates"].as_array().unwrap().len(), 5);
        assert_eq!(zero_limit["count"], 5);

        let (_, past_end) = send(&app, get("/gps?skip=50")).await;
        assert!(past_end["data"]["coordinates"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn export_page_serves_dashboard() {
        let response = app()
            .oneshot(get("/export-page"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let page = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(page.contains("EmoGo Data Export Portal"));
        assert!(page.contains("API Endpoints"));
    }

    #[tokio::test]
    async fn malformed_requests_use_detail_envelope() {
        let app = app();

        let (status, body) = send(&app, get("/gps?skip=abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("query string"));

        let (status, body) = send(
            &app,
            post_json("/gps", json!({ "latitude": 1.0, "timestamp": "2025-11-20T08:00:00Z" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].as_str().unwrap().contains("longitude"));

        let broken = Request::builder()
            .method("POST")
            .uri("/sentiments")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = send(&app, broken).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].is_string());

        let (status, body) = send(&app, get("/export")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["detail"].as_str().unwrap().contains("data_type"));
    }

    #[tokio::test]
    async fn list_filters_by_user() {
        let app = app();
        for user in ["u1", "u2", "u1"] {
            send(
                &app,
                post_json(
                    "/vlogs",
                    json!({ "title": "clip", "timestamp": "2025-11-20T08:00:00Z", "user_id": user }),
                ),
            )
            .await;
        }

        let (_, body) = send(&app, get("/vlogs?user_id=u1")).await;
        assert_eq!(body["count"], 2);
        assert_eq!(body["data"]["vlogs"].as_array().unwrap().len(), 2);
    }
}
