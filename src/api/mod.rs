//! HTTP API module
//!
//! The development host's stand-in for browser callbacks, plus status reads.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/icon", post(icon_handler))
        .route("/notifications/:id/button", post(notification_button_handler))
        .route("/settings", put(settings_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::TimerConfig, services::MemoryStore};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    fn router() -> Router {
        let (state, _events) = AppState::new(
            Arc::new(MemoryStore::new()),
            TimerConfig::default(),
            0,
            "127.0.0.1".to_string(),
        );
        create_router(Arc::new(state))
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn icon_click_starts_active_phase() {
        let response = router()
            .oneshot(Request::post("/icon").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["timer"]["status"], "active");
        assert_eq!(body["timer"]["heartbeat"], "repeating");
        assert_eq!(body["badgeText"], "25");
        assert_eq!(body["lastAction"], "icon");
    }

    #[tokio::test]
    async fn unknown_notification_is_not_found() {
        let response = router()
            .oneshot(
                Request::post("/notifications/start-lunch/button")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn empty_settings_update_is_rejected() {
        let response = router()
            .oneshot(
                Request::put("/settings")
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_duration_is_rejected() {
        let response = router()
            .oneshot(
                Request::put("/settings")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"activeDuration": 18446744073709551615}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn status_before_any_event_is_unloaded() {
        let response = router()
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = json_body(response).await;
        assert_eq!(body["timer"]["status"], Value::Null);
        assert_eq!(body["timer"]["heartbeat"], "stopped");
    }
}
