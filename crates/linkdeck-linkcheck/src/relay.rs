//! Dev-mode link-check relay
//!
//! `GET /api/linkcheck?url=<encoded>` probes the URL server-side with the
//! same HEAD → GET fallback as the direct checker and answers with
//! reachability, status and final URL only. Anything that is not an
//! absolute http(s) URL is refused with `400` and a structured error.

use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::error::LinkCheckError;
use crate::normalize::is_http_url;
use crate::probe::probe;

/// Body of a relay answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub reachable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RelayResponse {
    fn error(message: impl Into<String>) -> Self {
        Self {
            reachable: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Shared state of the relay handlers
#[derive(Debug, Clone)]
pub struct RelayState {
    http: Client,
    timeout: Duration,
}

impl RelayState {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, LinkCheckError> {
        let http = Client::builder().user_agent(user_agent).build()?;
        Ok(Self { http, timeout })
    }
}

#[derive(Debug, Deserialize)]
struct LinkCheckQuery {
    url: Option<String>,
}

/// Build the relay router
pub fn relay_router(state: RelayState) -> Router {
    Router::new()
        .route("/api/linkcheck", get(linkcheck))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn linkcheck(
    State(state): State<RelayState>,
    Query(query): Query<LinkCheckQuery>,
) -> (StatusCode, Json<RelayResponse>) {
    let url = query.url.map(|u| u.trim().to_string());
    let Some(url) = url.filter(|u| !u.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(RelayResponse::error("missing url parameter")),
        );
    };
    if !is_http_url(&url) {
        warn!(%url, "Refusing non-http(s) link check");
        return (
            StatusCode::BAD_REQUEST,
            Json(RelayResponse::error("only http and https URLs can be checked")),
        );
    }

    let attempt = tokio::time::timeout(state.timeout, probe(&state.http, &url, None)).await;
    let response = match attempt {
        Ok(Ok(outcome)) => RelayResponse {
            reachable: outcome.reachable,
            status: Some(outcome.status),
            final_url: Some(outcome.final_url),
            error: None,
        },
        Ok(Err(e)) => RelayResponse::error(e.to_string()),
        Err(_) => RelayResponse::error("timeout"),
    };
    debug!(%url, reachable = response.reachable, status = ?response.status, "Relay check done");

    (StatusCode::OK, Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn router() -> Router {
        relay_router(RelayState::new("linkdeck-test", Duration::from_secs(2)).unwrap())
    }

    async fn call(uri: &str) -> (StatusCode, RelayResponse) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let (status, body) = call("/api/linkcheck?url=ftp%3A%2F%2Fexample.com").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!body.reachable);
        assert!(body.error.unwrap().contains("http"));
    }

    #[tokio::test]
    async fn test_rejects_missing_url() {
        let (status, body) = call("/api/linkcheck").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.as_deref(), Some("missing url parameter"));
    }

    #[tokio::test]
    async fn test_health() {
        let response = router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
