//! Probe tests against local HTTP servers
//!
//! Every test binds its own site on 127.0.0.1 so no outside network is
//! needed.

use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{Html, Redirect};
use axum::routing::get;
use linkdeck_core::LinkProbe;
use linkdeck_linkcheck::{
    CheckOptions, CheckerConfig, LinkReachabilityChecker, RelayState, relay_router,
};
use tokio::net::TcpListener;

const PAGE: &str = r#"<!doctype html><html><head>
<title>Example Page</title>
<meta name="description" content="A page used in tests">
<link rel="icon" href="/assets/favicon.png">
</head><body>hi</body></html>"#;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn spawn_site() -> String {
    let app = Router::new()
        .route("/page", get(|| async { Html(PAGE) }))
        .route(
            "/no-head",
            get(|| async { Html(PAGE) }).head(|| async { StatusCode::FORBIDDEN }),
        )
        .route(
            "/head-405",
            get(|| async { Html(PAGE) }).head(|| async { StatusCode::METHOD_NOT_ALLOWED }),
        )
        .route("/missing", get(|| async { StatusCode::NOT_FOUND }))
        .route("/plain", get(|| async { "just text" }))
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(3)).await;
                "late"
            }),
        )
        .route("/moved", get(|| async { Redirect::permanent("/page") }));
    serve(app).await
}

fn checker() -> LinkReachabilityChecker {
    LinkReachabilityChecker::new(CheckerConfig::default()).unwrap()
}

fn quick() -> CheckOptions {
    CheckOptions::with_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_html_page_metadata() {
    let site = spawn_site().await;
    let result = checker().check(&format!("{site}/page"), quick()).await;

    assert!(result.reachable);
    assert_eq!(result.status, Some(200));
    assert_eq!(result.title.as_deref(), Some("Example Page"));
    assert_eq!(result.description.as_deref(), Some("A page used in tests"));
    assert_eq!(
        result.favicon.as_deref(),
        Some(format!("{site}/assets/favicon.png").as_str())
    );
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_head_rejection_falls_back_to_get() {
    let site = spawn_site().await;
    let result = checker().check(&format!("{site}/no-head"), quick()).await;

    assert!(result.reachable);
    assert_eq!(result.status, Some(200));
    assert_eq!(result.title.as_deref(), Some("Example Page"));
}

#[tokio::test]
async fn test_head_405_counts_as_reachable() {
    let site = spawn_site().await;
    let result = checker().check(&format!("{site}/head-405"), quick()).await;

    assert!(result.reachable);
    assert_eq!(result.status, Some(405));
    // No body was fetched for a 405
    assert!(result.title.is_none());
}

#[tokio::test]
async fn test_missing_page_is_unreachable() {
    let site = spawn_site().await;
    let result = checker().check(&format!("{site}/missing"), quick()).await;

    assert!(!result.reachable);
    assert_eq!(result.status, Some(404));
    assert!(result.error.is_none());
    assert!(result.favicon.is_none());
}

#[tokio::test]
async fn test_non_html_skips_metadata() {
    let site = spawn_site().await;
    let result = checker().check(&format!("{site}/plain"), quick()).await;

    assert!(result.reachable);
    assert!(result.title.is_none());
    assert!(result.favicon.is_none());
}

#[tokio::test]
async fn test_redirect_reports_final_url() {
    let site = spawn_site().await;
    let result = checker().check(&format!("{site}/moved"), quick()).await;

    assert!(result.reachable);
    assert_eq!(result.final_url.as_deref(), Some(format!("{site}/page").as_str()));
    assert_eq!(result.title.as_deref(), Some("Example Page"));
}

#[tokio::test]
async fn test_timeout_is_reported_not_thrown() {
    let site = spawn_site().await;
    let result = checker()
        .check(
            &format!("{site}/slow"),
            CheckOptions::with_timeout(Duration::from_millis(200)),
        )
        .await;

    assert!(!result.reachable);
    assert_eq!(result.error.as_deref(), Some("timeout"));
    assert!(result.elapsed_ms >= 200);
}

#[tokio::test]
async fn test_relay_mode() {
    let site = spawn_site().await;
    let relay = serve(relay_router(
        RelayState::new("linkdeck-test", Duration::from_secs(5)).unwrap(),
    ))
    .await;

    let checker =
        LinkReachabilityChecker::new(CheckerConfig::default().with_relay(relay.clone())).unwrap();

    let result = checker.check(&format!("{site}/page"), quick()).await;
    assert!(result.reachable);
    assert_eq!(result.status, Some(200));
    // Relay answers carry no HTML metadata
    assert!(result.title.is_none());
    assert_eq!(
        result.favicon.as_deref(),
        Some("https://www.google.com/s2/favicons?domain=127.0.0.1&sz=64")
    );

    let result = checker.check(&format!("{site}/missing"), quick()).await;
    assert!(!result.reachable);
    assert_eq!(result.status, Some(404));
    assert!(result.favicon.is_none());
}

#[tokio::test]
async fn test_probe_trait_reports_normalized_url() {
    let site = spawn_site().await;
    let report = checker().probe(&format!("{site}/page")).await;
    assert!(report.reachable);
    assert_eq!(report.normalized_url, format!("{site}/page"));
    assert_eq!(report.title.as_deref(), Some("Example Page"));
}
