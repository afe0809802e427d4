//! # Linkdeck Relay
//!
//! Development server exposing `GET /api/linkcheck?url=<encoded>` so a
//! browser client on the same origin can check links without running into
//! cross-origin restrictions. Probing and the router live in
//! `linkdeck-linkcheck`; this crate adds configuration and serving.

pub mod config;

pub use config::{Cli, Command, ConfigError, RelayConfig};

use linkdeck_linkcheck::{RelayState, relay_router};
use tokio::net::TcpListener;
use tracing::info;

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    config: &RelayConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let state = RelayState::new(&config.user_agent, config.probe_timeout())?;
    let listener = TcpListener::bind(config.listen).await?;
    info!(addr = %listener.local_addr()?, "Link-check relay listening");

    axum::serve(listener, relay_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Link-check relay stopped");
    Ok(())
}
