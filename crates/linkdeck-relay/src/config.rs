//! Relay configuration and command line

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use linkdeck_linkcheck::DEFAULT_TIMEOUT_MS;
use linkdeck_logging::LogConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the HTTP server binds to
    pub listen: SocketAddr,
    /// Upper bound on one server-side probe
    pub probe_timeout_ms: u64,
    /// User agent sent with probes
    pub user_agent: String,
    pub log: LogConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8787)),
            probe_timeout_ms: DEFAULT_TIMEOUT_MS,
            user_agent: format!("linkdeck-relay/{}", env!("CARGO_PKG_VERSION")),
            log: LogConfig::default(),
        }
    }
}

impl RelayConfig {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = listen;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

#[derive(Parser)]
#[command(name = "linkdeck-relay", about = "Link-check relay for Linkdeck development")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Serve GET /api/linkcheck
    Serve {
        /// Address to listen on (overrides the config file)
        #[arg(long)]
        listen: Option<SocketAddr>,
        /// TOML config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
        /// Human-readable log output
        #[arg(long)]
        pretty: bool,
    },
    /// Probe one URL directly and print the result as JSON
    Check {
        url: String,
        /// Timeout in milliseconds
        #[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,
        /// Ask a running relay instead of probing from here
        #[arg(long)]
        relay: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::parse_from([
            "linkdeck-relay",
            "serve",
            "--listen",
            "0.0.0.0:9000",
            "--log-level",
            "debug",
        ]);
        match cli.command {
            Command::Serve {
                listen, log_level, ..
            } => {
                assert_eq!(listen, Some("0.0.0.0:9000".parse().unwrap()));
                assert_eq!(log_level.as_deref(), Some("debug"));
            }
            Command::Check { .. } => panic!("expected serve"),
        }
    }

    #[test]
    fn test_config_from_toml() {
        let config = RelayConfig::from_toml(
            r#"
            listen = "127.0.0.1:5174"
            probe_timeout_ms = 3000

            [log]
            default_level = "debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen.port(), 5174);
        assert_eq!(config.probe_timeout(), Duration::from_secs(3));
        assert_eq!(config.log.default_level, "debug");
        assert!(config.user_agent.starts_with("linkdeck-relay/"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relay.toml");
        std::fs::write(&path, "probe_timeout_ms = 1500\n").unwrap();
        assert_eq!(RelayConfig::load(&path).unwrap().probe_timeout_ms, 1500);
        assert!(matches!(
            RelayConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }
}
