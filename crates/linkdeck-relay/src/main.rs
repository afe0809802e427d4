use std::time::Duration;

use clap::Parser;
use linkdeck_linkcheck::{CheckOptions, CheckerConfig, LinkReachabilityChecker};
use linkdeck_logging::LinkdeckSubscriberBuilder;
use linkdeck_relay::{Cli, Command, RelayConfig, serve};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            listen,
            config,
            log_level,
            pretty,
        } => {
            let mut config = match config {
                Some(path) => RelayConfig::load(path)?,
                None => RelayConfig::default(),
            };
            if let Some(listen) = listen {
                config = config.with_listen(listen);
            }

            let mut logging = LinkdeckSubscriberBuilder::new().with_config(config.log.clone());
            if let Some(level) = log_level {
                logging = logging.with_level(level);
            }
            if pretty {
                logging = logging.with_pretty(true);
            }
            let _guard = logging.try_init()?;

            serve(&config, async {
                let _ = tokio::signal::ctrl_c().await;
            })
            .await?;
        }

        Command::Check {
            url,
            timeout_ms,
            relay,
        } => {
            let mut checker_config = CheckerConfig::default();
            if let Some(relay) = relay {
                checker_config = checker_config.with_relay(relay);
            }
            let checker = LinkReachabilityChecker::new(checker_config)?;
            let result = checker
                .check(&url, CheckOptions::with_timeout(Duration::from_millis(timeout_ms)))
                .await;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.reachable {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
