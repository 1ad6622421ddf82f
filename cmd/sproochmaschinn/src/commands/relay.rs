//! Local CORS relay.

use std::time::Duration;

use clap::Args;
use tracing::info;

use sproochmaschinn_relay::{DEFAULT_LISTEN, DEFAULT_UPSTREAM, RelayConfig, parse_listen, serve};

use super::print_verbose;
use crate::Cli;

/// Run a CORS relay so browser clients can reach the API.
///
/// Only /api/* is forwarded. The live channel must still connect directly.
#[derive(Args)]
pub struct RelayCommand {
    /// Listen address (":3456" binds all interfaces)
    #[arg(long, default_value = DEFAULT_LISTEN)]
    listen: String,
    /// Upstream origin
    #[arg(long, default_value = DEFAULT_UPSTREAM)]
    upstream: String,
    /// Allowed browser origin (repeatable; default "*")
    #[arg(long = "allow-origin")]
    allow_origins: Vec<String>,
    /// Upstream request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

impl RelayCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let config = RelayConfig {
            listen: parse_listen(&self.listen)?,
            upstream: self.upstream.clone(),
            allowed_origins: self.allow_origins.clone(),
            timeout: Duration::from_secs(self.timeout),
            ..Default::default()
        };

        if config.allowed_origins.is_empty() {
            print_verbose(cli, "Allowing any origin");
        } else {
            print_verbose(
                cli,
                &format!("Allowed origins: {}", config.allowed_origins.join(", ")),
            );
        }

        serve(config, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down relay");
        })
        .await?;
        Ok(())
    }
}
