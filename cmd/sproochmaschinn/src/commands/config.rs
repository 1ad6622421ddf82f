//! Configuration management commands.

use clap::{Args, Subcommand};

use sproochmaschinn_cli::config::Context as CliContext;

use super::{get_config, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Contexts hold endpoints and timings, e.g. one for the public service and
/// one for a local relay.
///
/// Configuration is stored in ~/.sproochmaschinn/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add a new context
    #[command(name = "add-context")]
    AddContext {
        /// Context name
        name: String,
        /// API base URL (may point at a relay)
        #[arg(long)]
        base_url: Option<String>,
        /// Live channel URL (ws:// or wss://)
        #[arg(long)]
        ws_url: Option<String>,
        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Server-side session expiry in seconds
        #[arg(long)]
        session_expiry: Option<u64>,
        /// Keep-alive interval in seconds
        #[arg(long)]
        keepalive_interval: Option<u64>,
        /// Live channel ping interval in seconds
        #[arg(long)]
        ping_interval: Option<u64>,
        /// Live channel reconnect delay in seconds
        #[arg(long)]
        reconnect_delay: Option<u64>,
        /// Poll only, never open the live channel
        #[arg(long)]
        no_live_channel: bool,
        /// Default voice model
        #[arg(long)]
        default_voice: Option<String>,
    },
    /// Delete a context
    #[command(name = "delete-context")]
    DeleteContext {
        /// Context name
        name: String,
    },
    /// Set the current context
    #[command(name = "use-context")]
    UseContext {
        /// Context name
        name: String,
    },
    /// Display the current context
    #[command(name = "get-context")]
    GetContext,
    /// List all contexts
    #[command(name = "list-contexts", alias = "get-contexts")]
    ListContexts,
    /// View the current configuration
    View,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddContext {
                name,
                base_url,
                ws_url,
                timeout,
                session_expiry,
                keepalive_interval,
                ping_interval,
                reconnect_delay,
                no_live_channel,
                default_voice,
            } => {
                let mut cfg = get_config(cli)?;

                let ctx = CliContext {
                    base_url: base_url.clone().unwrap_or_default(),
                    ws_url: ws_url.clone().unwrap_or_default(),
                    timeout: timeout.unwrap_or(0),
                    session_expiry: session_expiry.unwrap_or(0),
                    keepalive_interval: keepalive_interval.unwrap_or(0),
                    ping_interval: ping_interval.unwrap_or(0),
                    reconnect_delay: reconnect_delay.unwrap_or(0),
                    live_channel: no_live_channel.then_some(false),
                    default_voice: default_voice.clone().unwrap_or_default(),
                    ..Default::default()
                };

                // Reject contexts the SDK would refuse later.
                ctx.apply(sproochmaschinn::Client::builder()).build()?;

                cfg.add_context(name, ctx)?;
                print_success(&format!("Context \"{}\" added successfully", name));
                Ok(())
            }

            ConfigSubcommand::DeleteContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_context(name)?;
                print_success(&format!("Context \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::UseContext { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_context(name)?;
                print_success(&format!("Switched to context \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::GetContext => {
                let cfg = get_config(cli)?;
                if cfg.current_context.is_empty() {
                    println!("No current context set");
                } else {
                    println!("{}", cfg.current_context);
                }
                Ok(())
            }

            ConfigSubcommand::ListContexts => {
                let cfg = get_config(cli)?;

                if cfg.contexts.is_empty() {
                    println!("No contexts configured");
                    return Ok(());
                }

                println!("{:<8} {:<20} {:<36} {:<12}", "CURRENT", "NAME", "BASE_URL", "VOICE");
                for (name, ctx) in &cfg.contexts {
                    let current = if name == &cfg.current_context { "*" } else { "" };
                    let base_url = if ctx.base_url.is_empty() {
                        sproochmaschinn::DEFAULT_BASE_URL
                    } else {
                        ctx.base_url.as_str()
                    };
                    let voice = if ctx.default_voice.is_empty() {
                        "-"
                    } else {
                        ctx.default_voice.as_str()
                    };
                    println!("{:<8} {:<20} {:<36} {:<12}", current, name, base_url, voice);
                }
                Ok(())
            }

            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;

                println!("Config file: {}", cfg.path().display());
                println!("Current context: {}", cfg.current_context);
                println!("Contexts: {}", cfg.contexts.len());

                for (name, ctx) in &cfg.contexts {
                    println!("\n[{}]", name);
                    if !ctx.base_url.is_empty() {
                        println!("  Base URL: {}", ctx.base_url);
                    }
                    if !ctx.ws_url.is_empty() {
                        println!("  WebSocket URL: {}", ctx.ws_url);
                    }
                    if ctx.timeout > 0 {
                        println!("  Timeout: {}s", ctx.timeout);
                    }
                    if ctx.keepalive_interval > 0 {
                        println!("  Keep-alive: {}s", ctx.keepalive_interval);
                    }
                    if ctx.live_channel == Some(false) {
                        println!("  Live channel: off");
                    }
                    if !ctx.default_voice.is_empty() {
                        println!("  Default voice: {}", ctx.default_voice);
                    }
                }
                Ok(())
            }
        }
    }
}
