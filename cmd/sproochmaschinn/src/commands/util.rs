//! Utility functions for CLI commands.

use sproochmaschinn::Client;
use sproochmaschinn_cli::{
    Output, OutputFormat,
    config::{Config, Context, load_config},
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use crate::Cli;

/// Default output file for synthesized speech.
pub const DEFAULT_TTS_OUTPUT: &str = "luxembourgish-tts.wav";

/// Installs the tracing subscriber. `RUST_LOG` wins over `-v`.
pub fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref())
}

/// Gets the context to use.
///
/// An explicit `-c` must exist; otherwise the current context is used, or the
/// built-in defaults when none is set.
pub fn get_context(cli: &Cli) -> anyhow::Result<Context> {
    let cfg = get_config(cli)?;

    match (cli.context.as_deref(), cfg.resolve_context(cli.context.as_deref())) {
        (_, Some(ctx)) => Ok(ctx.clone()),
        (Some(name), None) if !name.is_empty() => anyhow::bail!("context '{}' not found", name),
        _ => Ok(Context::default()),
    }
}

/// Creates a client from the selected context.
pub fn create_client(cli: &Cli) -> anyhow::Result<(Client, Context)> {
    let ctx = get_context(cli)?;
    let client = ctx.apply(Client::builder()).build()?;
    print_verbose(
        cli,
        &format!(
            "Using {} (context: {})",
            client.base_url(),
            if ctx.name.is_empty() { "-" } else { &ctx.name }
        ),
    );
    Ok((client, ctx))
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(cli: &Cli, result: &T) -> anyhow::Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    };
    Output::new(format, cli.output.clone()).write(result)
}

/// Writes synthesized audio to `path`.
pub fn write_audio(path: &str, data: &[u8]) -> anyhow::Result<()> {
    Output::new(OutputFormat::default(), None).write_binary(data, path)
}

/// Returns a token cancelled on Ctrl-C.
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });
    token
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    sproochmaschinn_cli::print_verbose(cli.verbose, msg);
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Formats bytes to human readable string.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
