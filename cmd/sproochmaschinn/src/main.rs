//! Sproochmaschinn CLI - Luxembourgish text-to-speech and speech-to-text.

use clap::{Parser, Subcommand};

mod commands;

use commands::{
    ConfigCommand, ListenCommand, RelayCommand, SessionCommand, StatusCommand, SttCommand,
    TtsCommand,
};

/// Sproochmaschinn CLI - A command line interface for the Sproochmaschinn API.
///
/// This tool lets you:
///   - TTS: synthesize Luxembourgish speech to a WAV file
///   - STT: transcribe an audio file
///   - Listen: follow live session notifications
///   - Relay: run a local CORS relay for browser clients
///
/// Configuration is stored in ~/.sproochmaschinn/ and supports multiple
/// contexts, similar to kubectl's context management. Without a context the
/// public service is used directly.
#[derive(Parser)]
#[command(name = "sproochmaschinn")]
#[command(about = "Sproochmaschinn API CLI tool")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.sproochmaschinn/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Context name to use
    #[arg(short = 'c', long, global = true)]
    pub context: Option<String>,

    /// Output file (default: stdout, or luxembourgish-tts.wav for tts)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Session management
    Session(SessionCommand),
    /// Text-to-speech synthesis
    Tts(TtsCommand),
    /// Speech-to-text transcription
    Stt(SttCommand),
    /// Query a submitted job once
    Status(StatusCommand),
    /// Print live channel notifications
    Listen(ListenCommand),
    /// Run the CORS relay
    Relay(RelayCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Both ring and aws-lc may be compiled in; pick one before any TLS use.
    let _ = rustls::crypto::ring::default_provider().install_default();

    commands::init_logging(cli.verbose);

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Session(cmd) => cmd.run(&cli).await,
        Commands::Tts(cmd) => cmd.run(&cli).await,
        Commands::Stt(cmd) => cmd.run(&cli).await,
        Commands::Status(cmd) => cmd.run(&cli).await,
        Commands::Listen(cmd) => cmd.run(&cli).await,
        Commands::Relay(cmd) => cmd.run(&cli).await,
    }
}
