//! Single job status query.

use clap::{Args, ValueEnum};
use serde::Serialize;

use sproochmaschinn::{JobKind, JobOutcome};

use super::{
    DEFAULT_TTS_OUTPUT, create_client, format_bytes, output_result, print_success, write_audio,
};
use crate::Cli;

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Tts,
    Stt,
}

impl From<Kind> for JobKind {
    fn from(k: Kind) -> Self {
        match k {
            Kind::Tts => JobKind::Tts,
            Kind::Stt => JobKind::Stt,
        }
    }
}

/// Query a submitted job once, without waiting.
///
/// A completed TTS job writes its audio to -o (default luxembourgish-tts.wav).
#[derive(Args)]
pub struct StatusCommand {
    /// Request id returned at submission
    request_id: String,
    /// Job kind
    #[arg(short = 'k', long, value_enum, default_value = "stt")]
    kind: Kind,
}

#[derive(Serialize)]
struct PendingOutput<'a> {
    request_id: &'a str,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    progress: Option<f64>,
}

impl StatusCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (client, _ctx) = create_client(cli)?;

        match client
            .jobs()
            .poll_result(&self.request_id, self.kind.into())
            .await?
        {
            JobOutcome::Pending { progress } => output_result(
                cli,
                &PendingOutput {
                    request_id: &self.request_id,
                    status: "pending",
                    progress,
                },
            ),
            JobOutcome::Speech(audio) => {
                let path = cli.output.as_deref().unwrap_or(DEFAULT_TTS_OUTPUT);
                write_audio(path, &audio.data)?;
                print_success(&format!("Audio saved to {} ({})", path, format_bytes(audio.len())));
                Ok(())
            }
            JobOutcome::Transcript(transcript) => output_result(cli, &transcript),
        }
    }
}
