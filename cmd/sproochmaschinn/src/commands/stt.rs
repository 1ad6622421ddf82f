//! STT (Speech-to-Text) command.

use std::io::Write;

use clap::Args;
use serde::Serialize;

use sproochmaschinn::{AudioUpload, Segment, Transcript, Word};

use super::{
    cancel_on_ctrl_c, create_client, format_bytes, output_result, print_success, print_verbose,
};
use crate::Cli;

/// Transcribe an audio file.
#[derive(Args)]
pub struct SttCommand {
    /// Audio file (wav, webm, ogg, mp4, mp3)
    file: String,
    /// Disable speaker identification
    #[arg(long)]
    no_speaker_id: bool,
}

#[derive(Serialize)]
struct TranscriptOutput<'a> {
    text: &'a str,
    duration: f64,
    word_count: usize,
    #[serde(skip_serializing_if = "is_empty")]
    segments: &'a [Segment],
    #[serde(skip_serializing_if = "is_empty")]
    words: &'a [Word],
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

impl<'a> From<&'a Transcript> for TranscriptOutput<'a> {
    fn from(t: &'a Transcript) -> Self {
        Self {
            text: &t.text,
            duration: t.duration,
            word_count: t.word_count(),
            segments: &t.segments,
            words: &t.words,
        }
    }
}

impl SttCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let audio = AudioUpload::from_path(&self.file)?;
        print_verbose(
            cli,
            &format!(
                "Audio: {} ({}, {})",
                audio.file_name,
                audio.mime_type,
                format_bytes(audio.len())
            ),
        );

        let (client, _ctx) = create_client(cli)?;
        let cancel = cancel_on_ctrl_c();

        let result = client
            .jobs()
            .submit_transcription_with_cancel(
                audio,
                !self.no_speaker_id,
                |p| {
                    eprint!("\rTranscribing... {:>3.0}%", p);
                    let _ = std::io::stderr().flush();
                },
                &cancel,
            )
            .await;
        eprintln!();
        client.teardown();
        let transcript = result?;

        print_success(&format!(
            "Transcribed {:.1}s of audio, {} words",
            transcript.duration,
            transcript.word_count()
        ));
        output_result(cli, &TranscriptOutput::from(&transcript))
    }
}
