//! TTS (Text-to-Speech) command.

use clap::Args;

use sproochmaschinn::VoiceModel;

use super::{
    DEFAULT_TTS_OUTPUT, cancel_on_ctrl_c, create_client, format_bytes, print_success,
    print_verbose, write_audio,
};
use crate::Cli;

/// Synthesize Luxembourgish speech into a WAV file.
#[derive(Args)]
pub struct TtsCommand {
    /// Text to synthesize
    #[arg(short = 't', long)]
    text: String,
    /// Voice model (default: context default_voice, then "claude")
    #[arg(short = 'V', long)]
    voice: Option<String>,
}

impl TtsCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (client, ctx) = create_client(cli)?;

        let model = match (&self.voice, ctx.default_voice.as_str()) {
            (Some(voice), _) => Some(VoiceModel::new(voice.as_str())),
            (None, "") => None,
            (None, voice) => Some(VoiceModel::new(voice)),
        };
        let output = cli.output.as_deref().unwrap_or(DEFAULT_TTS_OUTPUT);

        print_verbose(cli, &format!("Text: {} chars", self.text.chars().count()));
        print_verbose(
            cli,
            &format!("Voice: {}", model.clone().unwrap_or_default()),
        );

        let cancel = cancel_on_ctrl_c();
        let result = client
            .submit_speech_with_cancel(&self.text, model, &cancel)
            .await;
        client.teardown();
        let audio = result?;

        write_audio(output, &audio.data)?;
        print_success(&format!(
            "Audio saved to {} ({})",
            output,
            format_bytes(audio.len())
        ));
        Ok(())
    }
}
