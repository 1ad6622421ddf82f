//! Live channel listener.

use std::time::Duration;

use clap::Args;
use tracing::warn;

use super::{cancel_on_ctrl_c, create_client, print_success};
use crate::Cli;

/// Keep a session open and print live channel messages as JSON lines.
#[derive(Args)]
pub struct ListenCommand {
    /// Stop after this many seconds (default: until Ctrl-C)
    #[arg(long)]
    seconds: Option<u64>,
}

impl ListenCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let (client, _ctx) = create_client(cli)?;
        if !client.session().config().live_channel {
            anyhow::bail!("live channel is disabled in this context");
        }

        client.session().set_message_handler(|msg| {
            match serde_json::to_string(msg.value()) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!("cannot print live channel message: {}", e),
            }
        });

        let session_id = client
            .initialize(|status| eprintln!("Session: {}", status.label()))
            .await?;
        print_success(&format!("Listening on session {}", session_id));

        let cancel = cancel_on_ctrl_c();
        match self.seconds {
            Some(secs) => {
                tokio::select! {
                    _ = cancel.cancelled() => {}
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                }
            }
            None => cancel.cancelled().await,
        }

        client.session().clear_message_handler();
        client.teardown();
        Ok(())
    }
}
