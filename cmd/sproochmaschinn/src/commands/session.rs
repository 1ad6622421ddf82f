//! Session commands.

use clap::{Args, Subcommand};
use serde::Serialize;

use super::{create_client, output_result, print_success, print_verbose};
use crate::Cli;

/// Session management.
#[derive(Args)]
pub struct SessionCommand {
    #[command(subcommand)]
    command: SessionSubcommand,
}

#[derive(Subcommand)]
enum SessionSubcommand {
    /// Create a session and print its id
    Create,
}

#[derive(Serialize)]
struct SessionInfo {
    session_id: String,
    status: String,
    base_url: String,
}

impl SessionCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            SessionSubcommand::Create => {
                let (client, _ctx) = create_client(cli)?;
                let verbose = cli.verbose;

                let session_id = client
                    .initialize(move |status| {
                        if verbose {
                            eprintln!("[verbose] Session: {}", status.label());
                        }
                    })
                    .await?;
                print_success(&format!("Session created: {}", session_id));
                print_verbose(cli, "Sessions expire after ~10 minutes of inactivity");

                output_result(
                    cli,
                    &SessionInfo {
                        session_id,
                        status: client.status().to_string(),
                        base_url: client.base_url().to_string(),
                    },
                )?;

                client.teardown();
                Ok(())
            }
        }
    }
}
