//! Message command - deliver a command to the worker

use super::build_worker;
use crate::cli::args::{MessageArgs, MessageCommand};
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{Command, EventOutcome};

impl From<MessageCommand> for Command {
    fn from(command: MessageCommand) -> Self {
        match command {
            MessageCommand::SkipWaiting => Command::SkipWaiting,
            MessageCommand::DownloadOffline => Command::DownloadOffline,
        }
    }
}

/// Execute the message command
pub async fn execute(args: MessageArgs, config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let worker = build_worker(config).await?;
    let command = Command::from(args.command);

    let mut spinner = TaskSpinner::new(&ctx);
    spinner.start(&format!("Sending {}...", command));

    match worker.message(command).await {
        Ok(EventOutcome::Synced(report)) => {
            if report.fetched.is_empty() {
                spinner.stop("Offline cache already complete");
            } else {
                spinner.stop(&format!(
                    "Downloaded {} resources for offline use",
                    report.fetched.len()
                ));
            }
        }
        Ok(_) => spinner.stop(&format!("{} acknowledged", command)),
        Err(e) => {
            spinner.stop_error(&format!("{} failed", command));
            return Err(e);
        }
    }

    ui::step_ok(&ctx, &format!("Worker {} is {}", worker.id(), worker.state().await));
    Ok(())
}
