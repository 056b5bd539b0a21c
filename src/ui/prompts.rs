//! Confirmation prompt with non-interactive fallback

use super::context::UiContext;
use crate::error::{ShellCacheError, ShellCacheResult};

/// Ask for confirmation
///
/// Returns true under `--yes`, and `default` when not interactive.
pub async fn confirm(ctx: &UiContext, message: &str, default: bool) -> ShellCacheResult<bool> {
    if ctx.auto_yes() {
        return Ok(true);
    }
    if !ctx.is_interactive() {
        return Ok(default);
    }

    // cliclack blocks on stdin
    let message = message.to_string();
    tokio::task::spawn_blocking(move || {
        cliclack::confirm(&message)
            .initial_value(default)
            .interact()
    })
    .await
    .map_err(|e| ShellCacheError::Internal(format!("Prompt task failed: {}", e)))?
    .map_err(|e| ShellCacheError::User(format!("Prompt failed: {}", e)))
}
