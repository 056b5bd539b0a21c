//! Clear command - delete every partition

use super::build_worker;
use crate::cli::args::ClearArgs;
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, UiContext};

/// Execute the clear command
pub async fn execute(args: ClearArgs, config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect().with_auto_yes(args.yes);
    let worker = build_worker(config).await?;

    let confirmed = ui::confirm(
        &ctx,
        "Delete the live, staging and manifest partitions?",
        false,
    )
    .await?;
    if !confirmed {
        ui::step_warn_hint(&ctx, "Nothing deleted", "Use --yes to skip the prompt");
        return Ok(());
    }

    worker.clear().await?;
    ui::step_ok(&ctx, "Cache cleared");
    Ok(())
}
