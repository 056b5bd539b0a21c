//! Install, activate and upgrade commands

use super::build_worker;
use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::ui::{self, TaskSpinner, UiContext};
use crate::worker::{ActivationReport, CacheWorker};

/// Execute the install command
pub async fn install(config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let worker = build_worker(config).await?;
    stage(&ctx, &worker).await?;
    ui::remark(&ctx, "Run: shellcache activate");
    Ok(())
}

/// Execute the activate command
pub async fn activate(config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let worker = build_worker(config).await?;
    promote(&ctx, &worker).await
}

/// Execute the upgrade command
pub async fn upgrade(config: &Config) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let worker = build_worker(config).await?;

    ui::intro(&ctx, "shellcache upgrade");
    stage(&ctx, &worker).await?;
    promote(&ctx, &worker).await?;
    ui::outro_success(&ctx, "Application shell is live");
    Ok(())
}

async fn stage(ctx: &UiContext, worker: &CacheWorker) -> ShellCacheResult<usize> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start(&format!(
        "Staging {} core shell resources...",
        worker.registry().core_shell().len()
    ));

    match worker.install().await {
        Ok(staged) => {
            spinner.stop(&format!("Staged {} resources", staged));
            Ok(staged)
        }
        Err(e) => {
            spinner.stop_error("Staging failed");
            Err(e)
        }
    }
}

async fn promote(ctx: &UiContext, worker: &CacheWorker) -> ShellCacheResult<()> {
    let mut spinner = TaskSpinner::new(ctx);
    spinner.start("Activating...");

    match worker.activate().await {
        Ok(report) => {
            spinner.stop("Activated");
            print_report(ctx, &report);
            Ok(())
        }
        Err(e @ ShellCacheError::ActivationFailed { .. }) => {
            spinner.stop_error("Activation failed, cache cleared");
            Err(e)
        }
        Err(e) => {
            spinner.stop_error("Activation not started");
            Err(e)
        }
    }
}

fn print_report(ctx: &UiContext, report: &ActivationReport) {
    if report.cold_start {
        ui::step_info(ctx, "No previous version, live cache rebuilt");
    }
    ui::key_value(ctx, "Promoted", &report.promoted.to_string());
    ui::key_value(ctx, "Retained", &report.retained.to_string());
    ui::key_value(ctx, "Evicted", &report.evicted.len().to_string());
    for key in &report.evicted {
        ui::remark(ctx, &format!("- {}", key));
    }
}
