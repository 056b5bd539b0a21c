//! Status command - lifecycle state and cache coverage

use super::build_worker;
use crate::cli::args::{OutputFormat, StatusArgs};
use crate::config::Config;
use crate::error::ShellCacheResult;
use crate::ui::{self, UiContext};
use crate::worker::{PartitionStatus, WorkerStatus};

/// Execute the status command
pub async fn execute(args: StatusArgs, config: &Config) -> ShellCacheResult<()> {
    let worker = build_worker(config).await?;
    let status = worker.status().await?;

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&status)?),
        OutputFormat::Table => print_table(&UiContext::detect(), &status),
    }
    Ok(())
}

fn print_table(ctx: &UiContext, status: &WorkerStatus) {
    ui::section(ctx, "Worker");
    ui::key_value_status(ctx, "State", &status.state.to_string(), status.state.is_serving());
    ui::key_value(ctx, "Origin", &status.origin);
    ui::key_value_status(
        ctx,
        "Manifest",
        if status.manifest_current {
            "current"
        } else {
            "not activated"
        },
        status.manifest_current,
    );

    ui::section(ctx, "Partitions");
    for partition in [&status.live, &status.staging, &status.manifest] {
        ui::key_value(ctx, &partition.name, &describe(partition));
    }

    ui::section(ctx, "Coverage");
    ui::key_value_status(
        ctx,
        "Cached",
        &format!("{} / {}", status.cached, status.resources),
        status.cached == status.resources,
    );
    ui::key_value(ctx, "Core shell", &status.core_shell.to_string());
}

fn describe(partition: &PartitionStatus) -> String {
    match partition.entries {
        Some(1) => "1 entry".to_string(),
        Some(n) => format!("{} entries", n),
        None => "absent".to_string(),
    }
}
