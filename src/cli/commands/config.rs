//! Config command - show or edit configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::config::{Config, ConfigManager};
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::ui::{self, UiContext};
use std::path::PathBuf;

/// Keys accepted by `config set`
const VALID_KEYS: &[&str] = &[
    "general.verbose",
    "general.log_format",
    "general.journal",
    "origin.url",
    "manifest.path",
    "store.root",
    "store.staging",
    "store.live",
    "store.manifest",
    "store.manifest_key",
    "network.timeout_secs",
    "network.max_concurrent_fetches",
    "network.user_agent",
];

/// Execute the config command
pub async fn execute(
    args: ConfigArgs,
    manager: &ConfigManager,
    config: &Config,
) -> ShellCacheResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(config)?,
        Some(ConfigAction::Path) => println!("{}", manager.path().display()),
        Some(ConfigAction::Init { force }) => init_config(manager, force).await?,
        Some(ConfigAction::Set { key, value }) => {
            let ctx = UiContext::detect();
            let mut updated = config.clone();
            if let Err(e) = set_value(&mut updated, &key, &value) {
                ui::step_error_detail(&ctx, "Unknown config key", &key);
                ui::remark(&ctx, "Valid keys:");
                for key in VALID_KEYS {
                    eprintln!("  {}", key);
                }
                return Err(e);
            }
            manager.save(&updated).await?;
            ui::step_ok(&ctx, &format!("Set {} = {}", key, value));
        }
    }

    Ok(())
}

fn show_config(config: &Config) -> ShellCacheResult<()> {
    println!("{}", toml::to_string_pretty(config)?);
    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> ShellCacheResult<()> {
    let ctx = UiContext::detect();
    let path = manager.path();

    if path.exists() && !force {
        ui::step_warn_hint(
            &ctx,
            &format!("Config already exists at {}", path.display()),
            "Use --force to overwrite",
        );
        return Ok(());
    }

    manager.save(&Config::default()).await?;
    ui::step_ok_detail(&ctx, "Configuration initialized", &path.display().to_string());
    Ok(())
}

/// Apply a dot-separated key to the configuration
fn set_value(config: &mut Config, key: &str, value: &str) -> ShellCacheResult<()> {
    let parts: Vec<&str> = key.split('.').collect();

    match parts.as_slice() {
        ["general", "verbose"] => config.general.verbose = parse_bool(value)?,
        ["general", "log_format"] => config.general.log_format = parse_log_format(value)?,
        ["general", "journal"] => config.general.journal = parse_bool(value)?,

        ["origin", "url"] => config.origin.url = value.to_string(),
        ["manifest", "path"] => config.manifest.path = Some(PathBuf::from(value)),

        ["store", "root"] => config.store.root = Some(PathBuf::from(value)),
        ["store", "staging"] => config.store.staging = value.to_string(),
        ["store", "live"] => config.store.live = value.to_string(),
        ["store", "manifest"] => config.store.manifest = value.to_string(),
        ["store", "manifest_key"] => config.store.manifest_key = value.to_string(),

        ["network", "timeout_secs"] => config.network.timeout_secs = parse_number(value)?,
        ["network", "max_concurrent_fetches"] => {
            config.network.max_concurrent_fetches = parse_number(value)?
        }
        ["network", "user_agent"] => config.network.user_agent = value.to_string(),

        _ => return Err(ShellCacheError::User(format!("Unknown config key: {}", key))),
    }

    Ok(())
}

fn parse_bool(value: &str) -> ShellCacheResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ShellCacheError::User(format!(
            "Invalid boolean value: {}. Use true/false",
            value
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(value: &str) -> ShellCacheResult<T> {
    value
        .parse()
        .map_err(|_| ShellCacheError::User(format!("Invalid number: {}", value)))
}

fn parse_log_format(value: &str) -> ShellCacheResult<String> {
    match value {
        "text" | "json" => Ok(value.to_string()),
        _ => Err(ShellCacheError::User(format!(
            "Invalid log format: {}. Use text or json",
            value
        ))),
    }
}
