//! Terminal output for the CLI
//!
//! Uses `cliclack` for spinners, prompts and styled log lines in an
//! interactive terminal, and falls back to plain `[OK]` / `[WARN]` /
//! `[FAIL]` lines when output is piped or running in CI.

mod context;
mod output;
mod progress;
mod prompts;
mod theme;

pub use context::UiContext;
pub use output::{
    intro, key_value, key_value_status, outro_success, remark, section, step_error_detail,
    step_info, step_ok, step_ok_detail, step_warn_hint,
};
pub use progress::TaskSpinner;
pub use prompts::confirm;
pub use theme::{init_theme, ShellCacheTheme};
