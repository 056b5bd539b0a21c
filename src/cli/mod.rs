//! Command-line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::config::Config;

impl Cli {
    /// Apply global flag overrides on top of the loaded configuration
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref path) = self.manifest {
            config.manifest.path = Some(path.clone());
        }
        if let Some(ref url) = self.origin {
            config.origin.url = url.clone();
        }
        if let Some(ref root) = self.store {
            config.store.root = Some(root.clone());
        }
    }
}
