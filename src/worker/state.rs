//! Worker lifecycle state machine

use crate::error::{ShellCacheError, ShellCacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a worker instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    /// Nothing staged for this version
    Idle,
    /// Fetching core shell resources into staging
    Staging,
    /// Re-staging while the live partition keeps serving
    Restaging,
    /// Staging complete, waiting for activation
    Installed,
    /// Promoting staging into the live partition
    Activating,
    /// Serving requests from the live partition
    Live,
    /// Activation failed and every partition was torn down
    Failed,
}

/// Events that move the lifecycle forward
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Install,
    StagingComplete,
    StagingFailed,
    Activate,
    ActivationComplete,
    ActivationFailed,
}

impl LifecycleState {
    /// Apply a transition, rejecting anything outside the table
    ///
    /// | From | Transition | To |
    /// |------|------------|----|
    /// | Idle, Installed, Failed | Install | Staging |
    /// | Live | Install | Restaging |
    /// | Staging, Restaging | StagingComplete | Installed |
    /// | Staging | StagingFailed | Idle |
    /// | Restaging | StagingFailed | Live |
    /// | Installed | Activate | Activating |
    /// | Activating | ActivationComplete | Live |
    /// | Activating | ActivationFailed | Failed |
    pub fn next(self, transition: Transition) -> ShellCacheResult<Self> {
        use LifecycleState::*;
        use Transition::*;

        let next = match (self, transition) {
            (Idle | Installed | Failed, Install) => Staging,
            (Live, Install) => Restaging,
            (Staging | Restaging, StagingComplete) => Installed,
            (Staging, StagingFailed) => Idle,
            (Restaging, StagingFailed) => Live,
            (Installed, Activate) => Activating,
            (Activating, ActivationComplete) => Live,
            (Activating, ActivationFailed) => Failed,
            (state, transition) => {
                return Err(ShellCacheError::InvalidTransition {
                    state: state.to_string(),
                    event: transition.to_string(),
                })
            }
        };
        Ok(next)
    }

    /// Whether requests may be served from the live partition
    pub fn is_serving(&self) -> bool {
        matches!(self, Self::Live | Self::Restaging)
    }

    /// Whether an install or activation is in progress
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Staging | Self::Restaging | Self::Activating)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Staging => "staging",
            Self::Restaging => "restaging",
            Self::Installed => "installed",
            Self::Activating => "activating",
            Self::Live => "live",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Install => "install",
            Self::StagingComplete => "staging complete",
            Self::StagingFailed => "staging failed",
            Self::Activate => "activate",
            Self::ActivationComplete => "activation complete",
            Self::ActivationFailed => "activation failed",
        };
        write!(f, "{}", name)
    }
}
