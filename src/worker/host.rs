//! Signals sent back to the hosting runtime

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Hosting runtime interface
///
/// The runtime decides when worker versions swap. The worker only asks it to
/// activate without waiting for older instances, and to route already open
/// sessions through the newly activated version.
pub trait RuntimeHost: Send + Sync {
    /// Supersede any running instance immediately
    fn skip_waiting(&self);

    /// Take control of already open sessions
    fn claim_clients(&self);
}

/// Host that records the signals it receives
#[derive(Debug, Default)]
pub struct LocalHost {
    skip_waiting: AtomicBool,
    claimed: AtomicBool,
}

impl LocalHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `skip_waiting` was requested
    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Whether `claim_clients` was requested
    pub fn clients_claimed(&self) -> bool {
        self.claimed.load(Ordering::SeqCst)
    }
}

impl RuntimeHost for LocalHost {
    fn skip_waiting(&self) {
        debug!("Skip waiting requested");
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    fn claim_clients(&self) {
        debug!("Claiming clients");
        self.claimed.store(true, Ordering::SeqCst);
    }
}
