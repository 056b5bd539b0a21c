//! Cache worker: lifecycle, routing and offline sync
//!
//! A `CacheWorker` is one instance of the worker for one manifest version.
//! The hosting runtime delivers typed [`Event`]s and awaits the outcome:
//!
//! | Event | Handler |
//! |-------|---------|
//! | `Install` | stage the core shell ([`UpgradeCoordinator::stage`]) |
//! | `Activate` | promote staging into live ([`UpgradeCoordinator::activate`]) |
//! | `Fetch(request)` | route through the live partition ([`RequestRouter`]) |
//! | `Message(command)` | `skipWaiting` or `downloadOffline` ([`OfflineSync`]) |
//!
//! Activation holds the write side of the lifecycle lock for its whole run;
//! routing and offline sync hold the read side while touching live. A
//! request never observes a half-migrated live partition.

mod host;
mod router;
mod state;
mod sync;
mod upgrade;

pub use host::{LocalHost, RuntimeHost};
pub use router::{FetchDisposition, RequestRouter, ResponseSource, Route};
pub use state::{LifecycleState, Transition};
pub use sync::{OfflineSync, SyncReport};
pub use upgrade::{ActivationReport, UpgradeCoordinator};

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::journal::Journal;
use crate::manifest::{ManifestRegistry, ResourceManifest};
use crate::network::{CacheMode, FetchRequest, Fetcher, Origin, Request};
use crate::store::{CacheStorage, CachedResponse, PartitionNames};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default number of fetches in flight during batch downloads
const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Collaborators shared by the worker components
pub(crate) struct WorkerContext {
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub registry: Arc<ManifestRegistry>,
    pub partitions: PartitionNames,
    pub origin: Origin,
    pub max_concurrent_fetches: usize,
}

impl WorkerContext {
    /// Fetch a set of keys, requiring a success status for each
    ///
    /// Stops at the first failure. Results come back in completion order.
    pub async fn fetch_all(
        &self,
        keys: &[String],
        mode: CacheMode,
    ) -> ShellCacheResult<Vec<(String, CachedResponse)>> {
        let requests: Vec<FetchRequest> = keys
            .iter()
            .map(|key| FetchRequest::for_key(&self.origin, key, mode))
            .collect();

        stream::iter(requests)
            .map(|request| async move {
                let response = self.fetcher.fetch(&request).await?;
                if !response.is_ok() {
                    return Err(ShellCacheError::FetchStatus {
                        key: request.key,
                        status: response.status,
                    });
                }
                Ok::<_, ShellCacheError>((request.key, response))
            })
            .buffer_unordered(self.max_concurrent_fetches.max(1))
            .try_collect()
            .await
    }
}

/// Commands delivered through the message channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Supersede any running instance immediately
    SkipWaiting,
    /// Download every manifest resource for offline use
    DownloadOffline,
}

impl FromStr for Command {
    type Err = ShellCacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skipWaiting" => Ok(Self::SkipWaiting),
            "downloadOffline" => Ok(Self::DownloadOffline),
            other => Err(ShellCacheError::UnknownCommand(other.to_string())),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SkipWaiting => write!(f, "skipWaiting"),
            Self::DownloadOffline => write!(f, "downloadOffline"),
        }
    }
}

/// Lifecycle and fetch events from the hosting runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Install,
    Activate,
    Fetch(Request),
    Message(Command),
}

/// Result of handling an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Installed { staged: usize },
    Activated(ActivationReport),
    Fetched(FetchDisposition),
    Synced(SyncReport),
    Acknowledged,
}

/// Entry count of one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionStatus {
    pub name: String,
    /// `None` when the partition does not exist
    pub entries: Option<usize>,
}

/// Snapshot of the worker and its partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerStatus {
    pub id: Uuid,
    pub state: LifecycleState,
    pub origin: String,
    pub staging: PartitionStatus,
    pub live: PartitionStatus,
    pub manifest: PartitionStatus,
    /// Whether the recorded manifest is this worker's manifest
    pub manifest_current: bool,
    /// Resources listed in the manifest
    pub resources: usize,
    /// Manifest resources present in live
    pub cached: usize,
    pub core_shell: usize,
}

/// Builder for [`CacheWorker`]
pub struct WorkerBuilder {
    registry: ManifestRegistry,
    origin: Origin,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    partitions: PartitionNames,
    host: Arc<dyn RuntimeHost>,
    journal: Journal,
    max_concurrent_fetches: usize,
}

impl WorkerBuilder {
    pub fn partitions(mut self, partitions: PartitionNames) -> Self {
        self.partitions = partitions;
        self
    }

    pub fn host(mut self, host: Arc<dyn RuntimeHost>) -> Self {
        self.host = host;
        self
    }

    pub fn journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    pub fn build(self) -> CacheWorker {
        let ctx = Arc::new(WorkerContext {
            storage: self.storage,
            fetcher: self.fetcher,
            registry: Arc::new(self.registry),
            partitions: self.partitions,
            origin: self.origin,
            max_concurrent_fetches: self.max_concurrent_fetches,
        });

        CacheWorker {
            id: Uuid::new_v4(),
            state: RwLock::new(LifecycleState::Idle),
            upgrade: UpgradeCoordinator::new(ctx.clone()),
            router: RequestRouter::new(ctx.clone()),
            sync: OfflineSync::new(ctx.clone()),
            host: self.host,
            journal: self.journal,
            ctx,
        }
    }
}

/// One worker instance serving one manifest version
pub struct CacheWorker {
    id: Uuid,
    ctx: Arc<WorkerContext>,
    state: RwLock<LifecycleState>,
    upgrade: UpgradeCoordinator,
    router: RequestRouter,
    sync: OfflineSync,
    host: Arc<dyn RuntimeHost>,
    journal: Journal,
}

impl CacheWorker {
    /// Start building a worker; defaults to the standard partition names, a
    /// `LocalHost` and no journal
    pub fn builder(
        registry: ManifestRegistry,
        origin: Origin,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> WorkerBuilder {
        WorkerBuilder {
            registry,
            origin,
            storage,
            fetcher,
            partitions: PartitionNames::default(),
            host: Arc::new(LocalHost::new()),
            journal: Journal::disabled(),
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
        }
    }

    /// Instance id, distinct for every worker built
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn state(&self) -> LifecycleState {
        *self.state.read().await
    }

    pub fn registry(&self) -> &ManifestRegistry {
        &self.ctx.registry
    }

    /// Dispatch an event to its handler
    pub async fn handle(&self, event: Event) -> ShellCacheResult<EventOutcome> {
        match event {
            Event::Install => Ok(EventOutcome::Installed {
                staged: self.install().await?,
            }),
            Event::Activate => Ok(EventOutcome::Activated(self.activate().await?)),
            Event::Fetch(request) => Ok(EventOutcome::Fetched(self.fetch(&request).await?)),
            Event::Message(command) => self.message(command).await,
        }
    }

    /// Restore the lifecycle state of a fresh instance from the store
    ///
    /// `Live` if the recorded manifest is this worker's manifest, `Installed`
    /// if staging holds the whole core shell staged for this manifest, `Idle`
    /// otherwise. Only applies to an `Idle` worker; any other state is
    /// returned unchanged.
    pub async fn recover(&self) -> ShellCacheResult<LifecycleState> {
        let mut state = self.state.write().await;
        if *state != LifecycleState::Idle {
            return Ok(*state);
        }

        let names = &self.ctx.partitions;
        let existing = self.ctx.storage.partition_names().await?;

        let recovered = if existing.contains(&names.manifest) && self.manifest_is_current().await?
        {
            LifecycleState::Live
        } else if existing.contains(&names.staging) {
            let staging = self.ctx.storage.open(&names.staging).await?;
            if self.upgrade.missing_core(&*staging).await?.is_none()
                && self.upgrade.staged_for_current(&*staging).await?
            {
                LifecycleState::Installed
            } else {
                LifecycleState::Idle
            }
        } else {
            LifecycleState::Idle
        };

        debug!("Recovered worker {} as {}", self.id, recovered);
        *state = recovered;
        Ok(recovered)
    }

    /// Install: stage the core shell
    ///
    /// A `Live` worker keeps serving while it re-stages, and stays `Live` if
    /// staging fails.
    pub async fn install(&self) -> ShellCacheResult<usize> {
        self.transition(Transition::Install).await?;
        self.host.skip_waiting();

        match self.upgrade.stage().await {
            Ok(staged) => {
                self.transition(Transition::StagingComplete).await?;
                self.journal
                    .record(
                        "install.staged",
                        &serde_json::json!({ "worker": self.id, "staged": staged }),
                    )
                    .await;
                Ok(staged)
            }
            Err(err) => {
                self.transition(Transition::StagingFailed).await?;
                self.journal
                    .record(
                        "install.failed",
                        &serde_json::json!({ "worker": self.id, "error": err.to_string() }),
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Activate: promote staging into live
    pub async fn activate(&self) -> ShellCacheResult<ActivationReport> {
        let mut state = self.state.write().await;
        *state = state.next(Transition::Activate)?;

        match self.upgrade.activate().await {
            Ok(report) => {
                *state = state.next(Transition::ActivationComplete)?;
                self.host.claim_clients();
                self.journal
                    .record(
                        "activate.completed",
                        &serde_json::json!({ "worker": self.id, "report": report }),
                    )
                    .await;
                Ok(report)
            }
            Err(err) => {
                *state = state.next(Transition::ActivationFailed)?;
                self.journal
                    .record(
                        "activate.failed",
                        &serde_json::json!({ "worker": self.id, "error": err.to_string() }),
                    )
                    .await;
                Err(err)
            }
        }
    }

    /// Route a request. Anything not served from the live partition is
    /// bypassed, including every request while the worker is not serving.
    pub async fn fetch(&self, request: &Request) -> ShellCacheResult<FetchDisposition> {
        if !request.method.is_cacheable() {
            return Ok(FetchDisposition::Bypass);
        }

        let state = self.state.read().await;
        if !state.is_serving() {
            debug!("Worker is {}, bypassing {}", *state, request.url);
            return Ok(FetchDisposition::Bypass);
        }
        self.router.route(request).await
    }

    /// Handle a message command
    pub async fn message(&self, command: Command) -> ShellCacheResult<EventOutcome> {
        match command {
            Command::SkipWaiting => {
                self.host.skip_waiting();
                Ok(EventOutcome::Acknowledged)
            }
            Command::DownloadOffline => Ok(EventOutcome::Synced(self.download_offline().await?)),
        }
    }

    /// Fetch every manifest resource missing from live
    pub async fn download_offline(&self) -> ShellCacheResult<SyncReport> {
        let state = self.state.read().await;
        if !state.is_serving() {
            return Err(ShellCacheError::NotActive);
        }

        let report = self.sync.run().await?;
        self.journal
            .record(
                "sync.completed",
                &serde_json::json!({ "worker": self.id, "fetched": report.fetched.len() }),
            )
            .await;
        Ok(report)
    }

    /// Delete every partition and return to `Idle`
    pub async fn clear(&self) -> ShellCacheResult<()> {
        let mut state = self.state.write().await;
        if state.is_busy() {
            return Err(ShellCacheError::InvalidTransition {
                state: state.to_string(),
                event: "clear".to_string(),
            });
        }

        self.upgrade.teardown().await?;
        *state = LifecycleState::Idle;
        info!("Cleared all partitions");
        self.journal
            .record("teardown", &serde_json::json!({ "worker": self.id }))
            .await;
        Ok(())
    }

    /// Snapshot of the worker and store, without creating partitions
    pub async fn status(&self) -> ShellCacheResult<WorkerStatus> {
        let state = self.state.read().await;
        let names = &self.ctx.partitions;
        let existing = self.ctx.storage.partition_names().await?;

        let mut live_keys = HashSet::new();
        if existing.contains(&names.live) {
            let live = self.ctx.storage.open(&names.live).await?;
            for key in live.keys().await? {
                live_keys.insert(self.ctx.origin.stored_key(&key));
            }
        }
        let cached = self
            .ctx
            .registry
            .keys()
            .filter(|key| live_keys.contains(*key))
            .count();

        let manifest_current =
            existing.contains(&names.manifest) && self.manifest_is_current().await?;

        let staged = if existing.contains(&names.staging) {
            let staging = self.ctx.storage.open(&names.staging).await?;
            Some(upgrade::staged_keys(&*staging).await?.len())
        } else {
            None
        };

        Ok(WorkerStatus {
            id: self.id,
            state: *state,
            origin: self.ctx.origin.to_string(),
            staging: PartitionStatus {
                name: names.staging.clone(),
                entries: staged,
            },
            live: PartitionStatus {
                name: names.live.clone(),
                entries: existing.contains(&names.live).then_some(live_keys.len()),
            },
            manifest: self.partition_status(&existing, &names.manifest).await?,
            manifest_current,
            resources: self.ctx.registry.len(),
            cached,
            core_shell: self.ctx.registry.core_shell().len(),
        })
    }

    async fn partition_status(
        &self,
        existing: &[String],
        name: &str,
    ) -> ShellCacheResult<PartitionStatus> {
        let entries = if existing.iter().any(|n| n == name) {
            Some(self.ctx.storage.open(name).await?.keys().await?.len())
        } else {
            None
        };
        Ok(PartitionStatus {
            name: name.to_string(),
            entries,
        })
    }

    async fn manifest_is_current(&self) -> ShellCacheResult<bool> {
        let previous: Option<ResourceManifest> = match self.upgrade.previous_manifest().await {
            Ok(previous) => previous,
            Err(ShellCacheError::Json(e)) => {
                warn!("Ignoring unreadable manifest record: {}", e);
                None
            }
            Err(e) => return Err(e),
        };
        Ok(previous.as_ref() == Some(self.ctx.registry.manifest()))
    }

    async fn transition(&self, transition: Transition) -> ShellCacheResult<LifecycleState> {
        let mut state = self.state.write().await;
        *state = state.next(transition)?;
        Ok(*state)
    }
}
