//! shellcache - offline cache manager for web application shells
//!
//! Keeps a versioned application shell available offline. A build-time
//! resource manifest drives a two-phase upgrade: install stages the core
//! shell, activate promotes it into the live cache and evicts what changed.
//! Requests are then served from the live cache, online-first for the root
//! document and cache-first for everything else.

pub mod cli;
pub mod config;
pub mod error;
pub mod journal;
pub mod manifest;
pub mod network;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{ShellCacheError, ShellCacheResult};
pub use manifest::{ManifestRegistry, ResourceManifest};
pub use network::{Fetcher, HttpFetcher, Origin, Request};
pub use store::{CacheStorage, CachedResponse, DiskStore, MemoryStore, Partition};
pub use worker::{CacheWorker, Command, Event, EventOutcome, LifecycleState};
