//! Lifecycle tests driving the worker through the library API

use async_trait::async_trait;
use shellcache::error::{ShellCacheError, ShellCacheResult};
use shellcache::network::{CacheMode, FetchRequest, Fetcher, Method, Origin, Request};
use shellcache::store::{CacheStorage, CachedResponse, DiskStore, MemoryStore, Partition};
use shellcache::worker::{
    CacheWorker, Command, Event, EventOutcome, FetchDisposition, LifecycleState, LocalHost,
    ResponseSource,
};
use shellcache::ManifestRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

const ORIGIN: &str = "https://app.example.com";

/// Origin double: serves `<version>:<key>`, counts requests per key
#[derive(Clone, Default)]
struct Network {
    version: Arc<Mutex<String>>,
    offline: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl Network {
    fn serving(version: &str) -> Self {
        let network = Self::default();
        network.publish(version);
        network
    }

    fn publish(&self, version: &str) {
        *self.version.lock().unwrap() = version.to_string();
    }

    fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn hits(&self, key: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.key == key)
            .count()
    }

    fn modes(&self) -> Vec<CacheMode> {
        self.requests.lock().unwrap().iter().map(|r| r.mode).collect()
    }

    fn reset(&self) {
        self.requests.lock().unwrap().clear();
    }
}

#[async_trait]
impl Fetcher for Network {
    async fn fetch(&self, request: &FetchRequest) -> ShellCacheResult<CachedResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if self.offline.load(Ordering::SeqCst) {
            return Err(ShellCacheError::fetch(&request.url, "network unreachable"));
        }
        let version = self.version.lock().unwrap().clone();
        Ok(CachedResponse::new(200, format!("{}:{}", version, request.key)))
    }
}

/// Storage wrapper that fails writes into one partition while armed
#[derive(Clone)]
struct FaultyStorage {
    inner: MemoryStore,
    fail_puts_into: Arc<Mutex<Option<String>>>,
}

impl FaultyStorage {
    fn new(inner: MemoryStore) -> Self {
        Self {
            inner,
            fail_puts_into: Arc::default(),
        }
    }

    fn fail_puts_into(&self, partition: Option<&str>) {
        *self.fail_puts_into.lock().unwrap() = partition.map(str::to_string);
    }
}

#[async_trait]
impl CacheStorage for FaultyStorage {
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn Partition>> {
        let inner = self.inner.open(name).await?;
        Ok(Arc::new(FaultyPartition {
            inner,
            fail_puts_into: self.fail_puts_into.clone(),
        }))
    }

    async fn delete_partition(&self, name: &str) -> ShellCacheResult<bool> {
        self.inner.delete_partition(name).await
    }

    async fn partition_names(&self) -> ShellCacheResult<Vec<String>> {
        self.inner.partition_names().await
    }
}

struct FaultyPartition {
    inner: Arc<dyn Partition>,
    fail_puts_into: Arc<Mutex<Option<String>>>,
}

#[async_trait]
impl Partition for FaultyPartition {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get(&self, key: &str) -> ShellCacheResult<Option<CachedResponse>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, response: CachedResponse) -> ShellCacheResult<()> {
        let armed = self.fail_puts_into.lock().unwrap().as_deref() == Some(self.name());
        if armed {
            return Err(ShellCacheError::store("put", self.name(), "quota exceeded"));
        }
        self.inner.put(key, response).await
    }

    async fn delete(&self, key: &str) -> ShellCacheResult<bool> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> ShellCacheResult<Vec<String>> {
        self.inner.keys().await
    }
}

fn manifest(main: &str, logo: &str) -> ManifestRegistry {
    ManifestRegistry::parse(&format!(
        r#"{{
            "resources": {{
                "/": "root1",
                "index.html": "root1",
                "main.js": "{}",
                "assets/logo.png": "{}",
                "assets/font.ttf": "font1"
            }},
            "core": ["index.html", "main.js"]
        }}"#,
        main, logo
    ))
    .unwrap()
}

fn worker(
    registry: ManifestRegistry,
    storage: Arc<dyn CacheStorage>,
    network: &Network,
    host: Arc<LocalHost>,
) -> CacheWorker {
    CacheWorker::builder(
        registry,
        Origin::parse(ORIGIN).unwrap(),
        storage,
        Arc::new(network.clone()),
    )
    .host(host)
    .build()
}

async fn upgrade(worker: &CacheWorker) {
    worker.handle(Event::Install).await.unwrap();
    worker.handle(Event::Activate).await.unwrap();
}

async fn get(worker: &CacheWorker, path: &str) -> FetchDisposition {
    worker
        .handle(Event::Fetch(Request::get(format!("{}{}", ORIGIN, path))))
        .await
        .map(|outcome| match outcome {
            EventOutcome::Fetched(disposition) => disposition,
            other => panic!("unexpected outcome {:?}", other),
        })
        .unwrap()
}

fn body(disposition: &FetchDisposition) -> String {
    String::from_utf8(disposition.response().unwrap().body.clone()).unwrap()
}

fn source(disposition: &FetchDisposition) -> ResponseSource {
    match disposition {
        FetchDisposition::Respond { source, .. } => *source,
        FetchDisposition::Bypass => panic!("request was bypassed"),
    }
}

/// Partition names, live entries and manifest record of a store
async fn snapshot(
    storage: &MemoryStore,
) -> (Vec<String>, Vec<(String, CachedResponse)>, Option<CachedResponse>) {
    let mut names = storage.partition_names().await.unwrap();
    names.sort();

    let live = storage.open("app-cache").await.unwrap();
    let mut entries = Vec::new();
    for key in live.keys().await.unwrap() {
        let response = live.get(&key).await.unwrap().unwrap();
        entries.push((key, response));
    }

    let record = storage
        .open("app-manifest")
        .await
        .unwrap()
        .get("manifest")
        .await
        .unwrap();
    (names, entries, record)
}

#[tokio::test]
async fn cold_start_installs_core_shell() {
    let storage = MemoryStore::new();
    let network = Network::serving("v1");
    let host = Arc::new(LocalHost::new());
    let worker = worker(manifest("m1", "l1"), Arc::new(storage.clone()), &network, host.clone());

    let outcome = worker.handle(Event::Install).await.unwrap();
    assert_eq!(outcome, EventOutcome::Installed { staged: 2 });
    assert!(network.modes().iter().all(|m| *m == CacheMode::Reload));
    assert!(host.skipped_waiting());
    assert!(!host.clients_claimed());

    let outcome = worker.handle(Event::Activate).await.unwrap();
    let EventOutcome::Activated(report) = outcome else {
        panic!("expected activation report");
    };
    assert!(report.cold_start);
    assert_eq!(report.promoted, 2);
    assert!(host.clients_claimed());

    let live = storage.open("app-cache").await.unwrap();
    assert_eq!(live.keys().await.unwrap(), vec!["index.html", "main.js"]);
    assert!(!storage
        .partition_names()
        .await
        .unwrap()
        .contains(&"app-temp-cache".to_string()));

    let record = storage
        .open("app-manifest")
        .await
        .unwrap()
        .get("manifest")
        .await
        .unwrap()
        .unwrap();
    let recorded: HashMap<String, String> = record.parse_json().unwrap();
    assert_eq!(recorded.get("main.js").map(String::as_str), Some("m1"));
    assert_eq!(recorded.len(), 5);
}

#[tokio::test]
async fn upgrade_evicts_only_changed_and_removed() {
    let storage = MemoryStore::new();
    let network = Network::serving("v1");
    let first = worker(
        manifest("m1", "l1"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&first).await;

    // Lazily fill the non-core resources under v1
    get(&first, "/assets/logo.png").await;
    get(&first, "/assets/font.ttf").await;

    network.publish("v2");
    let second = worker(
        manifest("m2", "l2"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    second.handle(Event::Install).await.unwrap();
    let EventOutcome::Activated(mut report) = second.handle(Event::Activate).await.unwrap() else {
        panic!("expected activation report");
    };
    report.evicted.sort();

    assert!(!report.cold_start);
    assert_eq!(report.evicted, vec!["assets/logo.png", "main.js"]);

    // Every surviving live entry is either unchanged or freshly staged
    let live = storage.open("app-cache").await.unwrap();
    for key in live.keys().await.unwrap() {
        let cached = live.get(&key).await.unwrap().unwrap();
        let text = String::from_utf8(cached.body).unwrap();
        match key.as_str() {
            "main.js" | "index.html" => assert_eq!(text, format!("v2:{}", key)),
            "assets/font.ttf" => assert_eq!(text, "v1:assets/font.ttf"),
            other => panic!("stale entry {} survived", other),
        }
    }

    // Evicted resource refills from the new version
    let logo = get(&second, "/assets/logo.png").await;
    assert_eq!(source(&logo), ResponseSource::Network);
    assert_eq!(body(&logo), "v2:assets/logo.png");
}

#[tokio::test]
async fn failed_activation_tears_down_then_cold_starts() {
    let memory = MemoryStore::new();
    let storage = FaultyStorage::new(memory.clone());
    let network = Network::serving("v1");

    let first = worker(
        manifest("m1", "l1"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&first).await;

    let host = Arc::new(LocalHost::new());
    let second = worker(
        manifest("m2", "l1"),
        Arc::new(storage.clone()),
        &network,
        host.clone(),
    );
    second.handle(Event::Install).await.unwrap();

    storage.fail_puts_into(Some("app-cache"));
    let err = second.handle(Event::Activate).await.unwrap_err();
    assert!(matches!(err, ShellCacheError::ActivationFailed { .. }));
    assert_eq!(second.state().await, LifecycleState::Failed);
    assert!(!host.clients_claimed());
    assert!(memory.partition_names().await.unwrap().is_empty());

    // Requests go to the network while failed
    assert_eq!(get(&second, "/main.js").await, FetchDisposition::Bypass);

    storage.fail_puts_into(None);
    second.handle(Event::Install).await.unwrap();
    let EventOutcome::Activated(report) = second.handle(Event::Activate).await.unwrap() else {
        panic!("expected activation report");
    };
    assert!(report.cold_start);
    assert_eq!(second.state().await, LifecycleState::Live);

    // Same end state as a first-ever cold start of this version
    let fresh = MemoryStore::new();
    let first_ever = worker(
        manifest("m2", "l1"),
        Arc::new(fresh.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&first_ever).await;
    assert_eq!(snapshot(&memory).await, snapshot(&fresh).await);
}

#[tokio::test]
async fn teardown_is_idempotent() {
    let storage = MemoryStore::new();
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&worker).await;

    worker.clear().await.unwrap();
    worker.clear().await.unwrap();
    assert!(storage.partition_names().await.unwrap().is_empty());
    assert_eq!(worker.state().await, LifecycleState::Idle);
}

#[tokio::test]
async fn staging_failure_returns_to_idle() {
    let storage = MemoryStore::new();
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );

    network.set_offline(true);
    assert!(worker.handle(Event::Install).await.is_err());
    assert_eq!(worker.state().await, LifecycleState::Idle);

    let err = worker.handle(Event::Activate).await.unwrap_err();
    assert!(matches!(err, ShellCacheError::InvalidTransition { .. }));
}

#[tokio::test]
async fn failed_restage_keeps_serving_live() {
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(MemoryStore::new()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&worker).await;

    network.set_offline(true);
    assert!(worker.handle(Event::Install).await.is_err());
    assert_eq!(worker.state().await, LifecycleState::Live);

    let main = get(&worker, "/main.js").await;
    assert_eq!(source(&main), ResponseSource::Cache);
    assert_eq!(body(&main), "v1:main.js");
}

#[tokio::test]
async fn staging_from_another_version_is_not_adopted() {
    let storage = MemoryStore::new();
    let network = Network::serving("v1");
    let first = worker(
        manifest("m1", "l1"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    first.handle(Event::Install).await.unwrap();
    drop(first);

    network.publish("v2");
    let second = worker(
        manifest("m2", "l1"),
        Arc::new(storage.clone()),
        &network,
        Arc::new(LocalHost::new()),
    );
    assert_eq!(second.recover().await.unwrap(), LifecycleState::Idle);
    let err = second.handle(Event::Activate).await.unwrap_err();
    assert!(matches!(err, ShellCacheError::InvalidTransition { .. }));

    upgrade(&second).await;
    assert_eq!(body(&get(&second, "/main.js").await), "v2:main.js");
    assert_eq!(body(&get(&second, "/index.html").await), "v2:index.html");
}

#[tokio::test]
async fn root_is_online_first_with_cache_fallback() {
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(MemoryStore::new()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&worker).await;

    // Never cached yet, offline: the fetch error surfaces
    network.set_offline(true);
    let err = worker
        .handle(Event::Fetch(Request::get(format!("{}/", ORIGIN))))
        .await
        .unwrap_err();
    assert!(matches!(err, ShellCacheError::Fetch { .. }));

    network.set_offline(false);
    let online = get(&worker, "/").await;
    assert_eq!(source(&online), ResponseSource::Network);

    network.publish("v1-hotfix");
    let online = get(&worker, "/#/settings").await;
    assert_eq!(body(&online), "v1-hotfix:/");

    network.set_offline(true);
    let offline = get(&worker, "").await;
    assert_eq!(source(&offline), ResponseSource::Cache);
    assert_eq!(body(&offline), "v1-hotfix:/");
}

#[tokio::test]
async fn cache_first_fills_once() {
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(MemoryStore::new()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&worker).await;
    network.reset();

    for _ in 0..3 {
        let response = get(&worker, "/assets/logo.png").await;
        assert_eq!(body(&response), "v1:assets/logo.png");
    }
    assert_eq!(network.hits("assets/logo.png"), 1);

    // Core shell is never refetched
    get(&worker, "/main.js").await;
    assert_eq!(network.hits("main.js"), 0);
}

#[tokio::test]
async fn version_query_shares_entry() {
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(MemoryStore::new()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&worker).await;
    network.reset();

    let first = get(&worker, "/assets/font.ttf?v=1").await;
    let second = get(&worker, "/assets/font.ttf?v=2").await;
    assert_eq!(source(&first), ResponseSource::Network);
    assert_eq!(source(&second), ResponseSource::Cache);
    assert_eq!(network.hits("assets/font.ttf"), 1);
}

#[tokio::test]
async fn bypassed_requests() {
    let network = Network::serving("v1");
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(MemoryStore::new()),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&worker).await;
    network.reset();

    let post = worker
        .fetch(&Request::new(Method::Post, format!("{}/main.js", ORIGIN)))
        .await
        .unwrap();
    assert_eq!(post, FetchDisposition::Bypass);
    assert_eq!(get(&worker, "/api/profile").await, FetchDisposition::Bypass);
    assert_eq!(
        worker
            .fetch(&Request::get("https://cdn.example.com/main.js"))
            .await
            .unwrap(),
        FetchDisposition::Bypass
    );
    assert!(network.modes().is_empty());
}

#[tokio::test]
async fn messages() {
    let network = Network::serving("v1");
    let host = Arc::new(LocalHost::new());
    let worker = worker(
        manifest("m1", "l1"),
        Arc::new(MemoryStore::new()),
        &network,
        host.clone(),
    );

    let command: Command = "skipWaiting".parse().unwrap();
    let outcome = worker.handle(Event::Message(command)).await.unwrap();
    assert_eq!(outcome, EventOutcome::Acknowledged);
    assert!(host.skipped_waiting());

    upgrade(&worker).await;
    let EventOutcome::Synced(report) = worker
        .handle(Event::Message(Command::DownloadOffline))
        .await
        .unwrap()
    else {
        panic!("expected sync report");
    };
    let mut fetched = report.fetched;
    fetched.sort();
    assert_eq!(fetched, vec!["/", "assets/font.ttf", "assets/logo.png"]);

    let status = worker.status().await.unwrap();
    assert_eq!(status.cached, status.resources);
}

#[tokio::test]
async fn recover_from_disk_and_serve_offline() {
    let dir = tempfile::TempDir::new().unwrap();
    let network = Network::serving("v1");

    let first = worker(
        manifest("m1", "l1"),
        Arc::new(DiskStore::new(dir.path())),
        &network,
        Arc::new(LocalHost::new()),
    );
    upgrade(&first).await;
    drop(first);

    network.set_offline(true);
    let restarted = worker(
        manifest("m1", "l1"),
        Arc::new(DiskStore::new(dir.path())),
        &network,
        Arc::new(LocalHost::new()),
    );
    assert_eq!(restarted.recover().await.unwrap(), LifecycleState::Live);

    let main = get(&restarted, "/main.js").await;
    assert_eq!(source(&main), ResponseSource::Cache);
    assert_eq!(body(&main), "v1:main.js");

    let next_version = worker(
        manifest("m2", "l1"),
        Arc::new(DiskStore::new(dir.path())),
        &network,
        Arc::new(LocalHost::new()),
    );
    assert_eq!(next_version.recover().await.unwrap(), LifecycleState::Idle);
}
