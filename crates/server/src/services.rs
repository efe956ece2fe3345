//! Production service catalog.
//!
//! Real constructors for everything the startup sequence brings up. Each
//! returned handle stays deliberately narrow: a name, a liveness poll,
//! and whatever the service itself needs to keep running.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use beacon_core::Environment;
use bootstrap::{ServiceCatalog, ServiceHandle, SharedHandle};
use events::EventBus;
use store::SqlitePool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::config::PlatformConfig;
use crate::routes::sse::SharedEventBuffer;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
const WORKER_TICK: Duration = Duration::from_secs(30);
const METRICS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Collaboration tools every deployment ships with.
const BUILTIN_TOOLS: &[&str] = &["presence", "broadcast", "history", "document_sync"];

pub struct PlatformCatalog {
    config: PlatformConfig,
    http: reqwest::Client,
    event_buffer: SharedEventBuffer,
}

impl PlatformCatalog {
    pub fn new(config: PlatformConfig, event_buffer: SharedEventBuffer) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HANDSHAKE_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            config,
            http,
            event_buffer,
        })
    }

    async fn probe_url(&self, url: &str) -> anyhow::Result<()> {
        self.http
            .get(url)
            .send()
            .await
            .with_context(|| format!("no response from {url}"))?
            .error_for_status()
            .with_context(|| format!("unhealthy response from {url}"))?;
        Ok(())
    }
}

#[async_trait]
impl ServiceCatalog for PlatformCatalog {
    async fn validate_environment(&self, environment: Environment) -> anyhow::Result<()> {
        if self.config.environment != environment {
            anyhow::bail!(
                "configured environment {} does not match startup environment {}",
                self.config.environment,
                environment
            );
        }
        if self.config.worker_count == 0 {
            anyhow::bail!("BEACON_WORKERS must be at least 1");
        }
        if !self.config.database_url.starts_with("sqlite:") {
            anyhow::bail!("unsupported database URL: {}", self.config.database_url);
        }
        if matches!(environment, Environment::Production | Environment::Staging) {
            if self.config.secret.is_none() {
                anyhow::bail!("BEACON_SECRET must be set in {environment}");
            }
            if self.config.bridge_url.is_none() {
                anyhow::bail!("BEACON_BRIDGE_URL must be set in {environment}");
            }
        }
        debug!(environment = %environment, "environment validated");
        Ok(())
    }

    async fn connect_bridge(&self) -> anyhow::Result<SharedHandle> {
        match &self.config.bridge_url {
            Some(url) => {
                self.probe_url(&format!("{url}/health"))
                    .await
                    .context("bridge handshake failed")?;
                info!(url, "connected message bridge");
                Ok(Arc::new(HttpBridge {
                    client: self.http.clone(),
                    base_url: url.clone(),
                }))
            }
            None => {
                debug!("no bridge configured; using in-process loopback");
                Ok(Arc::new(LoopbackBridge))
            }
        }
    }

    async fn probe_dependencies(&self) -> anyhow::Result<()> {
        if self.config.dependency_probes.is_empty() {
            debug!("no dependency probes configured");
            return Ok(());
        }
        let probes = self
            .config
            .dependency_probes
            .iter()
            .map(|url| self.probe_url(url));
        futures::future::try_join_all(probes).await?;
        info!(
            count = self.config.dependency_probes.len(),
            "all dependency probes answered"
        );
        Ok(())
    }

    async fn connect_store(&self) -> anyhow::Result<SharedHandle> {
        let pool = store::connect(&self.config.database_url)
            .await
            .context("failed to connect primary store")?;
        store::ping(&pool)
            .await
            .context("primary store did not answer ping")?;
        Ok(Arc::new(StoreHandle { pool }))
    }

    async fn connect_analytics(&self) -> anyhow::Result<Option<SharedHandle>> {
        let Some(url) = &self.config.analytics_url else {
            return Ok(None);
        };
        self.probe_url(&format!("{url}/health"))
            .await
            .context("analytics handshake failed")?;
        Ok(Some(Arc::new(AnalyticsHandle {
            client: self.http.clone(),
            base_url: url.clone(),
        })))
    }

    async fn connect_cache(&self) -> anyhow::Result<SharedHandle> {
        Ok(Arc::new(MemoryCache::new()))
    }

    async fn load_key_manager(&self) -> anyhow::Result<SharedHandle> {
        let keys = match &self.config.secret {
            Some(secret) => KeyManager::from_secret(secret),
            None => KeyManager::ephemeral(),
        };
        info!(key_id = %keys.key_id, "key manager loaded");
        Ok(Arc::new(keys))
    }

    async fn build_tool_registry(&self) -> anyhow::Result<SharedHandle> {
        let registry = ToolRegistry::builtin();
        info!(tools = registry.len(), "tool registry assembled");
        Ok(Arc::new(registry))
    }

    async fn spawn_workers(&self) -> anyhow::Result<SharedHandle> {
        Ok(Arc::new(WorkerPool::spawn(self.config.worker_count)))
    }

    async fn start_metrics_exporter(&self) -> anyhow::Result<Option<SharedHandle>> {
        if !self.config.metrics_enabled {
            return Ok(None);
        }
        Ok(Some(Arc::new(MetricsReporter::start(
            self.event_buffer.clone(),
        ))))
    }

    async fn open_realtime(&self, bus: &EventBus) -> anyhow::Result<SharedHandle> {
        Ok(Arc::new(RealtimePump::open(bus, self.event_buffer.clone())))
    }
}

/// Primary relational store.
pub struct StoreHandle {
    pool: SqlitePool,
}

impl StoreHandle {
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ServiceHandle for StoreHandle {
    fn service_name(&self) -> &'static str {
        "store"
    }

    async fn healthy(&self) -> bool {
        store::ping(&self.pool).await.is_ok()
    }
}

/// Secondary analytics store reached over HTTP.
struct AnalyticsHandle {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl ServiceHandle for AnalyticsHandle {
    fn service_name(&self) -> &'static str {
        "analytics"
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// External message bridge session.
struct HttpBridge {
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl ServiceHandle for HttpBridge {
    fn service_name(&self) -> &'static str {
        "bridge"
    }

    async fn healthy(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// In-process stand-in when no external bridge is configured. Only
/// reachable in development and test; environment validation requires a
/// real bridge elsewhere.
struct LoopbackBridge;

#[async_trait]
impl ServiceHandle for LoopbackBridge {
    fn service_name(&self) -> &'static str {
        "bridge"
    }
}

/// In-process key/value cache.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceHandle for MemoryCache {
    fn service_name(&self) -> &'static str {
        "cache"
    }
}

/// Signing key material. Development and test run on a per-process
/// ephemeral key; production loads the configured secret.
struct KeyManager {
    key_id: String,
    key: String,
}

impl KeyManager {
    fn from_secret(secret: &str) -> Self {
        Self {
            key_id: "configured".to_string(),
            key: secret.to_string(),
        }
    }

    fn ephemeral() -> Self {
        let key = uuid::Uuid::new_v4().simple().to_string();
        Self {
            key_id: format!("ephemeral-{}", &key[..8]),
            key,
        }
    }
}

#[async_trait]
impl ServiceHandle for KeyManager {
    fn service_name(&self) -> &'static str {
        "key_manager"
    }

    async fn healthy(&self) -> bool {
        !self.key.is_empty()
    }
}

/// Platform tool registry.
pub struct ToolRegistry {
    tools: Vec<&'static str>,
}

impl ToolRegistry {
    fn builtin() -> Self {
        Self {
            tools: BUILTIN_TOOLS.to_vec(),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains(&name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ServiceHandle for ToolRegistry {
    fn service_name(&self) -> &'static str {
        "tool_registry"
    }

    async fn healthy(&self) -> bool {
        !self.tools.is_empty()
    }
}

/// Background worker pool. Workers idle on a heartbeat tick until the
/// pool is dropped, which signals shutdown.
struct WorkerPool {
    shutdown: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    fn spawn(count: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        let workers = (0..count)
            .map(|index| {
                let mut rx = shutdown.subscribe();
                tokio::spawn(async move {
                    loop {
                        tokio::select! {
                            changed = rx.changed() => {
                                if changed.is_err() || *rx.borrow() {
                                    break;
                                }
                            }
                            _ = tokio::time::sleep(WORKER_TICK) => {
                                trace!(worker = index, "worker heartbeat");
                            }
                        }
                    }
                })
            })
            .collect();
        info!(count, "background workers spawned");
        Self { shutdown, workers }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

#[async_trait]
impl ServiceHandle for WorkerPool {
    fn service_name(&self) -> &'static str {
        "workers"
    }

    async fn healthy(&self) -> bool {
        !self.workers.is_empty() && self.workers.iter().all(|worker| !worker.is_finished())
    }
}

/// Client-facing delivery channel: drains the process bus into the SSE
/// replay buffer so reconnecting clients can catch up.
struct RealtimePump {
    task: JoinHandle<()>,
}

impl RealtimePump {
    fn open(bus: &EventBus, buffer: SharedEventBuffer) -> Self {
        let mut rx = bus.subscribe();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(envelope) => {
                        buffer
                            .write()
                            .unwrap_or_else(|poisoned| poisoned.into_inner())
                            .push(envelope);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "realtime pump lagged behind the bus");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { task }
    }
}

impl Drop for RealtimePump {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl ServiceHandle for RealtimePump {
    fn service_name(&self) -> &'static str {
        "realtime"
    }

    async fn healthy(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Periodic counter log standing in for a full metrics stack.
struct MetricsReporter {
    task: JoinHandle<()>,
}

impl MetricsReporter {
    fn start(buffer: SharedEventBuffer) -> Self {
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(METRICS_REPORT_INTERVAL).await;
                let buffered = buffer
                    .read()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len();
                debug!(buffered, "event buffer depth");
            }
        });
        Self { task }
    }
}

impl Drop for MetricsReporter {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl ServiceHandle for MetricsReporter {
    fn service_name(&self) -> &'static str {
        "metrics"
    }

    async fn healthy(&self) -> bool {
        !self.task.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::routes::sse::EventBuffer;

    fn buffer() -> SharedEventBuffer {
        Arc::new(RwLock::new(EventBuffer::new(16)))
    }

    fn test_config() -> PlatformConfig {
        let mut config = PlatformConfig::for_environment(Environment::Test);
        config.database_url = "sqlite::memory:".to_string();
        config
    }

    #[tokio::test]
    async fn test_bridge_handshake_succeeds() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        let mut config = test_config();
        config.bridge_url = Some(mock.uri());
        let catalog = PlatformCatalog::new(config, buffer()).unwrap();

        let handle = catalog.connect_bridge().await.unwrap();
        assert_eq!(handle.service_name(), "bridge");
        assert!(handle.healthy().await);
    }

    #[tokio::test]
    async fn test_bridge_handshake_fails_on_server_error() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock)
            .await;

        let mut config = test_config();
        config.bridge_url = Some(mock.uri());
        let catalog = PlatformCatalog::new(config, buffer()).unwrap();

        let err = catalog.connect_bridge().await.unwrap_err();
        assert!(format!("{err:#}").contains("bridge handshake failed"));
    }

    #[tokio::test]
    async fn test_loopback_bridge_when_unconfigured() {
        let catalog = PlatformCatalog::new(test_config(), buffer()).unwrap();
        let handle = catalog.connect_bridge().await.unwrap();
        assert_eq!(handle.service_name(), "bridge");
        assert!(handle.healthy().await);
    }

    #[tokio::test]
    async fn test_dependency_probes_report_the_failing_url() {
        let mock = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&mock)
            .await;

        let mut config = test_config();
        config.dependency_probes = vec![
            format!("{}/health", mock.uri()),
            // Port 1 is never listening; the probe fails fast.
            "http://127.0.0.1:1/health".to_string(),
        ];
        let catalog = PlatformCatalog::new(config, buffer()).unwrap();

        let err = catalog.probe_dependencies().await.unwrap_err();
        assert!(format!("{err:#}").contains("127.0.0.1:1"));
    }

    #[tokio::test]
    async fn test_store_connects_in_memory() {
        let catalog = PlatformCatalog::new(test_config(), buffer()).unwrap();
        let handle = catalog.connect_store().await.unwrap();
        assert_eq!(handle.service_name(), "store");
        assert!(handle.healthy().await);
    }

    #[tokio::test]
    async fn test_analytics_skipped_when_unconfigured() {
        let catalog = PlatformCatalog::new(test_config(), buffer()).unwrap();
        assert!(catalog.connect_analytics().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_validation_requires_secret_in_production() {
        let mut config = PlatformConfig::for_environment(Environment::Production);
        config.bridge_url = Some("http://bridge.internal".to_string());
        let catalog = PlatformCatalog::new(config, buffer()).unwrap();

        let err = catalog
            .validate_environment(Environment::Production)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("BEACON_SECRET"));
    }

    #[tokio::test]
    async fn test_validation_rejects_environment_mismatch() {
        let catalog = PlatformCatalog::new(test_config(), buffer()).unwrap();
        let err = catalog
            .validate_environment(Environment::Production)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[tokio::test]
    async fn test_worker_pool_spawns_and_reports_healthy() {
        let catalog = PlatformCatalog::new(test_config(), buffer()).unwrap();
        let handle = catalog.spawn_workers().await.unwrap();
        assert_eq!(handle.service_name(), "workers");
        assert!(handle.healthy().await);
    }

    #[tokio::test]
    async fn test_realtime_pump_fills_the_replay_buffer() {
        let shared = buffer();
        let bus = EventBus::new();
        let pump = RealtimePump::open(&bus, shared.clone());

        bus.emit(events::Event::Warning {
            message: "hello".to_string(),
            context: None,
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(
            shared
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .len(),
            1
        );
        assert!(pump.healthy().await);
    }

    #[test]
    fn test_tool_registry_contains_builtins() {
        let registry = ToolRegistry::builtin();
        assert!(registry.contains("presence"));
        assert!(registry.contains("document_sync"));
        assert!(!registry.contains("unknown_tool"));
    }

    #[test]
    fn test_memory_cache_round_trip() {
        let cache = MemoryCache::new();
        cache.insert("session:1", "alice");
        assert_eq!(cache.get("session:1").as_deref(), Some("alice"));
        assert!(cache.get("session:2").is_none());
    }

    #[tokio::test]
    async fn test_key_manager_is_ephemeral_without_a_secret() {
        let catalog = PlatformCatalog::new(test_config(), buffer()).unwrap();
        let handle = catalog.load_key_manager().await.unwrap();
        assert_eq!(handle.service_name(), "key_manager");
        assert!(handle.healthy().await);
    }
}
