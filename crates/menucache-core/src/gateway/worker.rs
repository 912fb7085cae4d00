use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

use super::{CacheStorage, Fetcher, GatewayError, NetworkError, Request, Response};

/// Maximum concurrent asset fetches during install.
const INSTALL_CONCURRENCY: usize = 4;

/// Lifecycle phase of a cache generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
    Redundant,
}

impl fmt::Display for WorkerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerPhase::Parsed => "parsed",
            WorkerPhase::Installing => "installing",
            WorkerPhase::Installed => "installed",
            WorkerPhase::Activating => "activating",
            WorkerPhase::Activated => "activated",
            WorkerPhase::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

/// Inbound control signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    /// Activate a waiting generation without waiting for clients to go away
    SkipWaiting,
}

/// Outcome of pre-caching the asset manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub cached: Vec<String>,
    /// (asset path, reason)
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Settings for one cache generation.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Cache name; bump it whenever core assets change
    pub generation: String,
    /// Base URL the manifest paths are resolved against
    pub origin: Url,
    pub manifest: Vec<String>,
    /// Skip waiting right after install
    pub eager_activation: bool,
}

#[derive(Debug)]
struct WorkerState {
    phase: WorkerPhase,
    skip_waiting: bool,
    controlling: bool,
}

/// Cache-first fetch interception for one cache generation.
///
/// GET requests are answered from the cache when an entry exists, without
/// any freshness check. Misses go to the network; 200 responses are stored
/// for next time. When the network fails (or offline mode skips it) the
/// cache is consulted once more and, failing that, the request resolves to
/// `None` instead of an error.
pub struct OfflineCacheGateway<F> {
    options: GatewayOptions,
    storage: CacheStorage,
    fetcher: F,
    state: RwLock<WorkerState>,
    /// Shared with sibling generations
    offline: Arc<AtomicBool>,
}

impl<F: Fetcher> OfflineCacheGateway<F> {
    pub fn new(options: GatewayOptions, storage: CacheStorage, fetcher: F) -> Self {
        Self {
            options,
            storage,
            fetcher,
            state: RwLock::new(WorkerState {
                phase: WorkerPhase::Parsed,
                skip_waiting: false,
                controlling: false,
            }),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A gateway for another generation over the same storage, network and
    /// offline switch.
    pub fn sibling(&self, generation: &str) -> Self
    where
        F: Clone,
    {
        let mut gateway = Self::new(
            GatewayOptions {
                generation: generation.to_string(),
                ..self.options.clone()
            },
            self.storage.clone(),
            self.fetcher.clone(),
        );
        gateway.offline = Arc::clone(&self.offline);
        gateway
    }

    pub fn generation(&self) -> &str {
        &self.options.generation
    }

    pub fn origin(&self) -> &Url {
        &self.options.origin
    }

    pub fn storage(&self) -> &CacheStorage {
        &self.storage
    }

    pub async fn phase(&self) -> WorkerPhase {
        self.state.read().await.phase
    }

    /// Whether this generation currently intercepts requests
    pub async fn controls_clients(&self) -> bool {
        self.state.read().await.controlling
    }

    /// In offline mode the network is never consulted.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Relaxed)
    }

    /// Resolve a path against the configured origin.
    pub fn resolve(&self, path: &str) -> Result<Url, GatewayError> {
        self.options
            .origin
            .join(path)
            .map_err(|source| GatewayError::InvalidPath {
                path: path.to_string(),
                source,
            })
    }

    async fn transition(&self, action: &'static str, from: WorkerPhase, to: WorkerPhase) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if state.phase != from {
            return Err(GatewayError::InvalidPhase {
                action,
                phase: state.phase,
            });
        }
        state.phase = to;
        Ok(())
    }

    // =========================================================================
    // Install
    // =========================================================================

    /// Pre-cache the asset manifest into a cache named after the generation.
    ///
    /// Assets already stored in this generation's cache are kept as they
    /// are. Individual asset failures are reported, not fatal.
    pub async fn install(&self) -> Result<InstallReport, GatewayError> {
        self.transition("install", WorkerPhase::Parsed, WorkerPhase::Installing)
            .await?;
        info!(generation = %self.generation(), "Installing cache generation");

        let cache = match self.storage.open(self.generation()) {
            Ok(cache) => cache,
            Err(e) => {
                self.state.write().await.phase = WorkerPhase::Redundant;
                return Err(e.into());
            }
        };

        let results: Vec<(String, Result<(), String>)> = stream::iter(self.options.manifest.iter().cloned())
            .map(|path: String| {
                let cache = &cache;
                async move {
                    let outcome = self.precache(cache, &path).await;
                    (path, outcome)
                }
            })
            .buffer_unordered(INSTALL_CONCURRENCY)
            .collect()
            .await;

        let mut report = InstallReport::default();
        for (path, outcome) in results {
            match outcome {
                Ok(()) => report.cached.push(path),
                Err(reason) => {
                    warn!(asset = %path, reason = %reason, "Failed to pre-cache asset (non-fatal)");
                    report.failed.push((path, reason));
                }
            }
        }

        {
            let mut state = self.state.write().await;
            state.phase = WorkerPhase::Installed;
            if self.options.eager_activation {
                state.skip_waiting = true;
            }
        }

        info!(
            generation = %self.generation(),
            cached = report.cached.len(),
            failed = report.failed.len(),
            "Install complete"
        );
        Ok(report)
    }

    async fn precache(&self, cache: &super::Cache, path: &str) -> Result<(), String> {
        let url = self.resolve(path).map_err(|e| e.to_string())?;
        let request = Request::get(url);
        if matches!(cache.match_request(&request), Ok(Some(_))) {
            debug!(asset = %path, "Already cached");
            return Ok(());
        }
        if self.is_offline() {
            return Err(NetworkError::Offline.to_string());
        }

        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| e.to_string())?;
        if response.status != 200 {
            return Err(format!("status {}", response.status));
        }

        cache.put(&request, &response).map_err(|e| e.to_string())
    }

    /// Handle a control signal.
    pub async fn handle_message(&self, message: ControlMessage) {
        match message {
            ControlMessage::SkipWaiting => {
                debug!(generation = %self.generation(), "Skip waiting requested");
                self.state.write().await.skip_waiting = true;
            }
        }
    }

    pub async fn ready_to_activate(&self) -> bool {
        let state = self.state.read().await;
        state.phase == WorkerPhase::Installed && state.skip_waiting
    }

    // =========================================================================
    // Activate
    // =========================================================================

    /// Delete every cache not named after this generation, then claim clients.
    ///
    /// Returns the names of the deleted caches.
    pub async fn activate(&self) -> Result<Vec<String>, GatewayError> {
        self.transition("activate", WorkerPhase::Installed, WorkerPhase::Activating)
            .await?;
        info!(generation = %self.generation(), "Activating cache generation");

        let mut deleted = Vec::new();
        for name in self.storage.keys()? {
            if name == self.generation() {
                continue;
            }
            match self.storage.delete(&name) {
                Ok(_) => {
                    info!(cache = %name, "Deleted old cache");
                    deleted.push(name);
                }
                Err(e) => warn!(cache = %name, error = %e, "Failed to delete old cache"),
            }
        }

        if let Err(e) = self.storage.set_active(self.generation()) {
            warn!(generation = %self.generation(), error = %e, "Failed to record active generation");
        }

        let mut state = self.state.write().await;
        state.phase = WorkerPhase::Activated;
        state.controlling = true;
        Ok(deleted)
    }

    /// Take control again for a generation activated in an earlier run.
    ///
    /// Skips install and activate: the cache is used exactly as stored.
    pub async fn resume(&self) -> Result<(), GatewayError> {
        let mut state = self.state.write().await;
        if state.phase != WorkerPhase::Parsed {
            return Err(GatewayError::InvalidPhase {
                action: "resume",
                phase: state.phase,
            });
        }
        state.phase = WorkerPhase::Activated;
        state.controlling = true;
        info!(generation = %self.generation(), "Resumed cache generation");
        Ok(())
    }

    /// Mark this generation as superseded.
    pub async fn retire(&self) {
        let mut state = self.state.write().await;
        state.phase = WorkerPhase::Redundant;
        state.controlling = false;
        debug!(generation = %self.generation(), "Cache generation retired");
    }

    // =========================================================================
    // Fetch interception
    // =========================================================================

    /// Intercept an outbound request.
    ///
    /// Non-GET requests, and any request while this generation does not
    /// control clients, go straight to the network. GET requests never fail:
    /// an unavailable resource resolves to `Ok(None)`.
    pub async fn intercept(&self, request: &Request) -> Result<Option<Response>, NetworkError> {
        if !request.is_get() || !self.controls_clients().await {
            if self.is_offline() {
                return Err(NetworkError::Offline);
            }
            return self.fetcher.fetch(request).await.map(Some);
        }

        Ok(self.cache_first(request).await)
    }

    async fn cache_first(&self, request: &Request) -> Option<Response> {
        if let Some(hit) = self.lookup(request) {
            debug!(url = %request.url, "Cache hit");
            return Some(hit);
        }

        if self.is_offline() {
            debug!(url = %request.url, "Offline mode, skipping network");
        } else {
            match self.fetcher.fetch(request).await {
                Ok(response) => {
                    if response.status == 200 {
                        self.store(request, &response);
                    }
                    return Some(response);
                }
                Err(e) => warn!(url = %request.url, error = %e, "Fetch failed"),
            }
        }

        // Another request may have stored it since the first lookup
        match self.lookup(request) {
            Some(fallback) => {
                info!(url = %request.url, "Using cached fallback");
                Some(fallback)
            }
            None => {
                warn!(url = %request.url, "No cache, resource unavailable");
                None
            }
        }
    }

    fn lookup(&self, request: &Request) -> Option<Response> {
        match self.storage.match_request(request) {
            Ok(entry) => entry.map(|e| e.response),
            Err(e) => {
                debug!(url = %request.url, error = %e, "Cache lookup failed");
                None
            }
        }
    }

    fn store(&self, request: &Request, response: &Response) {
        let result = self
            .storage
            .open(self.generation())
            .and_then(|cache| cache.put(request, response));
        if let Err(e) = result {
            warn!(url = %request.url, error = %e, "Failed to cache response");
        }
    }
}
