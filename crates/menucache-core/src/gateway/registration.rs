use std::sync::Arc;

use tracing::info;

use super::{ControlMessage, Fetcher, GatewayError, InstallReport, OfflineCacheGateway};

/// Tracks the active cache generation and any generation waiting to take over.
///
/// A fresh registration first restores the generation recorded as active on
/// disk, so a restart keeps serving the cache it left behind.
pub struct Registration<F> {
    active: Option<Arc<OfflineCacheGateway<F>>>,
    waiting: Option<Arc<OfflineCacheGateway<F>>>,
}

impl<F> Default for Registration<F> {
    fn default() -> Self {
        Self {
            active: None,
            waiting: None,
        }
    }
}

impl<F: Fetcher + Clone> Registration<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The generation currently intercepting requests
    pub fn controller(&self) -> Option<Arc<OfflineCacheGateway<F>>> {
        self.active.clone()
    }

    pub fn waiting(&self) -> Option<Arc<OfflineCacheGateway<F>>> {
        self.waiting.clone()
    }

    /// Install a new generation and activate it if it skips waiting.
    ///
    /// A generation that does not skip waiting stays pending until a
    /// `ControlMessage::SkipWaiting` arrives through `post_message`. A
    /// candidate that is already the active generation on disk is resumed
    /// as is, without fetching anything.
    pub async fn update(&mut self, candidate: Arc<OfflineCacheGateway<F>>) -> Result<InstallReport, GatewayError> {
        if self.active.is_none() {
            self.restore(&candidate).await?;
        }
        if let Some(ref active) = self.active {
            if Arc::ptr_eq(active, &candidate) {
                return Ok(InstallReport::default());
            }
        }

        let report = candidate.install().await?;

        if candidate.ready_to_activate().await {
            self.promote(candidate).await?;
        } else {
            info!(generation = %candidate.generation(), "New cache generation waiting to activate");
            if let Some(previous) = self.waiting.replace(candidate) {
                previous.retire().await;
            }
        }

        Ok(report)
    }

    /// Deliver a control message to the waiting generation.
    ///
    /// Returns true if a waiting generation was activated.
    pub async fn post_message(&mut self, message: ControlMessage) -> Result<bool, GatewayError> {
        let Some(waiting) = self.waiting.take() else {
            return Ok(false);
        };

        waiting.handle_message(message).await;
        if waiting.ready_to_activate().await {
            self.promote(waiting).await?;
            Ok(true)
        } else {
            self.waiting = Some(waiting);
            Ok(false)
        }
    }

    /// Resume the generation a previous run left active.
    async fn restore(&mut self, candidate: &Arc<OfflineCacheGateway<F>>) -> Result<(), GatewayError> {
        let Some(name) = candidate.storage().active() else {
            return Ok(());
        };

        let previous = if name == candidate.generation() {
            Arc::clone(candidate)
        } else {
            Arc::new(candidate.sibling(&name))
        };
        previous.resume().await?;
        info!(generation = %name, "Restored active cache generation");
        self.active = Some(previous);
        Ok(())
    }

    async fn promote(&mut self, candidate: Arc<OfflineCacheGateway<F>>) -> Result<(), GatewayError> {
        candidate.activate().await?;
        if let Some(stale) = self.waiting.take() {
            if !Arc::ptr_eq(&stale, &candidate) {
                stale.retire().await;
            }
        }
        if let Some(previous) = self.active.replace(candidate) {
            previous.retire().await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::worker::tests::{get, options, FakeNetwork};
    use crate::gateway::{CacheStorage, WorkerPhase};

    fn gateway(
        storage: &CacheStorage,
        network: &Arc<FakeNetwork>,
        generation: &str,
        eager: bool,
    ) -> Arc<OfflineCacheGateway<Arc<FakeNetwork>>> {
        let mut opts = options(generation, &["/menu.json"]);
        opts.eager_activation = eager;
        Arc::new(OfflineCacheGateway::new(opts, storage.clone(), Arc::clone(network)))
    }

    #[tokio::test]
    async fn test_new_generation_supersedes_old() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, r#"[{"name":"Tea"}]"#);

        let mut registration = Registration::new();
        let v1 = gateway(&storage, &network, "menu-v1", true);
        registration.update(Arc::clone(&v1)).await.unwrap();
        assert_eq!(v1.phase().await, WorkerPhase::Activated);

        network.route("/menu.json", 200, r#"[{"name":"Chai"}]"#);
        let v2 = gateway(&storage, &network, "menu-v2", true);
        registration.update(Arc::clone(&v2)).await.unwrap();

        assert_eq!(v1.phase().await, WorkerPhase::Redundant);
        assert!(!v1.controls_clients().await);
        assert_eq!(storage.keys().unwrap(), vec!["menu-v2".to_string()]);

        let controller = registration.controller().expect("active generation");
        assert_eq!(controller.generation(), "menu-v2");
        let response = controller.intercept(&get("/menu.json")).await.unwrap().unwrap();
        assert_eq!(response.body, br#"[{"name":"Chai"}]"#);
    }

    #[tokio::test]
    async fn test_waiting_generation_activates_on_skip_waiting() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, "[]");

        let mut registration = Registration::new();
        registration
            .update(gateway(&storage, &network, "menu-v1", true))
            .await
            .unwrap();

        let v2 = gateway(&storage, &network, "menu-v2", false);
        registration.update(Arc::clone(&v2)).await.unwrap();
        assert_eq!(v2.phase().await, WorkerPhase::Installed);
        assert_eq!(registration.controller().unwrap().generation(), "menu-v1");
        // Both generations coexist until activation
        assert_eq!(storage.keys().unwrap().len(), 2);

        assert!(registration.post_message(ControlMessage::SkipWaiting).await.unwrap());
        assert_eq!(registration.controller().unwrap().generation(), "menu-v2");
        assert!(registration.waiting().is_none());
        assert_eq!(storage.keys().unwrap(), vec!["menu-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_relaunch_same_generation_keeps_cached_body() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, "OLD");

        let mut first_run = Registration::new();
        first_run
            .update(gateway(&storage, &network, "menu-v1", true))
            .await
            .unwrap();

        network.route("/menu.json", 200, "NEW");
        let calls = network.call_count();

        let mut second_run = Registration::new();
        let relaunched = gateway(&storage, &network, "menu-v1", true);
        second_run.update(Arc::clone(&relaunched)).await.unwrap();

        assert_eq!(relaunched.phase().await, WorkerPhase::Activated);
        let response = relaunched.intercept(&get("/menu.json")).await.unwrap().unwrap();
        assert_eq!(response.body, b"OLD");
        assert_eq!(network.call_count(), calls);
    }

    #[tokio::test]
    async fn test_relaunch_keeps_previous_generation_in_control() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, "V1");

        let mut first_run = Registration::new();
        first_run
            .update(gateway(&storage, &network, "menu-v1", true))
            .await
            .unwrap();

        // Next start: new generation, no eager activation, offline
        let mut second_run = Registration::new();
        let v2 = gateway(&storage, &network, "menu-v2", false);
        v2.set_offline(true);
        second_run.update(Arc::clone(&v2)).await.unwrap();

        assert_eq!(v2.phase().await, WorkerPhase::Installed);
        assert_eq!(second_run.waiting().unwrap().generation(), "menu-v2");
        let controller = second_run.controller().expect("restored generation");
        assert_eq!(controller.generation(), "menu-v1");
        assert!(controller.is_offline());

        let response = controller.intercept(&get("/menu.json")).await.unwrap().unwrap();
        assert_eq!(response.body, b"V1");

        assert!(second_run.post_message(ControlMessage::SkipWaiting).await.unwrap());
        assert_eq!(controller.phase().await, WorkerPhase::Redundant);
        assert_eq!(storage.active(), Some("menu-v2".to_string()));
    }

    #[tokio::test]
    async fn test_promotion_retires_stale_waiter() {
        let dir = tempfile::tempdir().unwrap();
        let storage = CacheStorage::new(dir.path().to_path_buf()).unwrap();
        let network = Arc::new(FakeNetwork::default());
        network.route("/menu.json", 200, "[]");

        let mut registration = Registration::new();
        registration
            .update(gateway(&storage, &network, "menu-v1", true))
            .await
            .unwrap();
        let v2 = gateway(&storage, &network, "menu-v2", false);
        registration.update(Arc::clone(&v2)).await.unwrap();
        assert!(registration.waiting().is_some());

        let v3 = gateway(&storage, &network, "menu-v3", true);
        registration.update(Arc::clone(&v3)).await.unwrap();

        assert!(registration.waiting().is_none());
        assert_eq!(v2.phase().await, WorkerPhase::Redundant);
        assert_eq!(registration.controller().unwrap().generation(), "menu-v3");
        assert_eq!(storage.keys().unwrap(), vec!["menu-v3".to_string()]);
    }

    #[tokio::test]
    async fn test_skip_waiting_without_pending_generation_is_noop() {
        let mut registration: Registration<Arc<FakeNetwork>> = Registration::new();
        assert!(!registration.post_message(ControlMessage::SkipWaiting).await.unwrap());
    }
}
