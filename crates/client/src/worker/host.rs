//! Host adapter for worker lifecycle events.
//!
//! Plays the part of the browser runtime: it holds at most one waiting and
//! one active worker version, routes `install`/`activate` to the waiting one
//! and `fetch` to the active one, and serves pass-through requests from the
//! network itself.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;

use nutz_core::Error;

use super::{ActivateOutcome, FetchDecision, InstallOutcome, OfflineCacheManager, PassReason, ResponseSource};
use crate::fetch::{Network, Request, Response};

/// Lifecycle events, named as the host runtime names them.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    Install,
    Activate,
    Fetch(Request),
}

impl WorkerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            WorkerEvent::Install => "install",
            WorkerEvent::Activate => "activate",
            WorkerEvent::Fetch(_) => "fetch",
        }
    }
}

/// A response handed back to the page and where it came from.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: Response,
    pub source: ResponseSource,
    pub pass_reason: Option<PassReason>,
}

#[derive(Debug, Clone)]
pub enum EventResult {
    Installed(InstallOutcome),
    Activated(ActivateOutcome),
    Fetched(Served),
}

#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub install: InstallOutcome,
    /// None when the new version is left waiting.
    pub activate: Option<ActivateOutcome>,
}

pub struct WorkerHost {
    network: Arc<dyn Network>,
    waiting: Mutex<Option<Arc<OfflineCacheManager>>>,
    active: Mutex<Option<Arc<OfflineCacheManager>>>,
}

impl WorkerHost {
    pub fn new(network: Arc<dyn Network>) -> Self {
        Self { network, waiting: Mutex::new(None), active: Mutex::new(None) }
    }

    pub fn active(&self) -> Option<Arc<OfflineCacheManager>> {
        self.active.lock().clone()
    }

    pub fn waiting(&self) -> Option<Arc<OfflineCacheManager>> {
        self.waiting.lock().clone()
    }

    /// Make `manager` the waiting version, replacing any earlier waiting one.
    pub fn register(&self, manager: OfflineCacheManager) {
        *self.waiting.lock() = Some(Arc::new(manager));
    }

    /// Register, install and, when the version asks to skip waiting,
    /// activate a new worker version.
    ///
    /// # Errors
    ///
    /// The install or activation error. The previously active version keeps
    /// serving in that case.
    pub async fn deploy(&self, manager: OfflineCacheManager) -> Result<DeployOutcome, Error> {
        self.register(manager);

        let install = self.install_waiting().await?;
        let activate = if install.skip_waiting { Some(self.activate_waiting().await?) } else { None };

        Ok(DeployOutcome { install, activate })
    }

    pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventResult, Error> {
        tracing::debug!(event = event.name(), "dispatching worker event");
        match event {
            WorkerEvent::Install => self.install_waiting().await.map(EventResult::Installed),
            WorkerEvent::Activate => self.activate_waiting().await.map(EventResult::Activated),
            WorkerEvent::Fetch(request) => self.fetch(&request).await.map(EventResult::Fetched),
        }
    }

    /// Route a page request through the active worker, if any.
    pub async fn fetch(&self, request: &Request) -> Result<Served, Error> {
        let decision = match self.active() {
            Some(manager) => manager.on_fetch(request).await?,
            None => FetchDecision::PassThrough(PassReason::NotActive),
        };

        match decision {
            FetchDecision::Respond { response, source } => Ok(Served { response, source, pass_reason: None }),
            FetchDecision::PassThrough(reason) => {
                let response = self.network.fetch(request).await?;
                Ok(Served { response, source: ResponseSource::PassThrough, pass_reason: Some(reason) })
            }
        }
    }

    async fn install_waiting(&self) -> Result<InstallOutcome, Error> {
        let manager = self
            .waiting()
            .ok_or(Error::InvalidState { operation: "install", state: "no worker waiting".into() })?;

        match manager.on_install().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                {
                    let mut waiting = self.waiting.lock();
                    if waiting.as_ref().is_some_and(|w| Arc::ptr_eq(w, &manager)) {
                        *waiting = None;
                    }
                }
                tracing::warn!(
                    cache = %manager.config().cache_name,
                    active = ?self.active().map(|a| a.config().cache_name.clone()),
                    "new worker rejected; previous version keeps control"
                );
                Err(err)
            }
        }
    }

    async fn activate_waiting(&self) -> Result<ActivateOutcome, Error> {
        let manager = self
            .waiting()
            .ok_or(Error::InvalidState { operation: "activate", state: "no worker waiting".into() })?;

        let outcome = manager.on_activate().await?;

        {
            let mut waiting = self.waiting.lock();
            if waiting.as_ref().is_some_and(|w| Arc::ptr_eq(w, &manager)) {
                *waiting = None;
            }
        }
        *self.active.lock() = Some(manager);

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::ScriptedNetwork;
    use crate::worker::{WorkerConfig, WorkerState};
    use nutz_core::CacheDb;

    const ORIGIN: &str = "https://rooms.nutz.app";

    fn manager(generation: &str, cache: &CacheDb, network: &Arc<ScriptedNetwork>) -> OfflineCacheManager {
        let config = WorkerConfig::new(url::Url::parse(ORIGIN).unwrap(), generation).with_core_assets(["/"]);
        OfflineCacheManager::new(config, cache.clone(), network.clone())
    }

    fn get(path: &str) -> Request {
        Request::get(url::Url::parse(&format!("{ORIGIN}{path}")).unwrap())
    }

    #[test]
    fn test_event_names() {
        assert_eq!(WorkerEvent::Install.name(), "install");
        assert_eq!(WorkerEvent::Activate.name(), "activate");
        assert_eq!(WorkerEvent::Fetch(get("/")).name(), "fetch");
    }

    #[tokio::test]
    async fn test_deploy_takes_control_immediately() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(&format!("{ORIGIN}/"), 200, b"v1 shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let host = WorkerHost::new(network.clone());

        let outcome = host.deploy(manager("kagan-v1", &cache, &network)).await.unwrap();

        assert!(outcome.install.skip_waiting);
        assert!(outcome.activate.is_some());
        assert!(host.waiting().is_none());
        assert_eq!(host.active().unwrap().state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_failed_deploy_keeps_previous_version() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(&format!("{ORIGIN}/"), 200, b"v1 shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let host = WorkerHost::new(network.clone());
        host.deploy(manager("kagan-v1", &cache, &network)).await.unwrap();

        network.fail(&format!("{ORIGIN}/"));
        let result = host.deploy(manager("kagan-v2", &cache, &network)).await;

        assert!(matches!(result, Err(Error::InstallFailed { .. })));
        assert_eq!(host.active().unwrap().config().cache_name, "kagan-v1");
        assert!(host.waiting().is_none());

        let served = host.fetch(&get("/")).await.unwrap();
        assert_eq!(served.source, ResponseSource::Cache);
        assert_eq!(&served.response.bytes[..], b"v1 shell");
    }

    #[tokio::test]
    async fn test_new_generation_replaces_old_store() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(&format!("{ORIGIN}/"), 200, b"shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let host = WorkerHost::new(network.clone());

        host.deploy(manager("kagan-v1", &cache, &network)).await.unwrap();
        let outcome = host.deploy(manager("kagan-v2", &cache, &network)).await.unwrap();

        assert_eq!(outcome.activate.unwrap().deleted, vec!["kagan-v1"]);
        assert_eq!(cache.store_names().await.unwrap(), vec!["kagan-v2"]);
    }

    #[tokio::test]
    async fn test_step_by_step_dispatch() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(&format!("{ORIGIN}/"), 200, b"shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let host = WorkerHost::new(network.clone());

        host.register(manager("kagan-v2", &cache, &network));
        assert!(matches!(host.dispatch(WorkerEvent::Install).await.unwrap(), EventResult::Installed(_)));
        assert!(host.active().is_none());
        assert!(matches!(host.dispatch(WorkerEvent::Activate).await.unwrap(), EventResult::Activated(_)));

        match host.dispatch(WorkerEvent::Fetch(get("/"))).await.unwrap() {
            EventResult::Fetched(served) => assert_eq!(served.source, ResponseSource::Network),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_without_active_worker_requests_go_to_network() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(&format!("{ORIGIN}/room"), 200, b"room");
        let host = WorkerHost::new(network.clone());

        let served = host.fetch(&get("/room")).await.unwrap();
        assert_eq!(served.source, ResponseSource::PassThrough);
        assert_eq!(served.pass_reason, Some(PassReason::NotActive));
    }

    #[tokio::test]
    async fn test_api_pass_through_failure_is_visible() {
        let network = Arc::new(ScriptedNetwork::new());
        network.respond(&format!("{ORIGIN}/"), 200, b"shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let host = WorkerHost::new(network.clone());
        host.deploy(manager("kagan-v2", &cache, &network)).await.unwrap();

        let result = host.fetch(&get("/api/chat")).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_install_without_waiting_worker() {
        let host = WorkerHost::new(Arc::new(ScriptedNetwork::new()));
        assert!(matches!(host.dispatch(WorkerEvent::Install).await, Err(Error::InvalidState { .. })));
    }
}
