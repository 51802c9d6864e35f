//! Session registry
//!
//! Owns every live session, the client-to-session mapping and the background
//! expiration sweep. Sessions live in a `DashMap` so operations on different
//! sessions never contend on one lock; the client map sits behind a single
//! mutex and is always taken before any session's client set.

use super::core::{Session, SessionMemoryUsage, SessionSummary};
use super::profile::ProfileLoader;
use super::types::{SessionConfig, SessionDefaults, SessionType};
use crate::memory::{GlobalMemoryManager, GlobalMemoryUsage, MemoryBounds, MemoryTracker};
use crate::state::{DEFAULT_AUTO_SAVE_INTERVAL, IsolatedStateManager};
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default period of the expiration sweep
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Registry settings
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub session_defaults: SessionDefaults,
    /// Root for per-session state files; `None` keeps state in memory only
    pub persistence_root: Option<PathBuf>,
    pub sweep_interval: Duration,
    pub auto_save_interval: Duration,
    pub global_bounds: MemoryBounds,
    pub profiles_dir: Option<PathBuf>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            session_defaults: SessionDefaults::default(),
            persistence_root: None,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            global_bounds: MemoryBounds::global(),
            profiles_dir: None,
        }
    }
}

/// Aggregate view over all sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryStats {
    pub active_sessions: usize,
    pub connected_clients: usize,
    pub total_memory_mb: f64,
    pub sessions: Vec<SessionSummary>,
}

/// Default per-session ceilings reported alongside a memory report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefaultBounds {
    pub max_per_session_mb: u64,
    pub max_state_size_kb: u64,
}

/// Memory usage across sessions, listing those over their bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub total_sessions: usize,
    pub total_memory_mb: f64,
    pub sessions_over_limit: Vec<SessionMemoryUsage>,
    pub memory_bounds: DefaultBounds,
    pub global: GlobalMemoryUsage,
}

struct SweepTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Creates, locates and expires sessions
pub struct SessionRegistry {
    config: RegistryConfig,
    sessions: DashMap<String, Arc<Session>>,
    client_sessions: Mutex<HashMap<String, String>>,
    memory: Arc<GlobalMemoryManager>,
    profiles: ProfileLoader,
    sweep: Mutex<Option<SweepTask>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl SessionRegistry {
    pub fn new(config: RegistryConfig) -> Self {
        let memory = Arc::new(GlobalMemoryManager::new(config.global_bounds));
        let profiles = ProfileLoader::new(config.profiles_dir.clone());
        Self {
            config,
            sessions: DashMap::new(),
            client_sessions: Mutex::new(HashMap::new()),
            memory,
            profiles,
            sweep: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn memory(&self) -> &Arc<GlobalMemoryManager> {
        &self.memory
    }

    pub fn profiles(&self) -> &ProfileLoader {
        &self.profiles
    }

    /// Create a main session, or return `session_id` if it already exists
    pub async fn create_session(
        &self,
        session_id: Option<String>,
        config: Option<SessionConfig>,
    ) -> String {
        self.create_session_of_type(session_id, SessionType::Main, config)
            .await
    }

    /// Create a session of a given type.
    ///
    /// An existing id is returned unchanged. The new session's state is
    /// loaded before it becomes visible; if a concurrent call published the
    /// same id first, the freshly built session is discarded.
    pub async fn create_session_of_type(
        &self,
        session_id: Option<String>,
        session_type: SessionType,
        config: Option<SessionConfig>,
    ) -> String {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.sessions.contains_key(&session_id) {
            return session_id;
        }

        let config = match config {
            Some(config) => config,
            None => self.default_config(&session_id, session_type).await,
        };
        let session = Arc::new(self.build_session(&session_id, session_type, config));
        session.state_manager().initialize().await;

        match self.sessions.entry(session_id.clone()) {
            Entry::Occupied(_) => {
                debug!(session_id = %session_id, "Session created concurrently, discarding duplicate");
                session.discard();
                return session_id;
            }
            Entry::Vacant(entry) => {
                // Registered before insert; removal only sees inserted sessions
                self.memory.register(Arc::clone(session.tracker()));
                session.state_manager().start_auto_save();
                entry.insert(Arc::clone(&session));
            }
        }

        info!(
            session_id = %session_id,
            session_type = %session_type,
            persistent = session.is_persistent(),
            "Session created"
        );
        session_id
    }

    async fn default_config(&self, session_id: &str, session_type: SessionType) -> SessionConfig {
        let profile = self.profiles.session_profile(session_id, session_type).await;
        let mut config = SessionConfig::from_defaults(&self.config.session_defaults);
        config.max_memory_mb = profile.limits.max_memory_mb;
        config
    }

    fn build_session(
        &self,
        session_id: &str,
        session_type: SessionType,
        config: SessionConfig,
    ) -> Session {
        let tracker = MemoryTracker::shared(session_id);
        let manager = match &self.config.persistence_root {
            Some(root) => IsolatedStateManager::persistent(session_id, tracker, root),
            None => IsolatedStateManager::new(session_id, tracker),
        }
        .with_auto_save_interval(self.config.auto_save_interval);

        Session::new(session_id, session_type, config, Arc::new(manager))
    }

    pub fn get_session(&self, session_id: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(session_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn get_session_by_client(&self, client_id: &str) -> Option<Arc<Session>> {
        let session_id = self.client_sessions.lock().get(client_id).cloned()?;
        self.get_session(&session_id)
    }

    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Attach a client to a session.
    ///
    /// The client is first detached from whatever session held it, even when
    /// `session_id` turns out not to exist.
    pub fn associate_client(&self, client_id: &str, session_id: &str) -> bool {
        let mut clients = self.client_sessions.lock();
        if let Some(previous) = clients.remove(client_id) {
            if let Some(session) = self.get_session(&previous) {
                session.remove_client(client_id);
            }
        }

        let Some(session) = self.get_session(session_id) else {
            return false;
        };
        session.add_client(client_id);
        clients.insert(client_id.to_string(), session_id.to_string());
        debug!(client_id, session_id, "Client associated");
        true
    }

    /// Detach a client and return the session it belonged to.
    ///
    /// When the last client leaves a non-persistent session it is marked for
    /// the sweep rather than removed on the spot.
    pub fn dissociate_client(&self, client_id: &str) -> Option<String> {
        let mut clients = self.client_sessions.lock();
        let session_id = clients.remove(client_id)?;

        if let Some(session) = self.get_session(&session_id) {
            let now_empty = session.remove_client(client_id);
            if now_empty && !session.is_persistent() {
                session.schedule_cleanup();
                debug!(session_id = %session_id, "Last client left, cleanup scheduled");
            }
        }
        Some(session_id)
    }

    /// Remove a session, flushing and releasing its resources
    pub async fn remove_session(&self, session_id: &str) -> bool {
        let Some((_, session)) = self.sessions.remove(session_id) else {
            return false;
        };
        self.finish_removal(session).await;
        true
    }

    async fn finish_removal(&self, session: Arc<Session>) {
        let session_id = session.id().to_string();
        self.purge_clients(&session_id);
        self.memory.unregister(session.tracker());
        self.profiles.forget_session(&session_id);

        if let Err(e) = session.cleanup().await {
            warn!(session_id = %session_id, error = %e, "Session cleanup failed");
        }
        info!(session_id = %session_id, "Session removed");
    }

    fn purge_clients(&self, session_id: &str) {
        self.client_sessions
            .lock()
            .retain(|_, owner| owner != session_id);
    }

    /// One expiration pass; returns the number of sessions removed.
    ///
    /// The predicate is checked again at removal so a client reconnecting
    /// mid-pass keeps its session.
    pub async fn sweep_once(&self) -> usize {
        let now = Utc::now();
        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_expired_at(now) || entry.value().is_cleanup_scheduled())
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for session_id in candidates {
            let expired = self.sessions.remove_if(&session_id, |_, session| {
                session.is_expired_at(now) || session.is_cleanup_scheduled()
            });
            if let Some((_, session)) = expired {
                self.finish_removal(session).await;
                removed += 1;
            }
        }

        debug!(removed, remaining = self.sessions.len(), "Sweep pass finished");
        removed
    }

    /// Start the periodic sweep; no-op when already running
    pub fn start(self: &Arc<Self>) {
        let mut slot = self.sweep.lock();
        if slot.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak = Arc::downgrade(self);
        let period = self.config.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(registry) = weak.upgrade() else { break };
                        registry.sweep_once().await;
                    }
                }
            }
            debug!("Sweep task stopped");
        });

        *slot = Some(SweepTask { cancel, handle });
        info!(interval_secs = period.as_secs_f64(), "Session registry started");
    }

    pub fn is_running(&self) -> bool {
        self.sweep.lock().is_some()
    }

    /// Stop the sweep and wait for it to finish
    pub async fn stop(&self) {
        let task = self.sweep.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Sweep task failed");
                }
            }
        }
    }

    /// Stop the sweep, then clean up every remaining session concurrently
    pub async fn shutdown(&self) {
        self.stop().await;

        let ids: Vec<String> = self.sessions.iter().map(|entry| entry.key().clone()).collect();
        let sessions: Vec<Arc<Session>> = ids
            .iter()
            .filter_map(|id| self.sessions.remove(id).map(|(_, session)| session))
            .collect();
        self.client_sessions.lock().clear();

        let results = join_all(sessions.iter().map(|session| session.cleanup())).await;
        for (session, result) in sessions.iter().zip(results) {
            self.memory.unregister(session.tracker());
            self.profiles.forget_session(session.id());
            if let Err(e) = result {
                warn!(session_id = %session.id(), error = %e, "Session cleanup failed during shutdown");
            }
        }

        info!(sessions = sessions.len(), "Session registry shut down");
    }

    /// Live aggregate over every session
    pub fn stats(&self) -> RegistryStats {
        let mut sessions: Vec<SessionSummary> = self
            .sessions
            .iter()
            .map(|entry| entry.value().summary())
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        RegistryStats {
            active_sessions: sessions.len(),
            connected_clients: self.client_sessions.lock().len(),
            total_memory_mb: sessions.iter().map(|s| s.memory_mb).sum(),
            sessions,
        }
    }

    pub fn memory_report(&self) -> MemoryReport {
        let usages: Vec<SessionMemoryUsage> = self
            .sessions
            .iter()
            .map(|entry| entry.value().memory_usage())
            .collect();
        let total_memory_mb = usages.iter().map(|usage| usage.memory_mb).sum();
        let mut sessions_over_limit: Vec<SessionMemoryUsage> = usages
            .into_iter()
            .filter(|usage| !usage.bounds.within_bounds)
            .collect();
        sessions_over_limit.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        MemoryReport {
            total_sessions: self.sessions.len(),
            total_memory_mb,
            sessions_over_limit,
            memory_bounds: DefaultBounds {
                max_per_session_mb: self.config.session_defaults.max_memory_mb,
                max_state_size_kb: self.config.session_defaults.max_state_size_kb,
            },
            global: self.memory.global_usage(),
        }
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.len())
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ObjectKind;
    use tempfile::TempDir;

    fn registry() -> SessionRegistry {
        SessionRegistry::default()
    }

    #[tokio::test]
    async fn test_create_generates_id() {
        let registry = registry();
        let id = registry.create_session(None, None).await;
        assert!(!id.is_empty());
        assert!(registry.get_session(&id).is_some());
        assert_eq!(registry.memory().tracker_count(), 1);
    }

    #[tokio::test]
    async fn test_create_with_existing_id_is_idempotent() {
        let registry = registry();
        let id = registry.create_session(Some("s1".into()), None).await;
        let first = registry.get_session(&id).unwrap();
        let again = registry.create_session(Some("s1".into()), None).await;

        assert_eq!(id, again);
        assert_eq!(registry.session_count(), 1);
        assert!(Arc::ptr_eq(&first, &registry.get_session("s1").unwrap()));
    }

    #[tokio::test]
    async fn test_concurrent_create_same_id_yields_one_session() {
        let registry = Arc::new(registry());
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move { registry.create_session(Some("shared".into()), None).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap(), "shared");
        }
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.memory().tracker_count(), 1);
    }

    #[tokio::test]
    async fn test_default_config_takes_profile_memory_limit() {
        let registry = registry();
        let id = registry
            .create_session_of_type(None, SessionType::Vision, None)
            .await;
        let session = registry.get_session(&id).unwrap();
        assert_eq!(session.config().max_memory_mb, 256);
        assert_eq!(session.session_type(), SessionType::Vision);

        let explicit = registry
            .create_session(None, Some(SessionConfig::default().with_memory_limits(7, 8)))
            .await;
        assert_eq!(registry.get_session(&explicit).unwrap().config().max_memory_mb, 7);
    }

    #[tokio::test]
    async fn test_default_config_reads_profile_file() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ProfileLoader::new(Some(temp_dir.path().to_path_buf()));
        let mut profile = crate::session::SessionProfile::builtin(SessionType::Isolated);
        profile.limits.max_memory_mb = 96;
        loader.save(SessionType::Isolated, &profile).await.unwrap();

        let registry = SessionRegistry::new(RegistryConfig {
            profiles_dir: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        });
        let id = registry
            .create_session_of_type(None, SessionType::Isolated, None)
            .await;
        assert_eq!(registry.get_session(&id).unwrap().config().max_memory_mb, 96);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_create_and_remove_race_leaves_trackers_consistent() {
        let registry = Arc::new(registry());
        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                tokio::spawn(async move {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            registry.create_session(Some("contended".into()), None).await;
                        } else {
                            registry.remove_session("contended").await;
                        }
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        match registry.get_session("contended") {
            Some(session) => {
                let tracker = registry.memory().get_tracker("contended").unwrap();
                assert!(Arc::ptr_eq(&tracker, session.tracker()));
                assert!(!tracker.is_released());
            }
            None => assert!(registry.memory().get_tracker("contended").is_none()),
        }
        assert_eq!(registry.memory().tracker_count(), registry.session_count());
        registry.shutdown().await;
        assert_eq!(registry.memory().tracker_count(), 0);
    }

    #[tokio::test]
    async fn test_associate_moves_client_between_sessions() {
        let registry = registry();
        let a = registry.create_session(Some("a".into()), None).await;
        let b = registry.create_session(Some("b".into()), None).await;

        assert!(registry.associate_client("c1", &a));
        assert!(registry.associate_client("c1", &b));

        assert!(!registry.get_session(&a).unwrap().has_client("c1"));
        assert!(registry.get_session(&b).unwrap().has_client("c1"));
        assert_eq!(registry.get_session_by_client("c1").unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_associate_unknown_session_still_detaches() {
        let registry = registry();
        let a = registry.create_session(Some("a".into()), None).await;
        assert!(registry.associate_client("c1", &a));

        assert!(!registry.associate_client("c1", "missing"));
        assert!(!registry.get_session(&a).unwrap().has_client("c1"));
        assert!(registry.get_session_by_client("c1").is_none());
    }

    #[tokio::test]
    async fn test_dissociate_last_client_schedules_cleanup() {
        let registry = registry();
        let id = registry.create_session(None, None).await;
        registry.associate_client("c1", &id);
        registry.associate_client("c2", &id);

        assert_eq!(registry.dissociate_client("c1"), Some(id.clone()));
        assert!(!registry.get_session(&id).unwrap().is_cleanup_scheduled());
        assert_eq!(registry.dissociate_client("c2"), Some(id.clone()));
        assert!(registry.get_session(&id).unwrap().is_cleanup_scheduled());
        assert_eq!(registry.dissociate_client("c2"), None);
    }

    #[tokio::test]
    async fn test_dissociate_persistent_session_is_not_scheduled() {
        let registry = registry();
        let id = registry
            .create_session(None, Some(SessionConfig::default().with_persistent(true)))
            .await;
        registry.associate_client("c1", &id);
        registry.dissociate_client("c1");
        assert!(!registry.get_session(&id).unwrap().is_cleanup_scheduled());
    }

    #[tokio::test]
    async fn test_remove_session_purges_clients() {
        let registry = registry();
        let id = registry.create_session(None, None).await;
        registry.associate_client("c1", &id);
        let session = registry.get_session(&id).unwrap();

        assert!(registry.remove_session(&id).await);
        assert!(!registry.remove_session(&id).await);
        assert!(registry.get_session(&id).is_none());
        assert!(registry.get_session_by_client("c1").is_none());
        assert!(!session.is_active());
        assert_eq!(registry.memory().tracker_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_and_scheduled() {
        let registry = registry();
        let expired = registry
            .create_session(Some("expired".into()), Some(SessionConfig::default().with_idle_timeout(0)))
            .await;
        let scheduled = registry.create_session(Some("scheduled".into()), None).await;
        let kept = registry.create_session(Some("kept".into()), None).await;
        let persistent = registry
            .create_session(
                Some("persistent".into()),
                Some(SessionConfig::default().with_idle_timeout(0).with_persistent(true)),
            )
            .await;

        registry.associate_client("c1", &scheduled);
        registry.dissociate_client("c1");

        assert_eq!(registry.sweep_once().await, 2);
        assert!(registry.get_session(&expired).is_none());
        assert!(registry.get_session(&scheduled).is_none());
        assert!(registry.get_session(&kept).is_some());
        assert!(registry.get_session(&persistent).is_some());
    }

    #[tokio::test]
    async fn test_reconnect_before_sweep_keeps_session() {
        let registry = registry();
        let id = registry.create_session(None, None).await;
        registry.associate_client("c1", &id);
        registry.dissociate_client("c1");
        registry.associate_client("c1", &id);

        assert_eq!(registry.sweep_once().await, 0);
        assert!(registry.get_session(&id).is_some());
    }

    #[tokio::test]
    async fn test_background_sweep_runs_and_stops() {
        let registry = Arc::new(SessionRegistry::new(RegistryConfig {
            sweep_interval: Duration::from_millis(20),
            ..Default::default()
        }));
        registry
            .create_session(Some("idle".into()), Some(SessionConfig::default().with_idle_timeout(0)))
            .await;
        registry.start();
        assert!(registry.is_running());

        for _ in 0..100 {
            if registry.session_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(registry.session_count(), 0);

        registry.stop().await;
        assert!(!registry.is_running());
    }

    #[tokio::test]
    async fn test_shutdown_flushes_all_sessions() {
        let temp_dir = TempDir::new().unwrap();
        let registry = Arc::new(SessionRegistry::new(RegistryConfig {
            persistence_root: Some(temp_dir.path().to_path_buf()),
            ..Default::default()
        }));
        registry.start();
        for id in ["a", "b", "c"] {
            registry.create_session(Some(id.into()), None).await;
        }
        let sessions: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|id| registry.get_session(id).unwrap())
            .collect();

        registry.shutdown().await;
        assert_eq!(registry.session_count(), 0);
        assert!(!registry.is_running());
        for session in sessions {
            assert!(!session.is_active());
            assert!(temp_dir.path().join(session.id()).join("session_state.json").exists());
        }
    }

    #[tokio::test]
    async fn test_stats_and_memory_report() {
        let registry = registry();
        let small = registry
            .create_session(Some("small".into()), Some(SessionConfig::default().with_memory_limits(1, 1)))
            .await;
        registry.create_session(Some("roomy".into()), None).await;
        registry.associate_client("c1", &small);
        registry
            .get_session(&small)
            .unwrap()
            .tracker()
            .track_allocation(ObjectKind::State, 8 * 1024);

        let stats = registry.stats();
        assert_eq!(stats.active_sessions, 2);
        assert_eq!(stats.connected_clients, 1);
        assert_eq!(stats.sessions[0].session_id, "roomy");
        assert!(!stats.sessions[1].expired);

        let report = registry.memory_report();
        assert_eq!(report.total_sessions, 2);
        assert_eq!(report.sessions_over_limit.len(), 1);
        assert_eq!(report.sessions_over_limit[0].session_id, "small");
        assert_eq!(report.global.total_sessions, 2);
    }
}
