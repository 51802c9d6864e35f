//! A single session: state manager, tracker, clients and config

use super::types::{SessionConfig, SessionType};
use crate::error::SessionResult;
use crate::memory::{BoundsCheck, MemoryBounds, MemoryTracker, ObjectKind};
use crate::state::IsolatedStateManager;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Memory figures of one session evaluated against its bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemoryUsage {
    pub session_id: String,
    pub memory_mb: f64,
    pub state_size_kb: f64,
    pub object_count: usize,
    pub bounds: BoundsCheck,
}

/// Read-only summary used by registry reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub session_type: SessionType,
    pub clients: usize,
    pub memory_mb: f64,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub expired: bool,
    pub active: bool,
    pub cleanup_scheduled: bool,
    pub persistent: bool,
}

/// An isolated unit of per-client state
pub struct Session {
    id: String,
    session_type: RwLock<SessionType>,
    config: RwLock<SessionConfig>,
    clients: Mutex<HashSet<String>>,
    active: AtomicBool,
    cleanup_scheduled: AtomicBool,
    cleaned_up: AtomicBool,
    state_manager: Arc<IsolatedStateManager>,
    tracker: Arc<MemoryTracker>,
    bounds: MemoryBounds,
}

impl Session {
    /// Bind a state manager and its tracker into a session.
    ///
    /// The tracker must be the one the manager reports into.
    pub fn new(
        id: impl Into<String>,
        session_type: SessionType,
        config: SessionConfig,
        state_manager: Arc<IsolatedStateManager>,
    ) -> Self {
        let tracker = Arc::clone(state_manager.tracker());
        tracker.watch_object(&state_manager, ObjectKind::StateManager);
        let bounds = config.bounds();

        Self {
            id: id.into(),
            session_type: RwLock::new(session_type),
            config: RwLock::new(config),
            clients: Mutex::new(HashSet::new()),
            active: AtomicBool::new(true),
            cleanup_scheduled: AtomicBool::new(false),
            cleaned_up: AtomicBool::new(false),
            state_manager,
            tracker,
            bounds,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_type(&self) -> SessionType {
        *self.session_type.read()
    }

    pub(crate) fn set_session_type(&self, session_type: SessionType) {
        *self.session_type.write() = session_type;
    }

    /// Copy of the current config
    pub fn config(&self) -> SessionConfig {
        self.config.read().clone()
    }

    pub fn is_persistent(&self) -> bool {
        self.config.read().is_persistent
    }

    pub fn state_manager(&self) -> &Arc<IsolatedStateManager> {
        &self.state_manager
    }

    pub fn tracker(&self) -> &Arc<MemoryTracker> {
        &self.tracker
    }

    pub fn bounds(&self) -> &MemoryBounds {
        &self.bounds
    }

    /// Record activity now
    pub fn touch(&self) {
        self.config.write().last_accessed = Utc::now();
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_cleanup_scheduled(&self) -> bool {
        self.cleanup_scheduled.load(Ordering::Acquire)
    }

    pub(crate) fn schedule_cleanup(&self) {
        self.cleanup_scheduled.store(true, Ordering::Release);
    }

    pub fn connected_clients(&self) -> Vec<String> {
        let mut clients: Vec<String> = self.clients.lock().iter().cloned().collect();
        clients.sort();
        clients
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().len()
    }

    pub fn has_client(&self, client_id: &str) -> bool {
        self.clients.lock().contains(client_id)
    }

    /// Attach a client; a reconnect withdraws a pending cleanup mark
    pub(crate) fn add_client(&self, client_id: &str) {
        self.clients.lock().insert(client_id.to_string());
        self.cleanup_scheduled.store(false, Ordering::Release);
    }

    /// Detach a client; returns whether the client set is now empty
    pub(crate) fn remove_client(&self, client_id: &str) -> bool {
        let mut clients = self.clients.lock();
        clients.remove(client_id);
        clients.is_empty()
    }

    /// Whether the sweep may expire this session now
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Expiry predicate evaluated at `now`.
    ///
    /// Requires no connected clients, a non-persistent config and an idle
    /// time of at least the configured timeout.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        if !self.clients.lock().is_empty() {
            return false;
        }
        let config = self.config.read();
        if config.is_persistent {
            return false;
        }
        now - config.last_accessed >= config.idle_timeout()
    }

    /// Tracker figures evaluated against this session's bounds
    pub fn memory_usage(&self) -> SessionMemoryUsage {
        let memory_mb = self.tracker.total_memory_mb();
        let state_size_kb = self.tracker.state_size_kb();

        SessionMemoryUsage {
            session_id: self.id.clone(),
            memory_mb,
            state_size_kb,
            object_count: self.tracker.object_count(),
            bounds: self.bounds.check_bounds(memory_mb, state_size_kb),
        }
    }

    pub fn summary(&self) -> SessionSummary {
        let config = self.config();
        SessionSummary {
            session_id: self.id.clone(),
            session_type: self.session_type(),
            clients: self.client_count(),
            memory_mb: self.tracker.total_memory_mb(),
            created_at: config.created_at,
            last_accessed: config.last_accessed,
            expired: self.is_expired(),
            active: self.is_active(),
            cleanup_scheduled: self.is_cleanup_scheduled(),
            persistent: config.is_persistent,
        }
    }

    /// Drop a session that was built but never published
    pub(crate) fn discard(&self) {
        self.cleaned_up.store(true, Ordering::Release);
        self.active.store(false, Ordering::Release);
        self.tracker.release();
    }

    /// Stop background work, flush state and release the tracker.
    ///
    /// Only the first call does anything.
    pub async fn cleanup(&self) -> SessionResult<()> {
        if self.cleaned_up.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.active.store(false, Ordering::Release);

        let result = self.state_manager.cleanup().await;
        self.tracker.release();
        debug!(session_id = %self.id, "Session cleaned up");
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("session_type", &self.session_type())
            .field("clients", &self.client_count())
            .field("active", &self.is_active())
            .finish()
    }
}
