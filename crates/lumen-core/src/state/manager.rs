//! Isolated per-session state manager
//!
//! All reads and writes of one session's [`AppState`] go through a single
//! async mutex. Persistence I/O happens while that mutex is held, so a slow
//! disk stalls only this session; other sessions have their own managers.

use super::catalog;
use super::model::{AppState, Category, ConfirmedNode, FieldValue, FieldValues, NodeValues, SubnodeValues, ThemeUpdate};
use super::store::{FileStateStore, StateStore};
use crate::error::{SessionError, SessionResult};
use crate::memory::{MemoryTracker, ObjectKind, ShallowSize};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Default period of the background auto-save
pub const DEFAULT_AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(30);

/// Where the manager is in its persistence lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistencePhase {
    /// No store configured
    Unbound,
    /// Store configured, on-disk document matches memory
    Clean,
    /// Mutation applied, save not yet completed
    Dirty,
    /// Cleaned up; mutations are refused
    Released,
}

struct ManagerInner {
    state: AppState,
    phase: PersistencePhase,
}

struct AutoSaveTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns one session's application state
pub struct IsolatedStateManager {
    session_id: String,
    inner: Mutex<ManagerInner>,
    tracker: Arc<MemoryTracker>,
    store: Option<Arc<dyn StateStore>>,
    auto_save_interval: Duration,
    auto_save: parking_lot::Mutex<Option<AutoSaveTask>>,
}

impl IsolatedStateManager {
    /// Manager without persistence
    pub fn new(session_id: impl Into<String>, tracker: Arc<MemoryTracker>) -> Self {
        Self::build(session_id.into(), tracker, None)
    }

    /// Manager persisting through `store`
    pub fn with_store(
        session_id: impl Into<String>,
        tracker: Arc<MemoryTracker>,
        store: Arc<dyn StateStore>,
    ) -> Self {
        Self::build(session_id.into(), tracker, Some(store))
    }

    /// Manager persisting under `<root>/<session_id>/`
    pub fn persistent(
        session_id: impl Into<String>,
        tracker: Arc<MemoryTracker>,
        root: impl AsRef<Path>,
    ) -> Self {
        let session_id = session_id.into();
        let store = Arc::new(FileStateStore::new(root, &session_id));
        Self::build(session_id, tracker, Some(store))
    }

    fn build(
        session_id: String,
        tracker: Arc<MemoryTracker>,
        store: Option<Arc<dyn StateStore>>,
    ) -> Self {
        let state = AppState::default();
        tracker.track_allocation(ObjectKind::State, state.shallow_size());
        let phase = if store.is_some() {
            PersistencePhase::Clean
        } else {
            PersistencePhase::Unbound
        };

        Self {
            session_id,
            inner: Mutex::new(ManagerInner { state, phase }),
            tracker,
            store,
            auto_save_interval: DEFAULT_AUTO_SAVE_INTERVAL,
            auto_save: parking_lot::Mutex::new(None),
        }
    }

    /// Set the auto-save period
    pub fn with_auto_save_interval(mut self, interval: Duration) -> Self {
        self.auto_save_interval = interval;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn tracker(&self) -> &Arc<MemoryTracker> {
        &self.tracker
    }

    pub fn is_persistent(&self) -> bool {
        self.store.is_some()
    }

    pub async fn phase(&self) -> PersistencePhase {
        self.inner.lock().await.phase
    }

    /// Load persisted state, if any.
    ///
    /// A missing document leaves the default state. An unreadable or corrupt
    /// one is logged and treated as missing.
    pub async fn initialize(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return;
        }

        match store.load().await {
            Ok(Some(loaded)) => {
                self.tracker
                    .track_state_change("load", &inner.state, &loaded);
                inner.state = loaded;
                debug!(session_id = %self.session_id, "Restored persisted state");
            }
            Ok(None) => {
                debug!(session_id = %self.session_id, "No persisted state, starting empty");
            }
            Err(e) => {
                warn!(
                    session_id = %self.session_id,
                    location = %store.location(),
                    error = %e,
                    "Failed to load persisted state, starting empty"
                );
            }
        }
        inner.phase = PersistencePhase::Clean;
    }

    /// Independent copy of the current state
    pub async fn get_state_copy(&self) -> AppState {
        self.inner.lock().await.state.clone()
    }

    /// Change the current category; the current subnode is reset
    pub async fn set_category(&self, category: Option<Category>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return false;
        }

        let old_category = inner.state.current_category;
        let old_subnode = inner.state.current_subnode.take();
        inner.state.current_category = category;

        self.tracker
            .track_state_change("category", &old_category, &category);
        self.tracker
            .track_state_change("subnode", &old_subnode, &None);
        self.persist(&mut inner).await;
        true
    }

    /// Change the current subnode; not checked against the category
    pub async fn set_subnode(&self, subnode_id: Option<String>) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return false;
        }

        let old = std::mem::replace(&mut inner.state.current_subnode, subnode_id);
        self.tracker
            .track_state_change("subnode", &old, &inner.state.current_subnode);
        self.persist(&mut inner).await;
        true
    }

    /// Validate and store a field value.
    ///
    /// Returns false, leaving the state untouched, when the value does not
    /// fit the declared field.
    pub async fn update_field(&self, subnode_id: &str, field_id: &str, value: FieldValue) -> bool {
        if !catalog::validate_field_value(subnode_id, field_id, &value) {
            debug!(
                session_id = %self.session_id,
                subnode_id,
                field_id,
                "Rejected field value"
            );
            return false;
        }

        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return false;
        }

        let old = inner.state.field_value(subnode_id, field_id).cloned();
        self.tracker
            .track_field_change(subnode_id, field_id, old.as_ref(), &value);
        inner.state.set_field_value(subnode_id, field_id, value);
        self.persist(&mut inner).await;
        true
    }

    /// Confirm a subnode into the orbit and return its angle.
    ///
    /// The angle is `-90 + 45 * n` where `n` is the node count before the
    /// call. A subnode missing from the catalog records nothing, but the
    /// angle is still returned. `None` only after cleanup.
    pub async fn confirm_subnode(
        &self,
        category: Category,
        subnode_id: &str,
        values: NodeValues,
    ) -> Option<f64> {
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return None;
        }

        let orbit_angle = -90.0 + 45.0 * inner.state.confirmed_nodes.len() as f64;

        let Some(spec) = catalog::subnode(category, subnode_id) else {
            debug!(
                session_id = %self.session_id,
                %category,
                subnode_id,
                "Confirmed subnode not in catalog, nothing recorded"
            );
            return Some(orbit_angle);
        };

        let node = ConfirmedNode {
            id: subnode_id.to_string(),
            label: spec.label.to_string(),
            icon: spec.icon.to_string(),
            orbit_angle,
            values,
            category: category.as_str().to_string(),
        };
        let replaced = inner.state.confirmed_node(subnode_id).cloned();
        self.tracker
            .track_confirmed_node_change(subnode_id, replaced.as_ref(), &node);
        inner.state.upsert_confirmed_node(node);
        self.persist(&mut inner).await;
        Some(orbit_angle)
    }

    /// Merge the provided theme fields
    pub async fn update_theme(&self, update: &ThemeUpdate) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return false;
        }

        let old = inner.state.active_theme.clone();
        inner.state.active_theme.apply(update);
        self.tracker
            .track_theme_change(&old, &inner.state.active_theme);
        self.persist(&mut inner).await;
        true
    }

    pub async fn clear_confirmed_nodes(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return false;
        }

        let removed_bytes = inner.state.confirmed_nodes_size();
        let removed = std::mem::take(&mut inner.state.confirmed_nodes);
        self.tracker
            .track_confirmed_nodes_clear(removed.len(), removed_bytes);
        self.persist(&mut inner).await;
        true
    }

    /// Replace the whole state, e.g. with one restored from a backup
    pub async fn replace_state(&self, state: AppState) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return false;
        }

        self.tracker
            .track_state_change("replace", &inner.state, &state);
        inner.state = state;
        self.persist(&mut inner).await;
        true
    }

    pub async fn get_field_value(&self, subnode_id: &str, field_id: &str) -> Option<FieldValue> {
        self.inner
            .lock()
            .await
            .state
            .field_value(subnode_id, field_id)
            .cloned()
    }

    /// All stored values of one subnode
    pub async fn get_subnode_field_values(&self, subnode_id: &str) -> SubnodeValues {
        self.inner
            .lock()
            .await
            .state
            .field_values
            .get(subnode_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Stored values of every subnode the catalog places under `category`
    pub async fn get_category_field_values(&self, category: Category) -> FieldValues {
        let inner = self.inner.lock().await;
        inner
            .state
            .field_values
            .iter()
            .filter(|(subnode_id, _)| catalog::category_of(subnode_id) == Some(category))
            .map(|(subnode_id, values)| (subnode_id.clone(), values.clone()))
            .collect()
    }

    /// Size of the state serialized as JSON, in bytes
    pub async fn serialized_size(&self) -> usize {
        let inner = self.inner.lock().await;
        serde_json::to_vec(&inner.state).map_or(0, |bytes| bytes.len())
    }

    /// Save the full state now
    pub async fn save_now(&self) -> SessionResult<()> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return Err(SessionError::Released(self.session_id.clone()));
        }
        inner.phase = PersistencePhase::Dirty;
        store.save(&inner.state).await?;
        inner.phase = PersistencePhase::Clean;
        Ok(())
    }

    /// Persist after a mutation; failures are logged and the in-memory state kept
    async fn persist(&self, inner: &mut ManagerInner) {
        let Some(store) = &self.store else {
            return;
        };

        inner.phase = PersistencePhase::Dirty;
        match store.save(&inner.state).await {
            Ok(()) => inner.phase = PersistencePhase::Clean,
            Err(e) => warn!(
                session_id = %self.session_id,
                error = %e,
                "Failed to save session state"
            ),
        }
    }

    async fn auto_save_tick(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return;
        }

        inner.phase = PersistencePhase::Dirty;
        let result = match store.save(&inner.state).await {
            Ok(()) => store.save_projection(&inner.state).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => {
                inner.phase = PersistencePhase::Clean;
                debug!(session_id = %self.session_id, "Auto-saved session state");
            }
            Err(e) => warn!(session_id = %self.session_id, error = %e, "Auto-save failed"),
        }
    }

    /// Start the periodic background save.
    ///
    /// No-op without a store, after cleanup, or when already running. The
    /// task holds only a weak reference and stops once the manager is dropped.
    pub fn start_auto_save(self: &Arc<Self>) {
        if self.store.is_none() {
            return;
        }
        let mut slot = self.auto_save.lock();
        if slot.is_some() {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let weak = Arc::downgrade(self);
        let period = self.auto_save_interval;
        let session_id = self.session_id.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(manager) = weak.upgrade() else { break };
                        manager.auto_save_tick().await;
                    }
                }
            }
            debug!(session_id = %session_id, "Auto-save task stopped");
        });

        *slot = Some(AutoSaveTask { cancel, handle });
    }

    pub fn is_auto_saving(&self) -> bool {
        self.auto_save.lock().is_some()
    }

    /// Stop background saving, flush once more and release the tracker.
    ///
    /// Safe to call more than once; later calls do nothing. The state stays
    /// readable, but mutations are refused afterwards.
    pub async fn cleanup(&self) -> SessionResult<()> {
        let task = self.auto_save.lock().take();
        if let Some(task) = task {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                if !e.is_cancelled() {
                    warn!(session_id = %self.session_id, error = %e, "Auto-save task failed");
                }
            }
        }

        let mut inner = self.inner.lock().await;
        if inner.phase == PersistencePhase::Released {
            return Ok(());
        }

        let result = match &self.store {
            Some(store) => {
                inner.phase = PersistencePhase::Dirty;
                store.save(&inner.state).await
            }
            None => Ok(()),
        };

        inner.phase = PersistencePhase::Released;
        self.tracker.release();
        debug!(session_id = %self.session_id, "State manager released");
        result
    }
}

impl std::fmt::Debug for IsolatedStateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsolatedStateManager")
            .field("session_id", &self.session_id)
            .field("persistent", &self.store.is_some())
            .field("auto_save_interval", &self.auto_save_interval)
            .finish()
    }
}
