//! Per-session memory tracker
//!
//! Keeps a running total of tracked bytes, a state-specific subtotal and a
//! bounded history of snapshots. All figures are shallow estimates fed in by
//! the state manager; see [`super::estimate`].

use super::estimate::{ShallowSize, size_delta};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use sysinfo::{ProcessesToUpdate, System};
use tracing::debug;

/// Maximum number of snapshots kept per tracker
pub const MAX_SNAPSHOTS: usize = 100;

const BYTES_PER_KB: f64 = 1024.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// What a tracked object represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    State,
    StateManager,
    FieldValue,
    ConfirmedNode,
    Theme,
    Other,
}

impl ObjectKind {
    /// Whether bytes of this kind count towards the state subtotal
    pub fn is_state(self) -> bool {
        matches!(
            self,
            Self::State | Self::FieldValue | Self::ConfirmedNode | Self::Theme
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::State => "state",
            Self::StateManager => "state_manager",
            Self::FieldValue => "field_value",
            Self::ConfirmedNode => "confirmed_node",
            Self::Theme => "theme",
            Self::Other => "other",
        }
    }
}

/// Handle returned when an object starts being tracked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(u64);

struct TrackedObject {
    kind: ObjectKind,
    size: usize,
    /// Set for watched objects; the GC pass drops entries whose owner is gone
    liveness: Option<Weak<dyn Any + Send + Sync>>,
}

impl TrackedObject {
    fn is_dead(&self) -> bool {
        self.liveness
            .as_ref()
            .is_some_and(|weak| weak.strong_count() == 0)
    }
}

/// Point-in-time usage figures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub timestamp: DateTime<Utc>,
    pub total_memory_mb: f64,
    pub state_size_kb: f64,
    pub object_count: usize,
    pub process_memory_mb: f64,
}

/// Detailed tracker statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub session_id: String,
    pub total_memory_mb: f64,
    pub state_size_kb: f64,
    pub object_count: usize,
    pub objects_by_kind: BTreeMap<String, usize>,
    pub process_memory_mb: f64,
    pub memory_growth_mb: f64,
}

/// Before/after comparison of a garbage-collection pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GcReport {
    pub before: MemoryStats,
    pub after: MemoryStats,
    pub memory_freed_mb: f64,
    pub objects_freed: usize,
}

#[derive(Default)]
struct TrackerInner {
    objects: HashMap<ObjectId, TrackedObject>,
    total_bytes: i64,
    state_bytes: i64,
    snapshots: VecDeque<MemorySnapshot>,
    released: bool,
}

impl TrackerInner {
    fn apply(&mut self, delta: i64, counts_as_state: bool) {
        self.total_bytes = (self.total_bytes + delta).max(0);
        if counts_as_state {
            self.state_bytes = (self.state_bytes + delta).max(0);
        }
    }

    fn remove(&mut self, id: ObjectId) -> Option<TrackedObject> {
        let object = self.objects.remove(&id)?;
        self.apply(-(object.size as i64), object.kind.is_state());
        Some(object)
    }

    fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }

    fn state_kb(&self) -> f64 {
        self.state_bytes as f64 / BYTES_PER_KB
    }
}

/// Tracks approximate memory usage for one session
pub struct MemoryTracker {
    session_id: String,
    inner: Mutex<TrackerInner>,
    next_id: AtomicU64,
    initial_process_mb: f64,
}

impl MemoryTracker {
    /// Create a tracker for a session
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            inner: Mutex::new(TrackerInner::default()),
            next_id: AtomicU64::new(1),
            initial_process_mb: process_memory_mb(),
        }
    }

    /// Create a shared tracker
    pub fn shared(session_id: impl Into<String>) -> Arc<Self> {
        Arc::new(Self::new(session_id))
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn next_object_id(&self) -> ObjectId {
        ObjectId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Record an allocation of `size` bytes; it stays tracked until deleted
    pub fn track_allocation(&self, kind: ObjectKind, size: usize) -> ObjectId {
        self.insert(kind, size, None)
    }

    /// Track a shared object without keeping it alive.
    ///
    /// The entry is dropped by the next garbage-collection pass after the
    /// last strong reference goes away.
    pub fn watch_object<T: Any + Send + Sync>(&self, object: &Arc<T>, kind: ObjectKind) -> ObjectId {
        let weak: Weak<T> = Arc::downgrade(object);
        let weak: Weak<dyn Any + Send + Sync> = weak;
        self.insert(kind, size_of::<T>(), Some(weak))
    }

    fn insert(
        &self,
        kind: ObjectKind,
        size: usize,
        liveness: Option<Weak<dyn Any + Send + Sync>>,
    ) -> ObjectId {
        let id = self.next_object_id();
        let mut inner = self.inner.lock();
        inner.objects.insert(
            id,
            TrackedObject {
                kind,
                size,
                liveness,
            },
        );
        inner.apply(size as i64, kind.is_state());
        id
    }

    /// Stop tracking an object; returns false if it was not tracked
    pub fn track_object_deletion(&self, id: ObjectId) -> bool {
        self.inner.lock().remove(id).is_some()
    }

    /// Account for a field value being replaced
    pub fn track_field_change<V: ShallowSize + ?Sized>(
        &self,
        subnode_id: &str,
        field_id: &str,
        old: Option<&V>,
        new: &V,
    ) {
        let old_size = old.map_or(0, |value| value.shallow_size());
        let delta = size_delta(old_size, new.shallow_size());
        self.inner.lock().apply(delta, true);
        debug!(
            session_id = %self.session_id,
            subnode_id,
            field_id,
            delta,
            "Tracked field change"
        );
    }

    /// Account for a scalar piece of state (category, subnode) changing
    pub fn track_state_change<V: ShallowSize + ?Sized>(&self, change: &str, old: &V, new: &V) {
        let delta = size_delta(old.shallow_size(), new.shallow_size());
        self.inner.lock().apply(delta, true);
        debug!(session_id = %self.session_id, change, delta, "Tracked state change");
    }

    /// Account for a confirmed node being inserted or replaced
    pub fn track_confirmed_node_change<V: ShallowSize + ?Sized>(
        &self,
        node_id: &str,
        replaced: Option<&V>,
        inserted: &V,
    ) {
        let old_size = replaced.map_or(0, |value| value.shallow_size());
        let delta = size_delta(old_size, inserted.shallow_size());
        self.inner.lock().apply(delta, true);
        debug!(session_id = %self.session_id, node_id, delta, "Tracked confirmed node");
    }

    /// Account for every confirmed node being dropped
    pub fn track_confirmed_nodes_clear(&self, removed_count: usize, removed_bytes: usize) {
        self.inner.lock().apply(-(removed_bytes as i64), true);
        debug!(
            session_id = %self.session_id,
            removed_count,
            removed_bytes,
            "Tracked confirmed node clear"
        );
    }

    /// Account for a theme replacement
    pub fn track_theme_change<V: ShallowSize + ?Sized>(&self, old: &V, new: &V) {
        let delta = size_delta(old.shallow_size(), new.shallow_size());
        self.inner.lock().apply(delta, true);
    }

    pub fn total_bytes(&self) -> u64 {
        self.inner.lock().total_bytes as u64
    }

    pub fn state_bytes(&self) -> u64 {
        self.inner.lock().state_bytes as u64
    }

    /// Total tracked memory in MB
    pub fn total_memory_mb(&self) -> f64 {
        self.inner.lock().total_mb()
    }

    /// State-specific memory in KB
    pub fn state_size_kb(&self) -> f64 {
        self.inner.lock().state_kb()
    }

    /// Number of tracked objects
    pub fn object_count(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Detailed statistics
    pub fn stats(&self) -> MemoryStats {
        let process_mb = process_memory_mb();
        let inner = self.inner.lock();
        let mut objects_by_kind = BTreeMap::new();
        for object in inner.objects.values() {
            *objects_by_kind
                .entry(object.kind.as_str().to_string())
                .or_insert(0) += 1;
        }

        MemoryStats {
            session_id: self.session_id.clone(),
            total_memory_mb: inner.total_mb(),
            state_size_kb: inner.state_kb(),
            object_count: inner.objects.len(),
            objects_by_kind,
            process_memory_mb: process_mb,
            memory_growth_mb: process_mb - self.initial_process_mb,
        }
    }

    /// Record a snapshot of current usage, evicting the oldest beyond [`MAX_SNAPSHOTS`]
    pub fn take_snapshot(&self) -> MemorySnapshot {
        let process_mb = process_memory_mb();
        let mut inner = self.inner.lock();
        let snapshot = MemorySnapshot {
            timestamp: Utc::now(),
            total_memory_mb: inner.total_mb(),
            state_size_kb: inner.state_kb(),
            object_count: inner.objects.len(),
            process_memory_mb: process_mb,
        };

        inner.snapshots.push_back(snapshot.clone());
        while inner.snapshots.len() > MAX_SNAPSHOTS {
            inner.snapshots.pop_front();
        }

        snapshot
    }

    /// Most recent snapshots, oldest first
    pub fn snapshots(&self, limit: usize) -> Vec<MemorySnapshot> {
        let inner = self.inner.lock();
        let skip = inner.snapshots.len().saturating_sub(limit);
        inner.snapshots.iter().skip(skip).cloned().collect()
    }

    /// Drop tracked objects whose owners are gone and report what was freed
    pub fn force_garbage_collection(&self) -> GcReport {
        let before = self.stats();

        {
            let mut inner = self.inner.lock();
            let dead: Vec<ObjectId> = inner
                .objects
                .iter()
                .filter(|(_, object)| object.is_dead())
                .map(|(id, _)| *id)
                .collect();
            for id in dead {
                inner.remove(id);
            }
        }

        let after = self.stats();
        GcReport {
            memory_freed_mb: before.total_memory_mb - after.total_memory_mb,
            objects_freed: before.object_count.saturating_sub(after.object_count),
            before,
            after,
        }
    }

    /// Clear all tracked objects, totals and snapshots
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        inner.objects.clear();
        inner.snapshots.clear();
        inner.total_bytes = 0;
        inner.state_bytes = 0;
        inner.released = true;
        debug!(session_id = %self.session_id, "Memory tracker released");
    }

    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }
}

impl std::fmt::Debug for MemoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("MemoryTracker")
            .field("session_id", &self.session_id)
            .field("total_bytes", &inner.total_bytes)
            .field("state_bytes", &inner.state_bytes)
            .field("objects", &inner.objects.len())
            .finish()
    }
}

/// Resident memory of the current process in MB, or 0 when unavailable
fn process_memory_mb() -> f64 {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return 0.0;
    };
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
    system
        .process(pid)
        .map_or(0.0, |process| process.memory() as f64 / BYTES_PER_MB)
}
