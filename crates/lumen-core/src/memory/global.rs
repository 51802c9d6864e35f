//! Process-wide memory aggregation across session trackers

use super::bounds::MemoryBounds;
use super::tracker::{GcReport, MemoryTracker};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Per-session line of a global usage report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMemoryLine {
    pub session_id: String,
    pub memory_mb: f64,
    pub state_kb: f64,
    pub objects: usize,
}

/// Usage summed over every registered tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMemoryUsage {
    pub total_sessions: usize,
    pub total_memory_mb: f64,
    pub total_state_kb: f64,
    pub total_objects: usize,
    pub within_global_bounds: bool,
    pub memory_usage_percent: f64,
    pub state_usage_percent: f64,
    pub sessions: Vec<SessionMemoryLine>,
}

/// Result of a garbage-collection pass over every tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalGcReport {
    pub session_results: BTreeMap<String, GcReport>,
    pub total_memory_freed_mb: f64,
    pub global_stats_after: GlobalMemoryUsage,
}

/// Holds one tracker per active session and evaluates the global ceiling
pub struct GlobalMemoryManager {
    trackers: DashMap<String, Arc<MemoryTracker>>,
    bounds: MemoryBounds,
}

impl Default for GlobalMemoryManager {
    fn default() -> Self {
        Self::new(MemoryBounds::global())
    }
}

impl GlobalMemoryManager {
    pub fn new(bounds: MemoryBounds) -> Self {
        Self {
            trackers: DashMap::new(),
            bounds,
        }
    }

    pub fn bounds(&self) -> &MemoryBounds {
        &self.bounds
    }

    /// Create and register a fresh tracker for a session
    pub fn create_tracker(&self, session_id: &str) -> Arc<MemoryTracker> {
        let tracker = MemoryTracker::shared(session_id);
        self.register(Arc::clone(&tracker));
        tracker
    }

    /// Register an existing tracker under its session id
    pub fn register(&self, tracker: Arc<MemoryTracker>) {
        self.trackers
            .insert(tracker.session_id().to_string(), tracker);
    }

    pub fn get_tracker(&self, session_id: &str) -> Option<Arc<MemoryTracker>> {
        self.trackers.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregister a tracker and release it
    pub fn remove_tracker(&self, session_id: &str) -> bool {
        match self.trackers.remove(session_id) {
            Some((_, tracker)) => {
                tracker.release();
                debug!(session_id, "Removed memory tracker");
                true
            }
            None => false,
        }
    }

    /// Remove `tracker` only if it is still the one registered for its session
    pub fn unregister(&self, tracker: &Arc<MemoryTracker>) -> bool {
        let removed = self
            .trackers
            .remove_if(tracker.session_id(), |_, current| Arc::ptr_eq(current, tracker));
        tracker.release();
        if removed.is_some() {
            debug!(session_id = tracker.session_id(), "Removed memory tracker");
        }
        removed.is_some()
    }

    pub fn tracker_count(&self) -> usize {
        self.trackers.len()
    }

    /// Sum usage across all trackers and compare it to the global ceiling
    pub fn global_usage(&self) -> GlobalMemoryUsage {
        let mut sessions: Vec<SessionMemoryLine> = self
            .trackers
            .iter()
            .map(|entry| {
                let tracker = entry.value();
                SessionMemoryLine {
                    session_id: entry.key().clone(),
                    memory_mb: tracker.total_memory_mb(),
                    state_kb: tracker.state_size_kb(),
                    objects: tracker.object_count(),
                }
            })
            .collect();
        sessions.sort_by(|a, b| a.session_id.cmp(&b.session_id));

        let total_memory_mb: f64 = sessions.iter().map(|s| s.memory_mb).sum();
        let total_state_kb: f64 = sessions.iter().map(|s| s.state_kb).sum();
        let total_objects = sessions.iter().map(|s| s.objects).sum();
        let check = self.bounds.check_bounds(total_memory_mb, total_state_kb);

        GlobalMemoryUsage {
            total_sessions: sessions.len(),
            total_memory_mb,
            total_state_kb,
            total_objects,
            within_global_bounds: check.within_bounds,
            memory_usage_percent: check.memory_usage_percent,
            state_usage_percent: check.state_usage_percent,
            sessions,
        }
    }

    /// Run a garbage-collection pass on every tracker
    pub fn force_global_garbage_collection(&self) -> GlobalGcReport {
        let trackers: Vec<(String, Arc<MemoryTracker>)> = self
            .trackers
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        let mut session_results = BTreeMap::new();
        let mut total_memory_freed_mb = 0.0;
        for (session_id, tracker) in trackers {
            let report = tracker.force_garbage_collection();
            total_memory_freed_mb += report.memory_freed_mb;
            session_results.insert(session_id, report);
        }

        GlobalGcReport {
            session_results,
            total_memory_freed_mb,
            global_stats_after: self.global_usage(),
        }
    }
}
