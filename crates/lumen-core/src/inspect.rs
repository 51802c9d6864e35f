//! Read-only state inspection
//!
//! Everything here works on a JSON copy of a session's state. The path and
//! diff helpers are plain functions so tooling can apply them to state files
//! read straight from disk.

use crate::error::{SessionError, SessionResult};
use crate::session::{SessionRegistry, SessionType};
use crate::state::write_atomic;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Resolve a dot-separated path; numeric segments index into arrays
pub fn query_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    path.split('.').try_fold(root, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

/// One differing top-level key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDiff {
    pub key: String,
    pub left: Option<Value>,
    pub right: Option<Value>,
}

/// Top-level keys whose values differ between two states, sorted by key
pub fn diff_states(left: &Value, right: &Value) -> Vec<StateDiff> {
    let empty = serde_json::Map::new();
    let left = left.as_object().unwrap_or(&empty);
    let right = right.as_object().unwrap_or(&empty);

    let keys: BTreeSet<&String> = left.keys().chain(right.keys()).collect();
    keys.into_iter()
        .filter_map(|key| {
            let (l, r) = (left.get(key), right.get(key));
            (l != r).then(|| StateDiff {
                key: key.clone(),
                left: l.cloned(),
                right: r.cloned(),
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateComparison {
    pub left_session: String,
    pub right_session: String,
    pub total_differences: usize,
    pub differences: Vec<StateDiff>,
}

/// Per-session line of the inspector summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectedSession {
    pub session_id: String,
    pub session_type: SessionType,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub active: bool,
    pub serialized_bytes: usize,
    pub memory_mb: f64,
}

/// Debug view over the sessions of a registry
#[derive(Debug, Clone)]
pub struct StateInspector {
    registry: Arc<SessionRegistry>,
}

impl StateInspector {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// JSON copy of a session's current state
    pub async fn snapshot(&self, session_id: &str) -> Option<Value> {
        let session = self.registry.get_session(session_id)?;
        let state = session.state_manager().get_state_copy().await;
        serde_json::to_value(state).ok()
    }

    pub async fn query(&self, session_id: &str, path: &str) -> Option<Value> {
        let snapshot = self.snapshot(session_id).await?;
        query_path(&snapshot, path).cloned()
    }

    /// `None` when either session is unknown
    pub async fn compare(&self, left: &str, right: &str) -> Option<StateComparison> {
        let left_state = self.snapshot(left).await?;
        let right_state = self.snapshot(right).await?;
        let differences = diff_states(&left_state, &right_state);

        Some(StateComparison {
            left_session: left.to_string(),
            right_session: right.to_string(),
            total_differences: differences.len(),
            differences,
        })
    }

    /// Write a session's state as pretty JSON
    pub async fn export(&self, session_id: &str, path: &Path) -> SessionResult<()> {
        let snapshot = self
            .snapshot(session_id)
            .await
            .ok_or_else(|| SessionError::not_found(format!("session {session_id}")))?;
        let json = serde_json::to_vec_pretty(&snapshot)?;
        write_atomic(path, &json).await?;
        debug!(session_id, path = %path.display(), "Exported session state");
        Ok(())
    }

    pub async fn sessions_summary(&self) -> Vec<InspectedSession> {
        let mut summary = Vec::new();
        for session_id in self.registry.session_ids() {
            let Some(session) = self.registry.get_session(&session_id) else {
                continue;
            };
            let config = session.config();
            summary.push(InspectedSession {
                session_id,
                session_type: session.session_type(),
                created_at: config.created_at,
                last_accessed: config.last_accessed,
                active: session.is_active(),
                serialized_bytes: session.state_manager().serialized_size().await,
                memory_mb: session.tracker().total_memory_mb(),
            });
        }
        summary
    }
}
