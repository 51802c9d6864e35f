//! `lumen stats`: load persisted sessions into a scratch registry and report

use super::{load_persisted, persisted_session_ids, print_json};
use anyhow::Result;
use lumen_core::session::{MemoryReport, RegistryConfig, RegistryStats};
use lumen_core::{LumenConfig, SessionConfig, SessionRegistry};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub stats: RegistryStats,
    pub memory: MemoryReport,
}

/// Loaded copies never write back: the scratch registry has no persistence root
pub async fn run(config: &LumenConfig, root: &Path) -> Result<StatsReport> {
    let registry = SessionRegistry::new(RegistryConfig {
        persistence_root: None,
        ..config.registry_config()
    });

    for session_id in persisted_session_ids(root)? {
        let state = load_persisted(root, &session_id).await?;
        let session_config = SessionConfig::from_defaults(&config.session).with_persistent(true);
        registry
            .create_session(Some(session_id.clone()), Some(session_config))
            .await;
        if let Some(session) = registry.get_session(&session_id) {
            session.state_manager().replace_state(state).await;
        }
    }

    let report = StatsReport {
        stats: registry.stats(),
        memory: registry.memory_report(),
    };
    registry.shutdown().await;
    print_json(&report)?;
    Ok(report)
}
