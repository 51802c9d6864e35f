//! Command implementations
//!
//! Commands read the persisted layout directly; none of them talks to a
//! running backend.

pub mod backup;
pub mod config;
pub mod inspect;
pub mod stats;

use anyhow::{Context, Result, anyhow};
use lumen_core::LumenConfig;
use lumen_core::state::{AppState, FileStateStore, STATE_FILE, StateStore};
use std::path::{Path, PathBuf};

/// Configured persistence root, or an error telling the operator to set one
pub fn persistence_root(config: &LumenConfig) -> Result<PathBuf> {
    config.persistence_root.clone().ok_or_else(|| {
        anyhow!("No persistence_root configured (set it in the config file or LUMEN_PERSISTENCE_ROOT)")
    })
}

/// Ids of every session directory holding a state document, sorted
pub fn persisted_session_ids(root: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Reading {}", root.display())),
    };

    let mut ids: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().join(STATE_FILE).is_file())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect();
    ids.sort();
    Ok(ids)
}

/// Load the persisted state of one session
pub async fn load_persisted(root: &Path, session_id: &str) -> Result<AppState> {
    let store = FileStateStore::new(root, session_id);
    store
        .load()
        .await
        .with_context(|| format!("Loading state of session '{session_id}'"))?
        .ok_or_else(|| anyhow!("No persisted state for session '{session_id}'"))
}

/// Print a value as pretty JSON on stdout
pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
