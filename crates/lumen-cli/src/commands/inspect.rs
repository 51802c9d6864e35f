//! `lumen inspect`: read-only views over persisted state documents

use super::{load_persisted, persisted_session_ids, print_json};
use anyhow::{Context, Result, anyhow};
use lumen_core::{StateComparison, diff_states, query_path};
use lumen_core::state::write_atomic;
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

#[derive(Debug, Serialize)]
struct PersistedSession {
    session_id: String,
    category: Option<String>,
    subnode: Option<String>,
    fields: usize,
    confirmed_nodes: usize,
}

pub async fn list(root: &Path) -> Result<()> {
    let mut sessions = Vec::new();
    for session_id in persisted_session_ids(root)? {
        let state = load_persisted(root, &session_id).await?;
        sessions.push(PersistedSession {
            category: state.current_category.map(|c| c.to_string()),
            subnode: state.current_subnode,
            fields: state.field_values.values().map(|values| values.len()).sum(),
            confirmed_nodes: state.confirmed_nodes.len(),
            session_id,
        });
    }
    print_json(&sessions)
}

async fn snapshot(root: &Path, session_id: &str) -> Result<Value> {
    let state = load_persisted(root, session_id).await?;
    Ok(serde_json::to_value(state)?)
}

pub async fn query(root: &Path, session_id: &str, path: &str) -> Result<Value> {
    let snapshot = snapshot(root, session_id).await?;
    let value = query_path(&snapshot, path)
        .cloned()
        .ok_or_else(|| anyhow!("Nothing at '{path}' in session '{session_id}'"))?;
    print_json(&value)?;
    Ok(value)
}

pub async fn diff(root: &Path, left: &str, right: &str) -> Result<StateComparison> {
    let differences = diff_states(&snapshot(root, left).await?, &snapshot(root, right).await?);
    let comparison = StateComparison {
        left_session: left.to_string(),
        right_session: right.to_string(),
        total_differences: differences.len(),
        differences,
    };
    print_json(&comparison)?;
    Ok(comparison)
}

pub async fn export(root: &Path, session_id: &str, output: &Path) -> Result<()> {
    let json = serde_json::to_vec_pretty(&snapshot(root, session_id).await?)?;
    write_atomic(output, &json)
        .await
        .with_context(|| format!("Writing {}", output.display()))?;
    println!("Exported '{session_id}' to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::state::{AppState, Category, FieldValue, FileStateStore, StateStore};
    use serde_json::json;
    use tempfile::TempDir;

    async fn persist(root: &Path, id: &str, state: &AppState) {
        FileStateStore::new(root, id).save(state).await.unwrap();
    }

    #[tokio::test]
    async fn test_query_and_diff_persisted() {
        let temp_dir = TempDir::new().unwrap();
        let mut state = AppState::default();
        state.current_category = Some(Category::System);
        state.set_field_value("power", "sleep_timer", FieldValue::Number(15.0));
        persist(temp_dir.path(), "a", &state).await;
        persist(temp_dir.path(), "b", &AppState::default()).await;

        let value = query(temp_dir.path(), "a", "field_values.power.sleep_timer").await.unwrap();
        assert_eq!(value, json!(15.0));
        assert!(query(temp_dir.path(), "a", "field_values.nope").await.is_err());

        let comparison = diff(temp_dir.path(), "a", "b").await.unwrap();
        assert_eq!(comparison.total_differences, 2);
    }

    #[tokio::test]
    async fn test_export_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        persist(temp_dir.path(), "a", &AppState::default()).await;
        let output = temp_dir.path().join("exports").join("a.json");

        export(temp_dir.path(), "a", &output).await.unwrap();
        let written: AppState = serde_json::from_slice(&std::fs::read(&output).unwrap()).unwrap();
        assert_eq!(written, AppState::default());
    }
}
