//! `lumen backup`

use super::{load_persisted, print_json};
use anyhow::{Context, Result, bail};
use lumen_core::state::{FileStateStore, StateStore};
use lumen_core::{BackupManager, MigrationRecord, SessionRegistry, SessionType};
use std::path::Path;

pub async fn create(
    backups: &BackupManager,
    root: &Path,
    session_id: &str,
    session_type: SessionType,
) -> Result<String> {
    let state = load_persisted(root, session_id).await?;
    let name = backups.backup_state(session_id, session_type, &state).await?;
    println!("Created backup {name}");
    Ok(name)
}

pub async fn list(backups: &BackupManager, session_id: Option<&str>) -> Result<()> {
    print_json(&backups.list_backups(session_id).await?)
}

/// Write a backup's state as the persisted state of `new_session_id`
pub async fn restore(
    backups: &BackupManager,
    root: &Path,
    backup_name: &str,
    new_session_id: &str,
    force: bool,
) -> Result<()> {
    let restored = backups.restore_backup(backup_name, new_session_id).await?;
    let store = FileStateStore::new(root, new_session_id);
    if store.state_path().exists() && !force {
        bail!("Session '{new_session_id}' already has persisted state (use --force to replace it)");
    }

    store
        .save(&restored.state)
        .await
        .with_context(|| format!("Writing state of '{new_session_id}'"))?;
    print_json(&restored.metadata)
}

/// Back up a persisted session and record its move to `to`
pub async fn migrate(
    backups: &BackupManager,
    root: &Path,
    session_id: &str,
    from: SessionType,
    to: SessionType,
) -> Result<MigrationRecord> {
    let state = load_persisted(root, session_id).await?;
    let registry = SessionRegistry::default();
    registry
        .create_session_of_type(Some(session_id.to_string()), from, None)
        .await;
    let session = registry
        .get_session(session_id)
        .context("Session vanished while migrating")?;
    session.state_manager().replace_state(state).await;

    let result = backups.migrate_session(&session, to).await;
    registry.shutdown().await;

    let record = result?;
    print_json(&record)?;
    Ok(record)
}

pub async fn prune(backups: &BackupManager, days: u32) -> Result<usize> {
    let removed = backups.cleanup_old_backups(days).await?;
    println!("Removed {removed} backup(s) older than {days} day(s)");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::MigrationStatus;
    use lumen_core::state::{AppState, Category};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_restore_and_migrate() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("sessions");
        let backups = BackupManager::new(temp_dir.path().join("backups"));

        let mut state = AppState::default();
        state.current_category = Some(Category::Agent);
        FileStateStore::new(&root, "s1").save(&state).await.unwrap();

        let name = create(&backups, &root, "s1", SessionType::Main).await.unwrap();
        restore(&backups, &root, &name, "s2", false).await.unwrap();
        assert_eq!(load_persisted(&root, "s2").await.unwrap(), state);
        assert!(restore(&backups, &root, &name, "s2", false).await.is_err());

        let record = migrate(&backups, &root, "s1", SessionType::Main, SessionType::Isolated)
            .await
            .unwrap();
        assert_eq!(record.status, MigrationStatus::Completed);
        assert_eq!(backups.list_backups(Some("s1")).await.unwrap().len(), 2);
        assert_eq!(prune(&backups, 30).await.unwrap(), 0);
    }
}
