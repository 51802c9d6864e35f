//! Session backup and type migration
//!
//! Layout under the backup root:
//! ```text
//! backup_root/
//!   {session_id}_{TYPE}_{YYYYmmdd_HHMMSS}/
//!     metadata.json
//!     state.json
//!   migrations/
//!     {session_id}_to_{TYPE}/
//!       migration.json
//! ```

use crate::error::{SessionError, SessionResult};
use crate::session::{Session, SessionRegistry, SessionType};
use crate::state::{AppState, write_atomic};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

/// Format version written into every backup
pub const BACKUP_VERSION: &str = "1.0";

const METADATA_FILE: &str = "metadata.json";
const STATE_FILE: &str = "state.json";
const MIGRATIONS_DIR: &str = "migrations";
const MIGRATION_FILE: &str = "migration.json";

/// Descriptor stored next to a backed-up state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub backup_name: String,
    pub session_id: String,
    pub session_type: SessionType,
    pub created_at: DateTime<Utc>,
    pub backup_version: String,
    /// Set on restore: the id the backup was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restored_at: Option<DateTime<Utc>>,
}

/// A backup read back from disk, with metadata rewritten for the new id
#[derive(Debug, Clone, PartialEq)]
pub struct RestoredBackup {
    pub metadata: BackupMetadata,
    pub state: AppState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationStatus {
    InProgress,
    Completed,
    Failed,
}

/// Record of one session type change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub migration_id: String,
    pub session_id: String,
    pub old_session_type: SessionType,
    pub new_session_type: SessionType,
    pub backup_name: String,
    pub migrated_at: DateTime<Utc>,
    pub status: MigrationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Writes, reads and prunes session backups
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn migrations_dir(&self) -> PathBuf {
        self.root.join(MIGRATIONS_DIR)
    }

    /// Path of the record for migrating `session_id` to `session_type`
    pub fn migration_path(&self, session_id: &str, session_type: SessionType) -> PathBuf {
        self.migrations_dir()
            .join(migration_id(session_id, session_type))
            .join(MIGRATION_FILE)
    }

    /// Back up a live session and return the backup name
    pub async fn create_backup(&self, session: &Session) -> SessionResult<String> {
        let state = session.state_manager().get_state_copy().await;
        self.backup_state(session.id(), session.session_type(), &state)
            .await
    }

    /// Back up a state value taken from anywhere.
    ///
    /// A directory left half-written by a failure is removed.
    pub async fn backup_state(
        &self,
        session_id: &str,
        session_type: SessionType,
        state: &AppState,
    ) -> SessionResult<String> {
        let created_at = Utc::now();
        let (backup_name, dir) = self
            .reserve_dir(session_id, session_type, created_at)
            .await?;

        let metadata = BackupMetadata {
            backup_name: backup_name.clone(),
            session_id: session_id.to_string(),
            session_type,
            created_at,
            backup_version: BACKUP_VERSION.to_string(),
            original_session_id: None,
            restored_at: None,
        };

        if let Err(e) = write_backup_files(&dir, &metadata, state).await {
            if let Err(cleanup) = fs::remove_dir_all(&dir).await {
                warn!(path = %dir.display(), error = %cleanup, "Failed to remove partial backup");
            }
            return Err(SessionError::backup(format!(
                "Failed to create backup {backup_name}: {e}"
            )));
        }

        info!(session_id, backup = %backup_name, "Backup created");
        Ok(backup_name)
    }

    /// Create a fresh directory for a backup, suffixing the name when a
    /// backup of the same session was taken within the same second
    async fn reserve_dir(
        &self,
        session_id: &str,
        session_type: SessionType,
        created_at: DateTime<Utc>,
    ) -> SessionResult<(String, PathBuf)> {
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SessionError::io_at(&self.root, e))?;

        let base = format!(
            "{session_id}_{session_type}_{}",
            created_at.format("%Y%m%d_%H%M%S")
        );
        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}_{attempt}")
            };
            let dir = self.root.join(&name);
            match fs::create_dir(&dir).await {
                Ok(()) => return Ok((name, dir)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(SessionError::io_at(&dir, e)),
            }
        }
    }

    /// Read a backup for use under `new_session_id`
    pub async fn restore_backup(
        &self,
        backup_name: &str,
        new_session_id: &str,
    ) -> SessionResult<RestoredBackup> {
        let dir = self.root.join(backup_name);
        if !fs::try_exists(&dir).await.unwrap_or(false) {
            return Err(SessionError::not_found(format!("backup {backup_name}")));
        }

        let mut metadata: BackupMetadata = read_json(&dir.join(METADATA_FILE)).await?;
        let state: AppState = read_json(&dir.join(STATE_FILE)).await?;

        metadata.original_session_id = Some(std::mem::replace(
            &mut metadata.session_id,
            new_session_id.to_string(),
        ));
        metadata.restored_at = Some(Utc::now());

        debug!(backup = backup_name, session_id = new_session_id, "Backup restored");
        Ok(RestoredBackup { metadata, state })
    }

    /// Restore a backup into a live session of the backed-up type.
    ///
    /// The session is created if `new_session_id` is not registered yet.
    pub async fn restore_into(
        &self,
        registry: &SessionRegistry,
        backup_name: &str,
        new_session_id: &str,
    ) -> SessionResult<RestoredBackup> {
        let restored = self.restore_backup(backup_name, new_session_id).await?;
        let session_id = registry
            .create_session_of_type(
                Some(new_session_id.to_string()),
                restored.metadata.session_type,
                None,
            )
            .await;
        let session = registry
            .get_session(&session_id)
            .ok_or_else(|| SessionError::not_found(format!("session {session_id}")))?;

        if !session
            .state_manager()
            .replace_state(restored.state.clone())
            .await
        {
            return Err(SessionError::Released(session_id));
        }
        info!(backup = backup_name, session_id = %session_id, "Backup applied to session");
        Ok(restored)
    }

    /// Metadata of every readable backup, newest first
    pub async fn list_backups(&self, session_id: Option<&str>) -> SessionResult<Vec<BackupMetadata>> {
        let mut backups = Vec::new();
        for (_, metadata) in self.scan().await? {
            if session_id.is_none_or(|id| metadata.session_id == id) {
                backups.push(metadata);
            }
        }
        backups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(backups)
    }

    /// Delete backups created more than `days_to_keep` days ago
    pub async fn cleanup_old_backups(&self, days_to_keep: u32) -> SessionResult<usize> {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(days_to_keep));
        let mut removed = 0;

        for (dir, metadata) in self.scan().await? {
            if metadata.created_at >= cutoff {
                continue;
            }
            match fs::remove_dir_all(&dir).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %dir.display(), error = %e, "Failed to remove old backup"),
            }
        }

        if removed > 0 {
            info!(removed, days_to_keep, "Old backups removed");
        }
        Ok(removed)
    }

    /// Backup directories with parseable metadata; others are skipped
    async fn scan(&self) -> SessionResult<Vec<(PathBuf, BackupMetadata)>> {
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::io_at(&self.root, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SessionError::io_at(&self.root, e))?
        {
            let path = entry.path();
            if path.file_name().is_some_and(|name| name == MIGRATIONS_DIR) {
                continue;
            }
            let metadata_path = path.join(METADATA_FILE);
            if !fs::try_exists(&metadata_path).await.unwrap_or(false) {
                continue;
            }
            match read_json::<BackupMetadata>(&metadata_path).await {
                Ok(metadata) => found.push((path, metadata)),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable backup"),
            }
        }
        Ok(found)
    }

    /// Change a session's declared type, keeping its id and state.
    ///
    /// The session is backed up first. The migration record moves from
    /// `in_progress` to `completed`, or to `failed` with the type restored.
    pub async fn migrate_session(
        &self,
        session: &Session,
        new_type: SessionType,
    ) -> SessionResult<MigrationRecord> {
        let old_type = session.session_type();
        let backup_name = self
            .create_backup(session)
            .await
            .map_err(|e| SessionError::migration(e.to_string()))?;

        let path = self.migration_path(session.id(), new_type);
        let mut record = MigrationRecord {
            migration_id: migration_id(session.id(), new_type),
            session_id: session.id().to_string(),
            old_session_type: old_type,
            new_session_type: new_type,
            backup_name,
            migrated_at: Utc::now(),
            status: MigrationStatus::InProgress,
            completed_at: None,
            error: None,
        };
        write_json(&path, &record)
            .await
            .map_err(|e| SessionError::migration(e.to_string()))?;

        session.set_session_type(new_type);
        record.status = MigrationStatus::Completed;
        record.completed_at = Some(Utc::now());

        if let Err(e) = write_json(&path, &record).await {
            session.set_session_type(old_type);
            record.status = MigrationStatus::Failed;
            record.completed_at = None;
            record.error = Some(e.to_string());
            if let Err(record_err) = write_json(&path, &record).await {
                warn!(
                    session_id = %record.session_id,
                    error = %record_err,
                    "Failed to record migration failure"
                );
            }
            return Err(SessionError::migration(e.to_string()));
        }

        info!(
            session_id = %record.session_id,
            from = %old_type,
            to = %new_type,
            "Session migrated"
        );
        Ok(record)
    }

    /// Read a migration record back
    pub async fn migration_record(
        &self,
        session_id: &str,
        session_type: SessionType,
    ) -> SessionResult<MigrationRecord> {
        read_json(&self.migration_path(session_id, session_type)).await
    }
}

fn migration_id(session_id: &str, session_type: SessionType) -> String {
    format!("{session_id}_to_{session_type}")
}

async fn write_backup_files(
    dir: &Path,
    metadata: &BackupMetadata,
    state: &AppState,
) -> SessionResult<()> {
    write_json(&dir.join(METADATA_FILE), metadata).await?;
    write_json(&dir.join(STATE_FILE), state).await
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> SessionResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json).await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> SessionResult<T> {
    let bytes = fs::read(path)
        .await
        .map_err(|e| SessionError::io_at(path, e))?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Category, FieldValue};
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn registry_with_session(id: &str) -> (Arc<SessionRegistry>, Arc<Session>) {
        let registry = Arc::new(SessionRegistry::default());
        registry.create_session(Some(id.to_string()), None).await;
        let session = registry.get_session(id).unwrap();
        session
            .state_manager()
            .update_field("input", "vad", FieldValue::Bool(false))
            .await;
        (registry, session)
    }

    #[tokio::test]
    async fn test_create_and_restore() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let (_registry, session) = registry_with_session("s1").await;

        let name = backups.create_backup(&session).await.unwrap();
        assert!(name.starts_with("s1_MAIN_"));
        assert!(temp_dir.path().join(&name).join("metadata.json").exists());
        assert!(temp_dir.path().join(&name).join("state.json").exists());

        let restored = backups.restore_backup(&name, "s2").await.unwrap();
        assert_eq!(restored.metadata.session_id, "s2");
        assert_eq!(restored.metadata.original_session_id.as_deref(), Some("s1"));
        assert!(restored.metadata.restored_at.is_some());
        assert_eq!(restored.state, session.state_manager().get_state_copy().await);
    }

    #[tokio::test]
    async fn test_restore_missing_backup() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let err = backups.restore_backup("nope", "s2").await.unwrap_err();
        assert!(matches!(err, SessionError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_same_second_backups_get_distinct_names() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let state = AppState::default();

        let first = backups.backup_state("s1", SessionType::Main, &state).await.unwrap();
        let second = backups.backup_state("s1", SessionType::Main, &state).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(backups.list_backups(Some("s1")).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_filters_and_skips_junk() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        backups.backup_state("a", SessionType::Main, &AppState::default()).await.unwrap();
        backups.backup_state("b", SessionType::Vision, &AppState::default()).await.unwrap();
        std::fs::create_dir_all(temp_dir.path().join("stray")).unwrap();
        std::fs::create_dir_all(temp_dir.path().join("corrupt")).unwrap();
        std::fs::write(temp_dir.path().join("corrupt").join("metadata.json"), "{").unwrap();

        assert_eq!(backups.list_backups(None).await.unwrap().len(), 2);
        let only_b = backups.list_backups(Some("b")).await.unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].session_type, SessionType::Vision);
        assert!(backups.list_backups(Some("c")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_on_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path().join("never-created"));
        assert!(backups.list_backups(None).await.unwrap().is_empty());
        assert_eq!(backups.cleanup_old_backups(0).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_old_backups_uses_metadata_time() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let old = backups.backup_state("old", SessionType::Main, &AppState::default()).await.unwrap();
        backups.backup_state("new", SessionType::Main, &AppState::default()).await.unwrap();

        let metadata_path = temp_dir.path().join(&old).join("metadata.json");
        let mut metadata: BackupMetadata =
            serde_json::from_slice(&std::fs::read(&metadata_path).unwrap()).unwrap();
        metadata.created_at = Utc::now() - ChronoDuration::days(45);
        std::fs::write(&metadata_path, serde_json::to_vec(&metadata).unwrap()).unwrap();

        assert_eq!(backups.cleanup_old_backups(30).await.unwrap(), 1);
        assert!(!temp_dir.path().join(&old).exists());
        let remaining = backups.list_backups(None).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].session_id, "new");
    }

    #[tokio::test]
    async fn test_migrate_keeps_id_and_state() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let (_registry, session) = registry_with_session("s1").await;
        let before = session.state_manager().get_state_copy().await;

        let record = backups.migrate_session(&session, SessionType::Vision).await.unwrap();
        assert_eq!(record.status, MigrationStatus::Completed);
        assert_eq!(record.old_session_type, SessionType::Main);
        assert_eq!(record.migration_id, "s1_to_VISION");
        assert!(record.completed_at.is_some());

        assert_eq!(session.id(), "s1");
        assert_eq!(session.session_type(), SessionType::Vision);
        assert_eq!(session.state_manager().get_state_copy().await, before);

        let stored = backups.migration_record("s1", SessionType::Vision).await.unwrap();
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_migrate_fails_when_record_cannot_be_written() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("migrations"), "blocker").unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let (_registry, session) = registry_with_session("s1").await;

        let err = backups.migrate_session(&session, SessionType::Isolated).await.unwrap_err();
        assert!(matches!(err, SessionError::Migration(_)));
        assert_eq!(session.session_type(), SessionType::Main);
    }

    #[tokio::test]
    async fn test_restore_into_creates_typed_session() {
        let temp_dir = TempDir::new().unwrap();
        let backups = BackupManager::new(temp_dir.path());
        let mut state = AppState::default();
        state.current_category = Some(Category::Monitor);
        let name = backups.backup_state("src", SessionType::Vision, &state).await.unwrap();

        let registry = SessionRegistry::default();
        backups.restore_into(&registry, &name, "dst").await.unwrap();

        let session = registry.get_session("dst").unwrap();
        assert_eq!(session.session_type(), SessionType::Vision);
        assert_eq!(session.state_manager().get_state_copy().await, state);
    }
}
