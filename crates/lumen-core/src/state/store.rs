//! State persistence
//!
//! Layout under the persistence root:
//!
//! ```text
//! <root>/<session_id>/session_state.json   full state, the only document read back
//! <root>/<session_id>/<category>.json      projection: that category's fields and nodes
//! <root>/<session_id>/theme.json           projection: active theme
//! ```
//!
//! Every file is written through a temp file, synced, then renamed over the
//! target so a crash never leaves a partially written document behind.

use super::catalog;
use super::model::{AppState, Category, ColorTheme, ConfirmedNode, SubnodeValues};
use crate::error::{SessionError, SessionResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// File name of the ground-truth state document
pub const STATE_FILE: &str = "session_state.json";

/// File name of the theme projection
pub const THEME_FILE: &str = "theme.json";

/// Persistence backend for one session's state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the saved state; `Ok(None)` when nothing was saved yet
    async fn load(&self) -> SessionResult<Option<AppState>>;

    /// Replace the saved state
    async fn save(&self, state: &AppState) -> SessionResult<()>;

    /// Refresh the derived, write-only projection files
    async fn save_projection(&self, state: &AppState) -> SessionResult<()>;

    /// Human-readable location for logs
    fn location(&self) -> String;
}

/// Per-category projection document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShard {
    pub fields: BTreeMap<String, SubnodeValues>,
    pub confirmed: Vec<ConfirmedNode>,
    pub last_updated: DateTime<Utc>,
}

impl CategoryShard {
    pub fn project(state: &AppState, category: Category) -> Self {
        let fields = state
            .field_values
            .iter()
            .filter(|(subnode_id, _)| catalog::category_of(subnode_id) == Some(category))
            .map(|(subnode_id, values)| (subnode_id.clone(), values.clone()))
            .collect();
        let confirmed = state
            .confirmed_nodes
            .iter()
            .filter(|node| node.category == category.as_str())
            .cloned()
            .collect();

        Self {
            fields,
            confirmed,
            last_updated: Utc::now(),
        }
    }
}

/// Theme projection document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeShard {
    #[serde(flatten)]
    pub theme: ColorTheme,
    pub last_updated: DateTime<Utc>,
}

/// Stores state as JSON files in a per-session directory
#[derive(Debug, Clone)]
pub struct FileStateStore {
    dir: PathBuf,
}

impl FileStateStore {
    /// Store rooted at `<root>/<session_id>`
    pub fn new(root: impl AsRef<Path>, session_id: &str) -> Self {
        Self {
            dir: root.as_ref().join(session_id),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.join(STATE_FILE)
    }

    pub fn shard_path(&self, category: Category) -> PathBuf {
        self.dir.join(format!("{category}.json"))
    }

    pub fn theme_path(&self) -> PathBuf {
        self.dir.join(THEME_FILE)
    }

    async fn write_json<T: Serialize + Sync>(&self, path: &Path, value: &T) -> SessionResult<()> {
        let json = serde_json::to_vec_pretty(value)?;
        write_atomic(path, &json).await
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self) -> SessionResult<Option<AppState>> {
        let path = self.state_path();
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SessionError::io_at(&path, e)),
        };

        let state = serde_json::from_slice(&content)?;
        debug!(path = %path.display(), "Loaded session state");
        Ok(Some(state))
    }

    async fn save(&self, state: &AppState) -> SessionResult<()> {
        let path = self.state_path();
        self.write_json(&path, state).await?;
        debug!(path = %path.display(), "Saved session state");
        Ok(())
    }

    async fn save_projection(&self, state: &AppState) -> SessionResult<()> {
        for category in Category::ALL {
            let shard = CategoryShard::project(state, category);
            self.write_json(&self.shard_path(category), &shard).await?;
        }

        let theme = ThemeShard {
            theme: state.active_theme.clone(),
            last_updated: Utc::now(),
        };
        self.write_json(&self.theme_path(), &theme).await
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}

/// Write `bytes` to `path` via a synced temp file and rename.
///
/// Creates the parent directory when missing.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> SessionResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| SessionError::io_at(parent, e))?;
    }

    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);

    let mut file = fs::File::create(&temp_path)
        .await
        .map_err(|e| SessionError::io_at(&temp_path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| SessionError::io_at(&temp_path, e))?;
    file.flush()
        .await
        .map_err(|e| SessionError::io_at(&temp_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| SessionError::io_at(&temp_path, e))?;
    drop(file);

    fs::rename(&temp_path, path)
        .await
        .map_err(|e| SessionError::io_at(path, e))?;

    Ok(())
}
