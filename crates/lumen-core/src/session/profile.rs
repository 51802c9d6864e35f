//! Per-type session profiles
//!
//! A profile describes what a session type may do and how much it may use.
//! Profiles live in `<profiles_dir>/<type>_config.json`; a missing or
//! unreadable file falls back to the built-in profile for that type.

use super::types::SessionType;
use crate::error::{SessionError, SessionResult};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFeatures {
    pub file_management: bool,
    pub gui_automation: bool,
    pub system_commands: bool,
    pub vision: bool,
    pub web_access: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileLimits {
    pub max_memory_mb: u64,
    pub max_file_size_mb: u64,
    pub max_concurrent_operations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPolicy {
    pub require_confirmation: bool,
    pub allow_dangerous_commands: bool,
    pub log_all_operations: bool,
}

/// Feature, resource and security policy of a session type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionProfile {
    pub name: String,
    pub description: String,
    pub features: ProfileFeatures,
    pub limits: ProfileLimits,
    pub security: SecurityPolicy,
}

impl SessionProfile {
    /// Built-in profile for a session type
    pub fn builtin(session_type: SessionType) -> Self {
        match session_type {
            SessionType::Main => Self {
                name: "Main Session".to_string(),
                description: "Full access session with all features enabled".to_string(),
                features: ProfileFeatures {
                    file_management: true,
                    gui_automation: true,
                    system_commands: true,
                    vision: true,
                    web_access: true,
                },
                limits: ProfileLimits {
                    max_memory_mb: 512,
                    max_file_size_mb: 100,
                    max_concurrent_operations: 10,
                },
                security: SecurityPolicy {
                    require_confirmation: false,
                    allow_dangerous_commands: true,
                    log_all_operations: true,
                },
            },
            SessionType::Vision => Self {
                name: "Vision Session".to_string(),
                description: "Session optimized for vision and automation tasks".to_string(),
                features: ProfileFeatures {
                    file_management: true,
                    gui_automation: true,
                    system_commands: false,
                    vision: true,
                    web_access: false,
                },
                limits: ProfileLimits {
                    max_memory_mb: 256,
                    max_file_size_mb: 50,
                    max_concurrent_operations: 5,
                },
                security: SecurityPolicy {
                    require_confirmation: true,
                    allow_dangerous_commands: false,
                    log_all_operations: true,
                },
            },
            SessionType::Isolated => Self {
                name: "Isolated Session".to_string(),
                description: "Restricted session for safe operations".to_string(),
                features: ProfileFeatures {
                    file_management: true,
                    gui_automation: false,
                    system_commands: false,
                    vision: false,
                    web_access: false,
                },
                limits: ProfileLimits {
                    max_memory_mb: 128,
                    max_file_size_mb: 10,
                    max_concurrent_operations: 2,
                },
                security: SecurityPolicy {
                    require_confirmation: true,
                    allow_dangerous_commands: false,
                    log_all_operations: true,
                },
            },
        }
    }
}

/// Loads profiles from disk and caches per-session copies
#[derive(Debug, Default)]
pub struct ProfileLoader {
    dir: Option<PathBuf>,
    cache: DashMap<(String, SessionType), SessionProfile>,
}

impl ProfileLoader {
    /// Loader reading from `dir`; `None` always yields built-in profiles
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            cache: DashMap::new(),
        }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn profile_path(&self, session_type: SessionType) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}_config.json", session_type.file_stem())))
    }

    /// Profile for a type, from disk when available
    pub async fn load(&self, session_type: SessionType) -> SessionProfile {
        let Some(path) = self.profile_path(session_type) else {
            return SessionProfile::builtin(session_type);
        };

        match read_profile(&path).await {
            Ok(Some(profile)) => profile,
            Ok(None) => SessionProfile::builtin(session_type),
            Err(e) => {
                warn!(
                    session_type = %session_type,
                    path = %path.display(),
                    error = %e,
                    "Failed to load session profile, using built-in"
                );
                SessionProfile::builtin(session_type)
            }
        }
    }

    /// Write a profile for a type
    pub async fn save(&self, session_type: SessionType, profile: &SessionProfile) -> SessionResult<()> {
        let path = self
            .profile_path(session_type)
            .ok_or_else(|| SessionError::config("No profiles directory configured"))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::io_at(parent, e))?;
        }

        let json = serde_json::to_string_pretty(profile)?;
        fs::write(&path, json)
            .await
            .map_err(|e| SessionError::io_at(&path, e))?;
        debug!(session_type = %session_type, path = %path.display(), "Saved session profile");
        Ok(())
    }

    /// Profile of one session, loaded on first use and cached.
    ///
    /// No cache guard is held while the file is read; if two callers race,
    /// the first insert wins and both return it.
    pub async fn session_profile(&self, session_id: &str, session_type: SessionType) -> SessionProfile {
        let key = (session_id.to_string(), session_type);
        if let Some(cached) = self.cache.get(&key) {
            return cached.value().clone();
        }

        let loaded = self.load(session_type).await;
        self.cache.entry(key).or_insert(loaded).value().clone()
    }

    /// Modify the cached profile of one session and return the result
    pub async fn update_session_profile(
        &self,
        session_id: &str,
        session_type: SessionType,
        update: impl FnOnce(&mut SessionProfile),
    ) -> SessionProfile {
        let current = self.session_profile(session_id, session_type).await;
        let mut entry = self
            .cache
            .entry((session_id.to_string(), session_type))
            .or_insert(current);
        update(entry.value_mut());
        entry.value().clone()
    }

    /// Drop every cached profile of a session
    pub fn forget_session(&self, session_id: &str) {
        self.cache.retain(|(id, _), _| id != session_id);
    }
}

async fn read_profile(path: &Path) -> SessionResult<Option<SessionProfile>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(SessionError::io_at(path, e)),
    };
    Ok(Some(serde_json::from_str(&content)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_limits() {
        assert_eq!(SessionProfile::builtin(SessionType::Main).limits.max_memory_mb, 512);
        assert_eq!(SessionProfile::builtin(SessionType::Vision).limits.max_memory_mb, 256);
        assert_eq!(SessionProfile::builtin(SessionType::Isolated).limits.max_memory_mb, 128);
        assert!(!SessionProfile::builtin(SessionType::Isolated).features.vision);
    }

    #[tokio::test]
    async fn test_missing_dir_uses_builtin() {
        let loader = ProfileLoader::new(None);
        assert_eq!(
            loader.load(SessionType::Vision).await,
            SessionProfile::builtin(SessionType::Vision)
        );
        assert!(
            loader
                .save(SessionType::Vision, &SessionProfile::builtin(SessionType::Vision))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ProfileLoader::new(Some(temp_dir.path().to_path_buf()));
        let mut profile = SessionProfile::builtin(SessionType::Main);
        profile.limits.max_memory_mb = 2048;

        loader.save(SessionType::Main, &profile).await.unwrap();
        assert!(temp_dir.path().join("main_config.json").exists());
        assert_eq!(loader.load(SessionType::Main).await.limits.max_memory_mb, 2048);
    }

    #[tokio::test]
    async fn test_corrupt_file_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("vision_config.json"), "not json")
            .await
            .unwrap();
        let loader = ProfileLoader::new(Some(temp_dir.path().to_path_buf()));
        assert_eq!(
            loader.load(SessionType::Vision).await,
            SessionProfile::builtin(SessionType::Vision)
        );
    }

    #[tokio::test]
    async fn test_session_cache_is_per_session() {
        let loader = ProfileLoader::new(None);
        let updated = loader
            .update_session_profile("a", SessionType::Main, |profile| {
                profile.security.require_confirmation = true;
            })
            .await;
        assert!(updated.security.require_confirmation);
        assert!(
            loader
                .session_profile("a", SessionType::Main)
                .await
                .security
                .require_confirmation
        );
        assert!(
            !loader
                .session_profile("b", SessionType::Main)
                .await
                .security
                .require_confirmation
        );

        loader.forget_session("a");
        assert!(
            !loader
                .session_profile("a", SessionType::Main)
                .await
                .security
                .require_confirmation
        );
    }

    #[tokio::test]
    async fn test_cached_profile_ignores_later_file_changes() {
        let temp_dir = TempDir::new().unwrap();
        let loader = ProfileLoader::new(Some(temp_dir.path().to_path_buf()));
        let mut profile = SessionProfile::builtin(SessionType::Isolated);
        profile.limits.max_memory_mb = 64;
        loader.save(SessionType::Isolated, &profile).await.unwrap();

        let first = loader.session_profile("s1", SessionType::Isolated).await;
        profile.limits.max_memory_mb = 32;
        loader.save(SessionType::Isolated, &profile).await.unwrap();

        assert_eq!(first.limits.max_memory_mb, 64);
        let cached = loader.session_profile("s1", SessionType::Isolated).await;
        assert_eq!(cached.limits.max_memory_mb, 64);
        let fresh = loader.session_profile("s2", SessionType::Isolated).await;
        assert_eq!(fresh.limits.max_memory_mb, 32);
    }
}
