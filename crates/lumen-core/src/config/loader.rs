//! Configuration loading: file, then environment

use super::model::LumenConfig;
use crate::error::{SessionError, SessionResult};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const ENV_PERSISTENCE_ROOT: &str = "LUMEN_PERSISTENCE_ROOT";
pub const ENV_BACKUP_DIR: &str = "LUMEN_BACKUP_DIR";
pub const ENV_LOG_LEVEL: &str = "LUMEN_LOG_LEVEL";

/// `<config dir>/lumen/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("lumen").join("config.toml"))
}

/// Load a config file, choosing the format by extension.
///
/// `.toml` is parsed as TOML, anything else as JSON. A missing file yields
/// the defaults.
pub fn load_from_file(path: &Path) -> SessionResult<LumenConfig> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(LumenConfig::default());
        }
        Err(e) => return Err(SessionError::io_at(path, e)),
    };

    let config = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::from_str(&content).map_err(|e| {
            SessionError::config(format!("Failed to parse TOML config '{}': {e}", path.display()))
        })?,
        _ => serde_json::from_str(&content).map_err(|e| {
            SessionError::config(format!("Failed to parse JSON config '{}': {e}", path.display()))
        })?,
    };
    Ok(config)
}

/// Apply `LUMEN_*` overrides read through `lookup`
pub fn apply_env_with<F>(config: &mut LumenConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(root) = lookup(ENV_PERSISTENCE_ROOT).filter(|v| !v.is_empty()) {
        config.persistence_root = Some(PathBuf::from(root));
    }
    if let Some(dir) = lookup(ENV_BACKUP_DIR).filter(|v| !v.is_empty()) {
        config.backup.dir = PathBuf::from(dir);
    }
    if let Some(level) = lookup(ENV_LOG_LEVEL).filter(|v| !v.is_empty()) {
        config.logging.level = level;
    }
}

/// Apply `LUMEN_*` overrides from the process environment
pub fn apply_env(config: &mut LumenConfig) {
    apply_env_with(config, |key| std::env::var(key).ok());
}

/// Load, override from the environment and validate.
///
/// Without an explicit path the default location is tried.
pub fn load_config(path: Option<&Path>) -> SessionResult<LumenConfig> {
    let mut config = match path.map(Path::to_path_buf).or_else(default_config_path) {
        Some(path) => load_from_file(&path)?,
        None => LumenConfig::default(),
    };
    apply_env(&mut config);
    config.validate()?;
    Ok(config)
}

/// Write a config file in the format implied by its extension
pub fn save_to_file(config: &LumenConfig, path: &Path) -> SessionResult<()> {
    let content = match path.extension().and_then(|ext| ext.to_str()) {
        Some("toml") => toml::to_string_pretty(config)?,
        _ => serde_json::to_string_pretty(config)?,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| SessionError::io_at(parent, e))?;
    }
    fs::write(path, content).map_err(|e| SessionError::io_at(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogFormat;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_load_toml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lumen.toml");
        fs::write(
            &path,
            r#"
persistence_root = "/srv/lumen"

[session]
idle_timeout_minutes = 5

[registry]
sweep_interval_secs = 10

[logging]
format = "json"
"#,
        )
        .unwrap();

        let config = load_from_file(&path).unwrap();
        assert_eq!(config.persistence_root, Some(PathBuf::from("/srv/lumen")));
        assert_eq!(config.session.idle_timeout_minutes, 5);
        assert_eq!(config.session.max_memory_mb, 100);
        assert_eq!(config.registry.sweep_interval_secs, 10);
        assert_eq!(config.state.auto_save_interval_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("lumen.json");
        fs::write(&path, r#"{"backup": {"retention_days": 7}}"#).unwrap();
        assert_eq!(load_from_file(&path).unwrap().backup.retention_days, 7);
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp_dir = TempDir::new().unwrap();
        let config = load_from_file(&temp_dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, LumenConfig::default());
    }

    #[test]
    fn test_invalid_file_is_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("bad.toml");
        fs::write(&path, "registry = [").unwrap();
        assert!(matches!(load_from_file(&path), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_PERSISTENCE_ROOT, "/data/sessions"),
            (ENV_BACKUP_DIR, ""),
            (ENV_LOG_LEVEL, "debug"),
        ]);
        let mut config = LumenConfig::default();
        let backup_dir = config.backup.dir.clone();
        apply_env_with(&mut config, |key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.persistence_root, Some(PathBuf::from("/data/sessions")));
        assert_eq!(config.backup.dir, backup_dir);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_save_round_trip_keeps_format() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = LumenConfig::default();
        config.session.is_persistent = true;

        for name in ["nested/lumen.toml", "lumen.json"] {
            let path = temp_dir.path().join(name);
            save_to_file(&config, &path).unwrap();
            assert_eq!(load_from_file(&path).unwrap(), config);
        }
    }
}
