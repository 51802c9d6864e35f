//! Configuration model

use crate::error::{SessionError, SessionResult};
use crate::memory::{DEFAULT_WARNING_THRESHOLD, MemoryBounds};
use crate::session::{RegistryConfig, SessionDefaults};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LumenConfig {
    /// Root for per-session state directories; unset keeps state in memory
    pub persistence_root: Option<PathBuf>,
    /// Directory holding `<type>_config.json` session profiles
    pub profiles_dir: Option<PathBuf>,
    pub session: SessionDefaults,
    pub registry: RegistrySettings,
    pub state: StateSettings,
    pub memory: MemorySettings,
    pub backup: BackupSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub sweep_interval_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateSettings {
    pub auto_save_interval_secs: u64,
}

impl Default for StateSettings {
    fn default() -> Self {
        Self {
            auto_save_interval_secs: 30,
        }
    }
}

/// Process-wide memory ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub max_total_mb: u64,
    pub max_total_state_kb: u64,
    pub warning_threshold: f64,
}

impl Default for MemorySettings {
    fn default() -> Self {
        let global = MemoryBounds::global();
        Self {
            max_total_mb: global.max_memory_mb,
            max_total_state_kb: global.max_state_size_kb,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
        }
    }
}

impl MemorySettings {
    pub fn bounds(&self) -> MemoryBounds {
        MemoryBounds::new(self.max_total_mb, self.max_total_state_kb)
            .with_warning_threshold(self.warning_threshold)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    pub dir: PathBuf,
    pub retention_days: u32,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            dir: default_data_dir().join("backups"),
            retention_days: 30,
        }
    }
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pretty => "pretty",
            Self::Compact => "compact",
            Self::Json => "json",
        })
    }
}

impl FromStr for LogFormat {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(SessionError::config(format!("Unknown log format: {other}"))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// `<local data dir>/lumen`, or `./.lumen` when the platform has none
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("lumen"))
        .unwrap_or_else(|| PathBuf::from(".lumen"))
}

impl LumenConfig {
    /// Reject settings the registry cannot run with
    pub fn validate(&self) -> SessionResult<()> {
        if self.registry.sweep_interval_secs == 0 {
            return Err(SessionError::config("registry.sweep_interval_secs must be positive"));
        }
        if self.state.auto_save_interval_secs == 0 {
            return Err(SessionError::config("state.auto_save_interval_secs must be positive"));
        }
        let threshold = self.memory.warning_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(SessionError::config(format!(
                "memory.warning_threshold must be in (0, 1], got {threshold}"
            )));
        }
        if self.logging.level.trim().is_empty() {
            return Err(SessionError::config("logging.level must not be empty"));
        }
        Ok(())
    }

    /// Settings for a [`SessionRegistry`](crate::session::SessionRegistry)
    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            session_defaults: self.session.clone(),
            persistence_root: self.persistence_root.clone(),
            sweep_interval: Duration::from_secs(self.registry.sweep_interval_secs),
            auto_save_interval: Duration::from_secs(self.state.auto_save_interval_secs),
            global_bounds: self.memory.bounds(),
            profiles_dir: self.profiles_dir.clone(),
        }
    }
}
