//! Session identity, type and configuration

use crate::memory::MemoryBounds;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest idle timeout chrono can represent
const MAX_TIMEOUT_MINUTES: i64 = i64::MAX / 60_000;

/// Declared kind of session; selects the default feature and resource profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionType {
    #[default]
    Main,
    Vision,
    Isolated,
}

impl SessionType {
    pub const ALL: [SessionType; 3] = [SessionType::Main, SessionType::Vision, SessionType::Isolated];

    /// Upper-case name used in backup and migration names
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Main => "MAIN",
            Self::Vision => "VISION",
            Self::Isolated => "ISOLATED",
        }
    }

    /// Lower-case name used in profile file names
    pub fn file_stem(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Vision => "vision",
            Self::Isolated => "isolated",
        }
    }
}

impl fmt::Display for SessionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown session type: {s}"))
    }
}

/// Defaults applied to sessions created without an explicit config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub max_memory_mb: u64,
    pub max_state_size_kb: u64,
    pub idle_timeout_minutes: u64,
    pub is_persistent: bool,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            max_memory_mb: 100,
            max_state_size_kb: 1024,
            idle_timeout_minutes: 30,
            is_persistent: false,
        }
    }
}

/// Per-session configuration and timestamps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub max_memory_mb: u64,
    pub max_state_size_kb: u64,
    pub idle_timeout_minutes: u64,
    /// Persistent sessions are never expired by the sweep
    pub is_persistent: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_defaults(&SessionDefaults::default())
    }
}

impl SessionConfig {
    pub fn from_defaults(defaults: &SessionDefaults) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            last_accessed: now,
            max_memory_mb: defaults.max_memory_mb,
            max_state_size_kb: defaults.max_state_size_kb,
            idle_timeout_minutes: defaults.idle_timeout_minutes,
            is_persistent: defaults.is_persistent,
        }
    }

    pub fn with_idle_timeout(mut self, minutes: u64) -> Self {
        self.idle_timeout_minutes = minutes;
        self
    }

    pub fn with_persistent(mut self, persistent: bool) -> Self {
        self.is_persistent = persistent;
        self
    }

    pub fn with_memory_limits(mut self, max_memory_mb: u64, max_state_size_kb: u64) -> Self {
        self.max_memory_mb = max_memory_mb;
        self.max_state_size_kb = max_state_size_kb;
        self
    }

    pub fn idle_timeout(&self) -> ChronoDuration {
        let minutes = i64::try_from(self.idle_timeout_minutes)
            .unwrap_or(i64::MAX)
            .min(MAX_TIMEOUT_MINUTES);
        ChronoDuration::minutes(minutes)
    }

    /// Memory ceilings derived from this config
    pub fn bounds(&self) -> MemoryBounds {
        MemoryBounds::new(self.max_memory_mb, self.max_state_size_kb)
    }
}
