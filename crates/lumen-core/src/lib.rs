//! Lumen Core Library
//!
//! Isolated per-client session state for the Lumen desktop backend:
//! - Session registry with client association and idle expiration
//! - Per-session serialized state manager with crash-safe persistence
//! - Advisory memory accounting per session and process-wide
//! - Backup, type migration and read-only state inspection

pub mod backup;
pub mod config;
pub mod error;
pub mod facade;
pub mod inspect;
pub mod memory;
pub mod session;
pub mod state;

pub use backup::{BackupManager, BackupMetadata, MigrationRecord, MigrationStatus, RestoredBackup};
pub use config::{LogFormat, LoggingConfig, LumenConfig};
pub use error::{SessionError, SessionResult};
pub use facade::SessionFacade;
pub use inspect::{StateComparison, StateDiff, StateInspector, diff_states, query_path};
pub use memory::{BoundsCheck, GlobalMemoryManager, MemoryBounds, MemoryTracker};
pub use session::{
    RegistryConfig, RegistryStats, Session, SessionConfig, SessionRegistry, SessionType,
};
pub use state::{
    AppState, Category, ColorTheme, ConfirmedNode, FieldValue, HexColor, IsolatedStateManager,
    ThemeUpdate,
};
