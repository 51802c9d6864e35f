//! Configuration
//!
//! A [`LumenConfig`] is loaded once at startup and turned into the settings
//! of the components that need it; nothing reads configuration lazily.

pub mod loader;
pub mod model;

pub use loader::{
    ENV_BACKUP_DIR, ENV_LOG_LEVEL, ENV_PERSISTENCE_ROOT, apply_env, apply_env_with,
    default_config_path, load_config, load_from_file, save_to_file,
};
pub use model::{
    BackupSettings, LogFormat, LoggingConfig, LumenConfig, MemorySettings, RegistrySettings,
    StateSettings, default_data_dir,
};
