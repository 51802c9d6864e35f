//! CLI argument definitions using clap
//!
//! - lumen config show|init|validate
//! - lumen inspect list|query|diff|export
//! - lumen backup create|list|restore|migrate|prune
//! - lumen stats

use clap::{Parser, Subcommand};
use lumen_core::SessionType;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lumen")]
#[command(about = "Inspect, back up and migrate persisted Lumen sessions")]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (.toml or .json)
    #[arg(long, global = true, env = "LUMEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show or create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Read persisted session state
    Inspect {
        #[command(subcommand)]
        action: InspectAction,
    },

    /// Back up, restore and migrate sessions
    Backup {
        #[command(subcommand)]
        action: BackupAction,
    },

    /// Memory and session statistics over persisted sessions
    Stats,
}

#[derive(Subcommand, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show {
        /// Print as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },

    /// Check the configuration for errors
    Validate,

    /// Write a configuration file with defaults
    Init {
        /// Destination; defaults to --config or the platform config dir
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Clone)]
pub enum InspectAction {
    /// List persisted sessions
    List,

    /// Print the value at a dot-separated path
    Query {
        session_id: String,
        /// e.g. field_values.input.vad or confirmed_nodes.0.label
        #[arg(default_value = "")]
        path: String,
    },

    /// Compare two sessions key by key
    Diff { left: String, right: String },

    /// Write a session's state to a file
    Export { session_id: String, output: PathBuf },
}

#[derive(Subcommand, Clone)]
pub enum BackupAction {
    /// Back up a persisted session
    Create {
        session_id: String,
        #[arg(long = "type", default_value = "main", value_parser = parse_session_type)]
        session_type: SessionType,
    },

    /// List backups, newest first
    List { session_id: Option<String> },

    /// Restore a backup as the persisted state of a session
    Restore {
        backup_name: String,
        new_session_id: String,
        /// Replace an existing persisted state
        #[arg(long)]
        force: bool,
    },

    /// Change the declared type of a persisted session
    Migrate {
        session_id: String,
        #[arg(value_parser = parse_session_type)]
        to: SessionType,
        #[arg(long, default_value = "main", value_parser = parse_session_type)]
        from: SessionType,
    },

    /// Remove backups older than the retention period
    Prune {
        /// Override the configured retention in days
        #[arg(long)]
        days: Option<u32>,
    },
}

fn parse_session_type(value: &str) -> Result<SessionType, String> {
    value.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::parse_from(["lumen", "backup", "migrate", "s1", "vision"]);
        match cli.command {
            Commands::Backup {
                action: BackupAction::Migrate { session_id, to, from },
            } => {
                assert_eq!(session_id, "s1");
                assert_eq!(to, SessionType::Vision);
                assert_eq!(from, SessionType::Main);
            }
            _ => panic!("expected backup migrate"),
        }
    }

    #[test]
    fn test_rejects_unknown_type() {
        assert!(Cli::try_parse_from(["lumen", "backup", "create", "s1", "--type", "guest"]).is_err());
    }
}
