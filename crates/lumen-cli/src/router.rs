//! Command routing logic for CLI

use crate::args::{BackupAction, Cli, Commands, ConfigAction, InspectAction};
use crate::commands::{self, persistence_root};
use anyhow::Result;
use lumen_core::{BackupManager, LumenConfig};

/// Route a parsed command line to its handler
pub async fn route(cli: Cli, config: LumenConfig) -> Result<()> {
    match cli.command {
        Commands::Config { action } => route_config(action, &cli.config, &config),
        Commands::Inspect { action } => route_inspect(action, &config).await,
        Commands::Backup { action } => route_backup(action, &config).await,
        Commands::Stats => {
            let root = persistence_root(&config)?;
            commands::stats::run(&config, &root).await.map(|_| ())
        }
    }
}

fn route_config(
    action: ConfigAction,
    config_path: &Option<std::path::PathBuf>,
    config: &LumenConfig,
) -> Result<()> {
    match action {
        ConfigAction::Show { json } => commands::config::show(config, json),
        ConfigAction::Validate => commands::config::validate(config),
        ConfigAction::Init { path, force } => {
            let target = path.or_else(|| config_path.clone());
            commands::config::init(target.as_deref(), force).map(|_| ())
        }
    }
}

async fn route_inspect(action: InspectAction, config: &LumenConfig) -> Result<()> {
    let root = persistence_root(config)?;
    match action {
        InspectAction::List => commands::inspect::list(&root).await,
        InspectAction::Query { session_id, path } => {
            commands::inspect::query(&root, &session_id, &path).await.map(|_| ())
        }
        InspectAction::Diff { left, right } => {
            commands::inspect::diff(&root, &left, &right).await.map(|_| ())
        }
        InspectAction::Export { session_id, output } => {
            commands::inspect::export(&root, &session_id, &output).await
        }
    }
}

async fn route_backup(action: BackupAction, config: &LumenConfig) -> Result<()> {
    let backups = BackupManager::new(&config.backup.dir);
    match action {
        BackupAction::List { session_id } => {
            commands::backup::list(&backups, session_id.as_deref()).await
        }
        BackupAction::Prune { days } => {
            let days = days.unwrap_or(config.backup.retention_days);
            commands::backup::prune(&backups, days).await.map(|_| ())
        }
        BackupAction::Create { session_id, session_type } => {
            let root = persistence_root(config)?;
            commands::backup::create(&backups, &root, &session_id, session_type)
                .await
                .map(|_| ())
        }
        BackupAction::Restore {
            backup_name,
            new_session_id,
            force,
        } => {
            let root = persistence_root(config)?;
            commands::backup::restore(&backups, &root, &backup_name, &new_session_id, force).await
        }
        BackupAction::Migrate { session_id, to, from } => {
            let root = persistence_root(config)?;
            commands::backup::migrate(&backups, &root, &session_id, from, to)
                .await
                .map(|_| ())
        }
    }
}
