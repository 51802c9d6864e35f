//! `lumen config`

use anyhow::{Context, Result, bail};
use lumen_core::LumenConfig;
use lumen_core::config::{default_config_path, save_to_file};
use std::path::{Path, PathBuf};

/// Print the effective configuration
pub fn show(config: &LumenConfig, json: bool) -> Result<()> {
    if json {
        super::print_json(config)
    } else {
        print!("{}", toml::to_string_pretty(config)?);
        Ok(())
    }
}

/// Report whether the loaded configuration is usable
pub fn validate(config: &LumenConfig) -> Result<()> {
    config.validate()?;
    match &config.persistence_root {
        Some(root) => println!("Configuration is valid (persistence root: {})", root.display()),
        None => println!("Configuration is valid (no persistence root, state stays in memory)"),
    }
    Ok(())
}

/// Write the default configuration and return where it went
pub fn init(path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => default_config_path().context("No platform config directory; pass --path")?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    save_to_file(&LumenConfig::default(), &path)
        .with_context(|| format!("Writing {}", path.display()))?;
    println!("Wrote default configuration to {}", path.display());
    Ok(path)
}
