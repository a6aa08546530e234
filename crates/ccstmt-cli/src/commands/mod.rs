//! Subcommand implementations.

pub mod config;
pub mod fields;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context;
use ccstmt_core::StatementConfig;

/// `<config_dir>/ccstmt/config.json`.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ccstmt")
        .join("config.json")
}

/// Load the explicit config file, else the user config if present, else defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<StatementConfig> {
    match explicit {
        Some(path) => StatementConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display())),
        None => {
            let path = default_config_path();
            if path.exists() {
                StatementConfig::from_file(&path)
                    .with_context(|| format!("failed to read config {}", path.display()))
            } else {
                Ok(StatementConfig::default())
            }
        }
    }
}
