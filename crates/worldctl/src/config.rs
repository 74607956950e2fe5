//! Configuration management for worldctl.
//!
//! This module handles loading, validation, and CLI overrides of the TOML
//! configuration that tells worldctl where the Paper server lives.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use tracing::info;

use crate::cli::Args;

/// Default name of the directory holding the worlds, relative to the server root
fn default_worlds_dir() -> String {
    "worlds".to_string()
}

fn default_pid_file() -> String {
    "server.pid".to_string()
}

fn default_process_name() -> String {
    "java".to_string()
}

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Location of the game server and how to tell whether it runs
    pub server: ServerSettings,
    /// World handling options
    #[serde(default)]
    pub worlds: WorldSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Where the Paper server is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Server installation directory (the one holding `worlds/` and `server.pid`)
    pub root: String,
    /// Directory under `root` holding one sub-directory per world
    #[serde(default = "default_worlds_dir")]
    pub worlds_dir: String,
    /// PID file written by the start script, relative to `root`
    #[serde(default = "default_pid_file")]
    pub pid_file: String,
    /// Expected executable name of the running server; empty disables the check
    #[serde(default = "default_process_name")]
    pub process_name: String,
}

/// How world directory sizes are measured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeMethod {
    /// In-process directory walk
    #[default]
    Walk,
    /// External `du -sb`
    Du,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldSettings {
    #[serde(default)]
    pub size_method: SizeMethod,
}

/// Logging system configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                root: "/opt/minecraft/server".to_string(),
                worlds_dir: default_worlds_dir(),
                pid_file: default_pid_file(),
                process_name: default_process_name(),
            },
            worlds: WorldSettings::default(),
            logging: LoggingSettings {
                level: "warn".to_string(),
                json_format: false,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration to `path`
    /// and returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            let config: AppConfig = toml::from_str(&content)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("writing default config to {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Applies command-line overrides on top of the file configuration.
    pub fn apply_overrides(&mut self, args: &Args) {
        if let Some(root) = &args.server_root {
            self.server.root = root.to_string_lossy().to_string();
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
        if args.json_logs {
            self.logging.json_format = true;
        }
    }

    pub fn server_root(&self) -> PathBuf {
        PathBuf::from(&self.server.root)
    }

    pub fn worlds_root(&self) -> PathBuf {
        self.server_root().join(&self.server.worlds_dir)
    }

    pub fn pid_file_path(&self) -> PathBuf {
        self.server_root().join(&self.server.pid_file)
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.root.is_empty() {
            return Err("Server root cannot be empty".to_string());
        }

        let mut components = Path::new(&self.server.worlds_dir).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(format!(
                    "Worlds directory must be a single directory name: {}",
                    self.server.worlds_dir
                ))
            }
        }

        if self.server.pid_file.is_empty() {
            return Err("PID file cannot be empty".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
