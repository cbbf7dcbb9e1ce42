// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use anyhow::{Context, Result};
use githttp_observability::LogFormat;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::access::AccessMode;

/// Config file looked up in the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "githttp-server.toml";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Directory repositories are served from (current directory if unset)
    #[serde(default)]
    pub project_root: Option<PathBuf>,

    /// Path to the git executable
    #[serde(default = "default_git_bin_path")]
    pub git_bin_path: PathBuf,

    /// Access mode for fetches
    #[serde(default)]
    pub upload_pack: AccessMode,

    /// Access mode for pushes
    #[serde(default)]
    pub receive_pack: AccessMode,

    /// Largest RPC request body read, before decoding
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Tracing filter; RUST_LOG is used when unset
    #[serde(default)]
    pub log_level: Option<String>,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,

    /// Log extracted push/fetch events
    #[serde(default = "default_log_events")]
    pub log_events: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_git_bin_path() -> PathBuf {
    PathBuf::from("/usr/bin/git")
}

fn default_max_body_bytes() -> usize {
    // 2GB, large pushes are buffered whole
    2 * 1024 * 1024 * 1024
}

fn default_log_events() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            project_root: None,
            git_bin_path: default_git_bin_path(),
            upload_pack: AccessMode::default(),
            receive_pack: AccessMode::default(),
            max_body_bytes: default_max_body_bytes(),
            log_level: None,
            log_format: LogFormat::default(),
            log_events: default_log_events(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from file or use defaults, then apply environment overrides
    ///
    /// An explicitly given path must exist. Without one, `githttp-server.toml`
    /// in the working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::info!("No config file found, using defaults");
                    Self::default()
                }
            }
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse a TOML config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Parse TOML config text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid server configuration")
    }

    /// Apply `GITHTTP_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("GITHTTP_HOST") {
            self.host = value;
        }
        if let Some(value) = lookup("GITHTTP_PORT") {
            self.port = value
                .parse()
                .with_context(|| format!("GITHTTP_PORT={}: expected a port number", value))?;
        }
        if let Some(value) = lookup("GITHTTP_PROJECT_ROOT") {
            self.project_root = Some(PathBuf::from(value));
        }
        if let Some(value) = lookup("GITHTTP_GIT_BIN") {
            self.git_bin_path = PathBuf::from(value);
        }
        Ok(())
    }

    /// Get the full bind address
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
