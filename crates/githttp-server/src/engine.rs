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
//! The external git executable

use async_trait::async_trait;
use githttp_protocol::Service;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::access::RepositorySettings;
use crate::error::{ServerError, ServerResult};

/// Runs git subcommands against repositories on disk
#[derive(Debug, Clone)]
pub struct GitEngine {
    bin: PathBuf,
}

impl GitEngine {
    /// Create an engine for the executable at `bin`
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Path of the executable
    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn command(&self, dir: &Path) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.current_dir(dir);
        cmd
    }

    /// `git <service> --stateless-rpc <dir>`, not yet spawned
    ///
    /// All three standard streams are piped and the child is killed if the
    /// handle is dropped before it exits.
    pub fn stateless_rpc(&self, service: Service, dir: &Path) -> Command {
        let mut cmd = self.command(dir);
        cmd.arg(service.as_str())
            .arg("--stateless-rpc")
            .arg(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Ref advertisement for `service`, as produced by the engine
    pub async fn advertise_refs(&self, service: Service, dir: &Path) -> ServerResult<Vec<u8>> {
        self.run(
            dir,
            &[service.as_str(), "--stateless-rpc", "--advertise-refs", "."],
        )
        .await
    }

    /// Refresh `info/refs` and `objects/info/packs` for dumb clients
    pub async fn update_server_info(&self, dir: &Path) -> ServerResult<()> {
        self.run(dir, &["update-server-info"]).await.map(|_| ())
    }

    /// Read a repository setting with `git config <key>`
    ///
    /// An unset key makes git exit non-zero without output, which is
    /// reported as `None`.
    pub async fn config_value(&self, dir: &Path, key: &str) -> ServerResult<Option<String>> {
        let output = self
            .command(dir)
            .args(["config", key])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ServerError::subprocess("failed to start git config", e))?;

        if output.status.success() {
            let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(value));
        }

        if output.stdout.is_empty() && output.status.code() == Some(1) {
            return Ok(None);
        }

        Err(ServerError::Subprocess(format!(
            "git config {} exited with {}: {}",
            key,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )))
    }

    async fn run(&self, dir: &Path, args: &[&str]) -> ServerResult<Vec<u8>> {
        tracing::debug!(repo = %dir.display(), ?args, "Running git");

        let output = self
            .command(dir)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                ServerError::subprocess(&format!("failed to start {}", self.bin.display()), e)
            })?;

        if !output.status.success() {
            return Err(ServerError::Subprocess(format!(
                "git {} exited with {}: {}",
                args.join(" "),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl RepositorySettings for GitEngine {
    async fn get(&self, dir: &Path, key: &str) -> Option<String> {
        match self.config_value(dir, key).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(
                    repo = %dir.display(),
                    key,
                    "Could not read repository setting: {}",
                    e
                );
                None
            }
        }
    }
}
