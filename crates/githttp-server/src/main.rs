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
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use githttp_observability::{init_tracing, LogFormat};
use githttp_server::{create_router, AppState, ServerConfig};

/// Serve git repositories over HTTP
#[derive(Parser, Debug)]
#[command(name = "githttp-server", version, about)]
struct Cli {
    /// Config file (defaults to ./githttp-server.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory repositories are served from
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Path to the git executable
    #[arg(long)]
    git_bin: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "githttp_server=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Log format: pretty, compact or json
    #[arg(long)]
    log_format: Option<LogFormat>,
}

impl Cli {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root) = self.root {
            config.project_root = Some(root);
        }
        if let Some(git_bin) = self.git_bin {
            config.git_bin_path = git_bin;
        }
        if let Some(level) = self.log_level {
            config.log_level = Some(level);
        }
        if let Some(format) = self.log_format {
            config.log_format = format;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load(cli.config.as_deref())?;
    cli.apply(&mut config);

    init_tracing(config.log_format, config.log_level.as_deref())
        .context("Failed to initialize logging")?;

    tracing::info!("Server configuration: {:?}", config);

    let state = AppState::new(config.clone()).context("Failed to build server state")?;
    tracing::info!("Project root: {}", state.project_root().display());
    tracing::info!("Git executable: {}", state.engine.bin().display());

    let app = create_router(Arc::new(state));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("githttp server listening on {}", bind_addr);
    tracing::info!("Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
