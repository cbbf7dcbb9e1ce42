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
use githttp_protocol::{EventSink, TracingSink};
use std::path::PathBuf;
use std::sync::Arc;

use crate::access::{AccessPolicy, RepositorySettings};
use crate::config::ServerConfig;
use crate::engine::GitEngine;
use crate::error::ServerResult;
use crate::resolver::RepositoryResolver;
use crate::routing::RouteTable;

/// Shared application state
///
/// Built once at startup and only read afterwards.
pub struct AppState {
    /// Configuration the state was built from
    pub config: ServerConfig,

    /// Compiled endpoint table
    pub routes: RouteTable,

    /// Repository directory lookup
    pub resolver: RepositoryResolver,

    /// Smart protocol access policy
    pub access: AccessPolicy,

    /// External git executable
    pub engine: GitEngine,

    /// Receiver of push/fetch events (events are dropped when unset)
    pub event_sink: Option<Arc<dyn EventSink>>,
}

impl AppState {
    /// Create state from configuration
    ///
    /// Without a configured project root the current directory is used.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let root = match &config.project_root {
            Some(root) => root.clone(),
            None => std::env::current_dir()?,
        };

        let engine = GitEngine::new(config.git_bin_path.clone());
        let settings: Arc<dyn RepositorySettings> = Arc::new(engine.clone());
        let access = AccessPolicy::new(config.upload_pack, config.receive_pack, settings);

        let event_sink = if config.log_events {
            Some(Arc::new(TracingSink) as Arc<dyn EventSink>)
        } else {
            None
        };

        Ok(Self {
            routes: RouteTable::new(),
            resolver: RepositoryResolver::new(root),
            access,
            engine,
            event_sink,
            config,
        })
    }

    /// Replace the event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Drop extracted events instead of publishing them
    pub fn without_event_sink(mut self) -> Self {
        self.event_sink = None;
        self
    }

    /// Read repository access settings from somewhere other than the engine
    pub fn with_repository_settings(mut self, settings: Arc<dyn RepositorySettings>) -> Self {
        let config = &self.config;
        self.access = AccessPolicy::new(config.upload_pack, config.receive_pack, settings);
        self
    }

    /// Directory repositories are resolved under
    pub fn project_root(&self) -> PathBuf {
        self.resolver.root().to_path_buf()
    }
}
