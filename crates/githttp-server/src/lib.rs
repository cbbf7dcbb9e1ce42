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
//! Git smart and dumb HTTP transport
//!
//! Requests are matched against a fixed endpoint table, resolved to a
//! repository below the project root, checked against the access policy and
//! then either proxied to `git <service> --stateless-rpc` or answered from
//! files on disk.

pub mod access;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod handlers;
pub mod resolver;
pub mod routing;
pub mod rpc;
pub mod security;
pub mod state;

pub use access::{AccessDecision, AccessMode, AccessPolicy, RepositorySettings};
pub use config::ServerConfig;
pub use engine::GitEngine;
pub use error::{ServerError, ServerResult};
pub use resolver::RepositoryResolver;
pub use routing::{RouteMatch, RouteMiss, RouteTable};
pub use state::AppState;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Create the axum router serving every repository below the project root
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(handlers::dispatch)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
