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
//! Maps repository prefixes to directories under the project root

use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ServerError, ServerResult};
use crate::security::{log_path_traversal_attempt, validate_repo_prefix};

/// Resolves the repository part of a request path
#[derive(Debug, Clone)]
pub struct RepositoryResolver {
    root: PathBuf,
}

impl RepositoryResolver {
    /// Create a resolver for repositories below `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a prefix would resolve to, without touching the filesystem
    ///
    /// The result is always inside the root. Prefixes with `..` segments are
    /// rejected and logged as audit events.
    pub fn candidate_path(&self, prefix: &str) -> ServerResult<PathBuf> {
        if let Err(reason) = validate_repo_prefix(prefix) {
            log_path_traversal_attempt(prefix, reason);
            return Err(ServerError::PathTraversal(prefix.to_string()));
        }

        let mut path = self.root.clone();
        for segment in prefix.split('/').filter(|s| !s.is_empty() && *s != ".") {
            path.push(segment);
        }

        if !path.starts_with(&self.root) {
            log_path_traversal_attempt(prefix, "Resolved outside project root");
            return Err(ServerError::PathTraversal(prefix.to_string()));
        }

        Ok(path)
    }

    /// Resolve a prefix to an existing directory
    pub async fn resolve(&self, prefix: &str) -> ServerResult<PathBuf> {
        let path = self.candidate_path(prefix)?;

        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(path),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ServerError::RepositoryNotFound(path))
            }
            Err(e) => Err(ServerError::Io(e)),
        }
    }
}
