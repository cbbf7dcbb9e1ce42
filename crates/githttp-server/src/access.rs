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
//! Access policy for the smart protocol endpoints
//!
//! A decision is computed fresh for every request. Repository settings are
//! read through [`RepositorySettings`] so they may change between requests.

use async_trait::async_trait;
use githttp_protocol::{Operation, Service};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

/// Server-wide access mode for one RPC service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessMode {
    /// Allow regardless of repository settings
    Force,
    /// Deny regardless of repository settings
    Deny,
    /// Defer to the repository's own `http.*` setting
    #[default]
    Repository,
}

impl FromStr for AccessMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "force" => Ok(AccessMode::Force),
            "deny" => Ok(AccessMode::Deny),
            "repository" => Ok(AccessMode::Repository),
            other => Err(format!(
                "invalid access mode '{}', expected force, deny or repository",
                other
            )),
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Why it may not
    pub reason: Option<String>,
}

impl AccessDecision {
    /// Allow the request
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    /// Deny the request with a reason
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

impl fmt::Display for AccessDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.allowed, &self.reason) {
            (true, _) => f.write_str("allowed"),
            (false, Some(reason)) => write!(f, "denied: {}", reason),
            (false, None) => f.write_str("denied"),
        }
    }
}

/// Per-repository configuration store
#[async_trait]
pub trait RepositorySettings: Send + Sync {
    /// Value of `key` for the repository at `dir`, `None` when unset
    async fn get(&self, dir: &Path, key: &str) -> Option<String>;
}

/// Decides whether a smart protocol request is permitted
pub struct AccessPolicy {
    upload_pack: AccessMode,
    receive_pack: AccessMode,
    settings: Arc<dyn RepositorySettings>,
}

impl AccessPolicy {
    /// Create a policy from the two server-wide modes
    pub fn new(
        upload_pack: AccessMode,
        receive_pack: AccessMode,
        settings: Arc<dyn RepositorySettings>,
    ) -> Self {
        Self {
            upload_pack,
            receive_pack,
            settings,
        }
    }

    /// Check an operation against the policy
    ///
    /// When `declared_content_type` is given it must equal the service's
    /// request content type. Only the two RPC operations can be allowed.
    pub async fn check(
        &self,
        operation: Operation,
        dir: &Path,
        declared_content_type: Option<&str>,
    ) -> AccessDecision {
        match operation.service() {
            Some(service) => self.check_service(service, dir, declared_content_type).await,
            None => AccessDecision::deny(format!("{} is not an RPC operation", operation)),
        }
    }

    /// Check a service directly, as the ref advertisement does
    pub async fn check_service(
        &self,
        service: Service,
        dir: &Path,
        declared_content_type: Option<&str>,
    ) -> AccessDecision {
        if let Some(declared) = declared_content_type {
            let expected = service.request_content_type();
            if declared != expected {
                return AccessDecision::deny(format!(
                    "content type '{}' does not match {}",
                    declared, expected
                ));
            }
        }

        let mode = match service {
            Service::UploadPack => self.upload_pack,
            Service::ReceivePack => self.receive_pack,
        };

        match mode {
            AccessMode::Force => AccessDecision::allow(),
            AccessMode::Deny => AccessDecision::deny(format!("{} is disabled", service)),
            AccessMode::Repository => self.repository_decision(service, dir).await,
        }
    }

    async fn repository_decision(&self, service: Service, dir: &Path) -> AccessDecision {
        let key = service.config_key();
        let value = self.settings.get(dir, key).await;
        let value = value.as_deref().map(str::trim);

        // Fetches are open unless switched off, pushes closed unless switched on
        let allowed = match service {
            Service::UploadPack => value != Some("false"),
            Service::ReceivePack => value == Some("true"),
        };

        tracing::debug!(
            repo = %dir.display(),
            service = %service,
            setting = ?value,
            allowed,
            "Repository access setting"
        );

        if allowed {
            AccessDecision::allow()
        } else {
            AccessDecision::deny(format!("{} is not enabled for this repository", key))
        }
    }
}

impl fmt::Debug for AccessPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPolicy")
            .field("upload_pack", &self.upload_pack)
            .field("receive_pack", &self.receive_pack)
            .finish_non_exhaustive()
    }
}
