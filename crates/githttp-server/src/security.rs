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
//! Path hardening and security audit logging

/// Audit log target for rejected paths
pub const AUDIT_TARGET: &str = "githttp::audit";

/// Path traversal prevention for a repository prefix
///
/// The prefix is the URL path captured in front of an endpoint suffix, so it
/// normally starts with a slash.
pub fn validate_repo_prefix(prefix: &str) -> Result<(), &'static str> {
    // Reject paths with null bytes
    if prefix.contains('\0') {
        return Err("Null bytes not allowed");
    }

    // Reject backslashes, which some platforms treat as separators
    if prefix.contains('\\') {
        return Err("Backslashes not allowed");
    }

    let mut segments = prefix.split('/').filter(|s| !s.is_empty());

    // Reject Windows drive letters
    if let Some(first) = segments.clone().next() {
        if first.len() == 2 && first.as_bytes()[1] == b':' {
            return Err("Drive letters not allowed");
        }
    }

    if segments.any(|s| s == "..") {
        return Err("Path traversal detected");
    }

    Ok(())
}

/// Validate a residual file path inside a repository
///
/// Only plain relative segments are allowed.
pub fn validate_file_path(file_path: &str) -> Result<(), &'static str> {
    if file_path.contains('\0') || file_path.contains('\\') {
        return Err("Invalid characters in file path");
    }
    if file_path.starts_with('/') {
        return Err("Absolute paths not allowed");
    }
    if file_path
        .split('/')
        .any(|s| s.is_empty() || s == "." || s == "..")
    {
        return Err("Path traversal detected");
    }
    Ok(())
}

/// Record a rejected path as a security audit event
pub fn log_path_traversal_attempt(path: &str, reason: &str) {
    tracing::warn!(
        target: AUDIT_TARGET,
        event_type = "path_traversal_attempt",
        path = %path.escape_debug(),
        reason,
        "Path traversal attempt detected"
    );
}
