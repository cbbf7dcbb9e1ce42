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
//! Server error taxonomy and its HTTP rendering

use axum::http::{StatusCode, Version};
use axum::response::{IntoResponse, Response};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for request handling
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that end a request
///
/// Routing and access errors always produce a complete response. Subprocess
/// errors only reach the client as a status when they happen before the
/// response headers are committed; later failures truncate the body instead.
#[derive(Error, Debug)]
pub enum ServerError {
    /// No endpoint pattern matched the path
    #[error("no route for {0}")]
    RouteNotFound(String),

    /// A pattern matched but the method was wrong
    #[error("method not allowed")]
    MethodNotAllowed {
        /// Request used HTTP/1.0 or older
        legacy_protocol: bool,
    },

    /// Access policy denied the request
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Resolved repository directory does not exist
    #[error("repository not found: {}", .0.display())]
    RepositoryNotFound(PathBuf),

    /// Requested repository file does not exist
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Repository path tried to leave the project root
    #[error("path traversal rejected: {0}")]
    PathTraversal(String),

    /// The git executable could not be started or failed
    #[error("git subprocess failed: {0}")]
    Subprocess(String),

    /// Request body uses a content encoding we cannot decode
    #[error("unsupported content encoding: {0}")]
    UnsupportedEncoding(String),

    /// Request body, raw or decoded, is larger than the configured limit
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Request body could not be read or decompressed
    #[error("failed to decode request body: {0}")]
    Decoding(String),

    /// Other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ServerError {
    /// Create a subprocess error with context
    pub fn subprocess(context: &str, err: impl std::fmt::Display) -> Self {
        ServerError::Subprocess(format!("{}: {}", context, err))
    }

    /// The 405/400 split depends on the protocol version of the request
    pub fn method_not_allowed(version: Version) -> Self {
        ServerError::MethodNotAllowed {
            legacy_protocol: matches!(version, Version::HTTP_09 | Version::HTTP_10),
        }
    }

    /// Status code and body sent to the client
    pub fn status_and_body(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::RouteNotFound(_)
            | ServerError::RepositoryNotFound(_)
            | ServerError::FileNotFound(_)
            | ServerError::PathTraversal(_) => (StatusCode::NOT_FOUND, "Not Found"),
            ServerError::MethodNotAllowed { legacy_protocol: false } => {
                (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
            }
            ServerError::MethodNotAllowed { legacy_protocol: true } => {
                (StatusCode::BAD_REQUEST, "Bad Request")
            }
            ServerError::AccessDenied(_) => (StatusCode::FORBIDDEN, "Forbidden"),
            ServerError::UnsupportedEncoding(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type")
            }
            ServerError::PayloadTooLarge(_) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
            }
            ServerError::Decoding(_) => (StatusCode::BAD_REQUEST, "Bad Request"),
            ServerError::Subprocess(_) | ServerError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        match &self {
            ServerError::RouteNotFound(_)
            | ServerError::RepositoryNotFound(_)
            | ServerError::FileNotFound(_)
            | ServerError::MethodNotAllowed { .. } => tracing::debug!(%status, "{}", self),
            ServerError::AccessDenied(_)
            | ServerError::PathTraversal(_)
            | ServerError::UnsupportedEncoding(_)
            | ServerError::PayloadTooLarge(_)
            | ServerError::Decoding(_) => tracing::warn!(%status, "{}", self),
            ServerError::Subprocess(_) | ServerError::Io(_) => {
                tracing::error!(%status, "{}", self)
            }
        }
        (status, body).into_response()
    }
}
