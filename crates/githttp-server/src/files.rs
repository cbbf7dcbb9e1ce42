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
//! Dumb protocol file responses and cache headers

use axum::body::Body;
use axum::http::header::{
    CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, DATE, EXPIRES, LAST_MODIFIED, PRAGMA,
};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Duration, Utc};
use githttp_protocol::Operation;
use std::io;
use std::path::Path;
use tokio_util::io::ReaderStream;

use crate::error::{ServerError, ServerResult};
use crate::security::{log_path_traversal_attempt, validate_file_path};

/// Seconds immutable files may be cached for
pub const CACHE_FOREVER_SECS: i64 = 31_536_000;

const NO_CACHE_EXPIRES: &str = "Fri, 01 Jan 1980 00:00:00 GMT";

/// Caching headers attached to a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Mutable metadata, revalidate every time
    NoCache,
    /// Content-addressed data, cache for a year
    Forever,
}

impl CachePolicy {
    /// Write the policy's headers, dating them at `now`
    pub fn apply(self, headers: &mut HeaderMap, now: DateTime<Utc>) {
        match self {
            CachePolicy::NoCache => {
                headers.insert(EXPIRES, HeaderValue::from_static(NO_CACHE_EXPIRES));
                headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
                headers.insert(
                    CACHE_CONTROL,
                    HeaderValue::from_static("no-cache, max-age=0, must-revalidate"),
                );
            }
            CachePolicy::Forever => {
                let expires = now + Duration::seconds(CACHE_FOREVER_SECS);
                insert_date(headers, DATE, now);
                insert_date(headers, EXPIRES, expires);
                headers.insert(
                    CACHE_CONTROL,
                    HeaderValue::from_static("public, max-age=31536000"),
                );
            }
        }
    }
}

/// Format a timestamp as an HTTP-date
pub fn http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn insert_date(headers: &mut HeaderMap, name: axum::http::HeaderName, time: DateTime<Utc>) {
    if let Ok(value) = HeaderValue::from_str(&http_date(time)) {
        headers.insert(name, value);
    }
}

/// How a repository file is served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileResponse {
    /// Content-Type header value
    pub content_type: &'static str,
    /// Caching headers
    pub cache: CachePolicy,
}

impl FileResponse {
    /// `info/refs` as served to dumb clients
    pub const INFO_REFS: FileResponse = FileResponse {
        content_type: "text/plain; charset=utf-8",
        cache: CachePolicy::NoCache,
    };

    /// Response shape for a file-serving operation
    pub fn for_operation(operation: Operation) -> Option<Self> {
        let (content_type, cache) = match operation {
            Operation::GetTextFile => ("text/plain", CachePolicy::NoCache),
            Operation::GetInfoPacks => ("text/plain; charset=utf-8", CachePolicy::Forever),
            Operation::GetLooseObject => ("application/x-git-loose-object", CachePolicy::Forever),
            Operation::GetPackFile => ("application/x-git-packed-objects", CachePolicy::Forever),
            Operation::GetIdxFile => {
                ("application/x-git-packed-objects-toc", CachePolicy::Forever)
            }
            Operation::UploadPack | Operation::ReceivePack | Operation::AdvertiseRefs => {
                return None
            }
        };
        Some(Self {
            content_type,
            cache,
        })
    }

    /// Stream `file_path` below the repository directory
    pub async fn send(self, dir: &Path, file_path: &str) -> ServerResult<Response> {
        if let Err(reason) = validate_file_path(file_path) {
            log_path_traversal_attempt(file_path, reason);
            return Err(ServerError::PathTraversal(file_path.to_string()));
        }

        let path = dir.join(file_path);
        let file = match tokio::fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ServerError::FileNotFound(path))
            }
            Err(e) => return Err(ServerError::Io(e)),
        };

        let metadata = file.metadata().await?;
        if !metadata.is_file() {
            return Err(ServerError::FileNotFound(path));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(self.content_type));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        if let Ok(modified) = metadata.modified() {
            insert_date(&mut headers, LAST_MODIFIED, modified.into());
        }
        self.cache.apply(&mut headers, Utc::now());

        tracing::debug!(
            path = %path.display(),
            size = metadata.len(),
            "Serving repository file"
        );

        let body = Body::from_stream(ReaderStream::new(file));
        Ok((StatusCode::OK, headers, body).into_response())
    }
}
