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
//! Endpoint route table
//!
//! Every endpoint is anchored at the end of the request path. Whatever
//! precedes the fixed suffix is the repository prefix. The table is built once
//! and tested in order, most specific pattern first; the first structural
//! match decides the operation before the method is looked at.

use axum::http::Method;
use githttp_protocol::Operation;

/// Structural part of an endpoint pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Matcher {
    /// A literal tail such as `/info/refs`
    Suffix(&'static str),
    /// `/objects/info/<name>` where name has no slash
    InfoFile,
    /// `/objects/<2-hex>/<38-hex>`
    LooseObject,
    /// `/objects/pack/pack-<40-hex>.<ext>`
    Pack {
        /// File extension without the dot
        ext: &'static str,
    },
}

impl Matcher {
    /// Split `path` into (repository prefix, residual file path) on a match
    ///
    /// The residual path has no leading slash.
    pub fn matches<'a>(&self, path: &'a str) -> Option<(&'a str, &'a str)> {
        let prefix = match *self {
            Matcher::Suffix(suffix) => path.strip_suffix(suffix)?,
            Matcher::InfoFile => {
                let (dir, name) = path.rsplit_once('/')?;
                if name.contains('/') {
                    return None;
                }
                dir.strip_suffix("/objects/info")?
            }
            Matcher::LooseObject => {
                let (rest, object) = path.rsplit_once('/')?;
                let (rest, fanout) = rest.rsplit_once('/')?;
                if !is_lower_hex(fanout, 2) || !is_lower_hex(object, 38) {
                    return None;
                }
                rest.strip_suffix("/objects")?
            }
            Matcher::Pack { ext } => {
                let (rest, file) = path.rsplit_once('/')?;
                let hash = file
                    .strip_prefix("pack-")?
                    .strip_suffix(ext)?
                    .strip_suffix('.')?;
                if !is_lower_hex(hash, 40) {
                    return None;
                }
                rest.strip_suffix("/objects/pack")?
            }
        };

        Some((prefix, &path[prefix.len() + 1..]))
    }
}

fn is_lower_hex(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// One row of the route table
#[derive(Debug, Clone)]
pub struct Endpoint {
    /// Path shape
    pub matcher: Matcher,
    /// Required method
    pub method: Method,
    /// Operation selected on match
    pub operation: Operation,
}

/// A request path resolved to an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    /// Everything before the endpoint suffix
    pub repo_prefix: String,
    /// Request path with the repository prefix removed
    pub file_path: String,
    /// Selected operation
    pub operation: Operation,
}

/// Why a path did not route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteMiss {
    /// No pattern matched
    NotFound,
    /// A pattern matched but requires another method
    WrongMethod {
        /// Operation the path would have selected
        operation: Operation,
    },
}

/// Ordered, immutable table of protocol endpoints
#[derive(Debug, Clone)]
pub struct RouteTable {
    endpoints: Vec<Endpoint>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    /// Build the standard git HTTP endpoint table
    pub fn new() -> Self {
        use Matcher::*;

        let get = |matcher, operation| Endpoint {
            matcher,
            method: Method::GET,
            operation,
        };
        let post = |matcher, operation| Endpoint {
            matcher,
            method: Method::POST,
            operation,
        };

        let endpoints = vec![
            post(Suffix("/git-upload-pack"), Operation::UploadPack),
            post(Suffix("/git-receive-pack"), Operation::ReceivePack),
            get(Suffix("/info/refs"), Operation::AdvertiseRefs),
            get(Suffix("/HEAD"), Operation::GetTextFile),
            get(Suffix("/objects/info/alternates"), Operation::GetTextFile),
            get(Suffix("/objects/info/http-alternates"), Operation::GetTextFile),
            get(Suffix("/objects/info/packs"), Operation::GetInfoPacks),
            get(InfoFile, Operation::GetTextFile),
            get(LooseObject, Operation::GetLooseObject),
            get(Pack { ext: "pack" }, Operation::GetPackFile),
            get(Pack { ext: "idx" }, Operation::GetIdxFile),
        ];

        Self { endpoints }
    }

    /// Endpoints in matching order
    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    /// Match a request path and method
    pub fn resolve(&self, path: &str, method: &Method) -> Result<RouteMatch, RouteMiss> {
        let (endpoint, (prefix, file_path)) = self
            .endpoints
            .iter()
            .find_map(|endpoint| endpoint.matcher.matches(path).map(|m| (endpoint, m)))
            .ok_or(RouteMiss::NotFound)?;

        if endpoint.method != *method {
            return Err(RouteMiss::WrongMethod {
                operation: endpoint.operation,
            });
        }

        Ok(RouteMatch {
            repo_prefix: prefix.to_string(),
            file_path: file_path.to_string(),
            operation: endpoint.operation,
        })
    }
}
