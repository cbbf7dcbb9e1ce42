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
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProtocolError;

/// RPC services the engine can run in stateless mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Service {
    /// Fetch side (`git upload-pack`)
    UploadPack,
    /// Push side (`git receive-pack`)
    ReceivePack,
}

impl Service {
    /// Engine subcommand name, e.g. `upload-pack`
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::UploadPack => "upload-pack",
            Service::ReceivePack => "receive-pack",
        }
    }

    /// Parse the `service` query parameter of an info/refs request
    ///
    /// Only values carrying the `git-` prefix are accepted.
    pub fn from_query(value: &str) -> Option<Self> {
        value.strip_prefix("git-").and_then(|name| name.parse().ok())
    }

    /// Content type a client must declare on an RPC request body
    pub fn request_content_type(&self) -> String {
        format!("application/x-git-{}-request", self.as_str())
    }

    /// Content type of the RPC response body
    pub fn result_content_type(&self) -> String {
        format!("application/x-git-{}-result", self.as_str())
    }

    /// Content type of a smart ref advertisement
    pub fn advertisement_content_type(&self) -> String {
        format!("application/x-git-{}-advertisement", self.as_str())
    }

    /// Per-repository engine setting consulted by the access policy
    pub fn config_key(&self) -> &'static str {
        match self {
            Service::UploadPack => "http.uploadpack",
            Service::ReceivePack => "http.receivepack",
        }
    }
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Service {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload-pack" => Ok(Service::UploadPack),
            "receive-pack" => Ok(Service::ReceivePack),
            other => Err(ProtocolError::UnknownService(other.to_string())),
        }
    }
}

/// Operation selected by matching a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `POST .../git-upload-pack`
    UploadPack,
    /// `POST .../git-receive-pack`
    ReceivePack,
    /// `GET .../info/refs`, smart advertisement or dumb fallback
    AdvertiseRefs,
    /// HEAD, alternates and other small metadata files
    GetTextFile,
    /// `objects/info/packs`
    GetInfoPacks,
    /// `objects/xx/yyyy...`
    GetLooseObject,
    /// `objects/pack/pack-*.pack`
    GetPackFile,
    /// `objects/pack/pack-*.idx`
    GetIdxFile,
}

impl Operation {
    /// The RPC service behind this operation, if it is one
    pub fn service(&self) -> Option<Service> {
        match self {
            Operation::UploadPack => Some(Service::UploadPack),
            Operation::ReceivePack => Some(Service::ReceivePack),
            _ => None,
        }
    }

    /// Whether the operation is answered from a file on disk
    pub fn serves_file(&self) -> bool {
        !matches!(
            self,
            Operation::UploadPack | Operation::ReceivePack | Operation::AdvertiseRefs
        )
    }

    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Operation::UploadPack => "upload-pack",
            Operation::ReceivePack => "receive-pack",
            Operation::AdvertiseRefs => "advertise-refs",
            Operation::GetTextFile => "get-text-file",
            Operation::GetInfoPacks => "get-info-packs",
            Operation::GetLooseObject => "get-loose-object",
            Operation::GetPackFile => "get-pack-file",
            Operation::GetIdxFile => "get-idx-file",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
