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
//! githttp wire protocol support
//!
//! This crate holds the pieces of the git HTTP transport that do not depend on
//! an HTTP server: operation and service descriptors, pkt-line framing for ref
//! advertisements, and extraction of push/tag/fetch events from RPC payloads.

pub mod error;
pub mod events;
pub mod pktline;
pub mod types;

// Re-export commonly used types
pub use error::{ProtocolError, ProtocolResult};
pub use events::{extract_events, ChannelSink, Event, EventSink, EventType, TracingSink};
pub use types::{Operation, Service};
