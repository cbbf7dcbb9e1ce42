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
//! Protocol error types

use thiserror::Error;

/// Result type alias for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while framing or interpreting protocol data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Payload does not fit in a single pkt-line
    #[error(
        "pkt-line payload too large: {0} bytes (max {max})",
        max = crate::pktline::MAX_PKT_PAYLOAD
    )]
    PayloadTooLarge(usize),

    /// Length header is not four hex digits
    #[error("invalid pkt-line length header: {0:?}")]
    InvalidLength(String),

    /// Buffer ended before the declared packet length
    #[error("truncated pkt-line: expected {expected} bytes, found {found}")]
    Truncated {
        /// Declared packet length including the header
        expected: usize,
        /// Bytes actually available
        found: usize,
    },

    /// Unrecognised RPC service name
    #[error("unknown service: {0}")]
    UnknownService(String),

    /// Unrecognised event type name
    #[error("'{0}' is not a known git event type")]
    UnknownEventType(String),
}
