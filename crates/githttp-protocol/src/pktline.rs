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
//! pkt-line framing
//!
//! Every packet starts with a four digit lowercase hex length that counts the
//! header itself, followed by the payload. The special length `0000` is a
//! flush packet and carries no payload.
//!
//! Only the encoding side is needed to frame a ref advertisement; the engine
//! performs the actual negotiation. [`decode_length`] exists so callers can
//! inspect framed output.

use crate::error::{ProtocolError, ProtocolResult};

/// Flush packet (marks end of a section)
pub const FLUSH_PKT: &[u8; 4] = b"0000";

/// Size of the length header
pub const HEADER_LEN: usize = 4;

/// Largest payload whose framed length still fits in four hex digits
pub const MAX_PKT_PAYLOAD: usize = 0xffff - HEADER_LEN;

/// Frame `data` as a single pkt-line
pub fn encode_line(data: impl AsRef<[u8]>) -> ProtocolResult<Vec<u8>> {
    let data = data.as_ref();
    if data.len() > MAX_PKT_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge(data.len()));
    }

    let mut pkt = Vec::with_capacity(data.len() + HEADER_LEN);
    pkt.extend_from_slice(format!("{:04x}", data.len() + HEADER_LEN).as_bytes());
    pkt.extend_from_slice(data);
    Ok(pkt)
}

/// The flush packet
pub fn encode_flush() -> Vec<u8> {
    FLUSH_PKT.to_vec()
}

/// Read the total packet length from the first four bytes of `pkt`
///
/// Returns 0 for a flush packet.
pub fn decode_length(pkt: &[u8]) -> ProtocolResult<usize> {
    let header = pkt.get(..HEADER_LEN).ok_or_else(|| ProtocolError::Truncated {
        expected: HEADER_LEN,
        found: pkt.len(),
    })?;

    let text = std::str::from_utf8(header)
        .map_err(|_| ProtocolError::InvalidLength(String::from_utf8_lossy(header).into_owned()))?;

    if !text.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(ProtocolError::InvalidLength(text.to_string()));
    }

    usize::from_str_radix(text, 16).map_err(|_| ProtocolError::InvalidLength(text.to_string()))
}

/// Split a framed packet into its payload, checking the declared length
pub fn decode_payload(pkt: &[u8]) -> ProtocolResult<&[u8]> {
    let len = decode_length(pkt)?;
    if len == 0 {
        return Ok(&[]);
    }
    if len < HEADER_LEN {
        return Err(ProtocolError::InvalidLength(format!("{len:04x}")));
    }
    pkt.get(HEADER_LEN..len).ok_or(ProtocolError::Truncated {
        expected: len,
        found: pkt.len(),
    })
}

/// Service announcement that opens a smart ref advertisement
///
/// `# service=git-<service>\n` framed as a pkt-line, followed by a flush.
pub fn service_announcement(service: &str) -> Vec<u8> {
    let line = format!("# service=git-{service}\n");
    // service names are short, the line can never exceed one packet
    let mut out = encode_line(line.as_bytes()).unwrap_or_default();
    out.extend_from_slice(FLUSH_PKT);
    out
}
