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
//! Push, tag and fetch events derived from RPC request payloads
//!
//! Extraction is a pattern scan over the raw request bytes rather than a
//! structural pkt-line parse. It copes with the loose framing real clients
//! send, but it cannot tell a ref-update line apart from identical bytes that
//! happen to occur inside pack data. Such a sequence produces a spurious
//! event; this is a known limitation of the scan.

use regex::bytes::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;
use tokio::sync::mpsc;

use crate::error::ProtocolError;
use crate::types::Service;

/// `<old> <new> refs/(heads|tags)/<name>` terminated by a space, `00` or NUL,
/// or a payload that is nothing but a flush packet.
static RECEIVE_PACK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?-u)([0-9a-fA-F]{40}) ([0-9a-fA-F]{40}) refs/(heads|tags)/(.*?)( |00|\x00)|^(0000)$",
    )
    .expect("receive-pack pattern is valid")
});

/// A line opening with a token ending in `want` (usually `0032want`)
/// followed by a full object id.
static UPLOAD_PACK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m-u)^\S*want ([0-9a-fA-F]{40})").expect("upload-pack pattern is valid")
});

/// Kind of event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A tag ref was created or moved
    Tag,
    /// A branch ref was created or moved
    Push,
    /// A client asked for an object
    Fetch,
}

impl EventType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Tag => "tag",
            EventType::Push => "push",
            EventType::Fetch => "fetch",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tag" => Ok(EventType::Tag),
            "push" => Ok(EventType::Push),
            "fetch" => Ok(EventType::Fetch),
            other => Err(ProtocolError::UnknownEventType(other.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// An event observed in a push or fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event kind
    #[serde(rename = "type")]
    pub event_type: EventType,

    /// Object id the ref now points at, or the wanted object
    pub commit: String,

    /// Tag name (tag events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Previous object id (push and tag events); all zeros for a new ref
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<String>,

    /// Branch name (push events only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    /// Repository directory the request was served from
    #[serde(skip)]
    pub dir: PathBuf,
}

impl Event {
    /// Fetch of `commit`
    pub fn fetch(dir: impl Into<PathBuf>, commit: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Fetch,
            commit: commit.into(),
            tag: None,
            last: None,
            branch: None,
            dir: dir.into(),
        }
    }

    /// Branch `branch` moved from `last` to `commit`
    pub fn push(
        dir: impl Into<PathBuf>,
        last: impl Into<String>,
        commit: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            event_type: EventType::Push,
            commit: commit.into(),
            tag: None,
            last: Some(last.into()),
            branch: Some(branch.into()),
            dir: dir.into(),
        }
    }

    /// Tag `tag` moved from `last` to `commit`
    pub fn tag(
        dir: impl Into<PathBuf>,
        last: impl Into<String>,
        commit: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        Self {
            event_type: EventType::Tag,
            commit: commit.into(),
            tag: Some(tag.into()),
            last: Some(last.into()),
            branch: None,
            dir: dir.into(),
        }
    }
}

/// Derive events from a complete RPC request payload
///
/// Events come back in the order their lines first appear in the payload.
/// An empty result is normal, e.g. a fetch of refs the client already has.
pub fn extract_events(service: Service, dir: impl Into<PathBuf>, payload: &[u8]) -> Vec<Event> {
    let dir = dir.into();
    match service {
        Service::UploadPack => UPLOAD_PACK_PATTERN
            .captures_iter(payload)
            .filter_map(|caps| caps.get(1))
            .map(|sha| Event::fetch(dir.clone(), lossy(sha.as_bytes())))
            .collect(),
        Service::ReceivePack => RECEIVE_PACK_PATTERN
            .captures_iter(payload)
            .filter_map(|caps| {
                // the bare flush alternative carries no ref update
                let last = caps.get(1)?;
                let commit = caps.get(2)?;
                let namespace = caps.get(3)?;
                let name = caps.get(4)?;

                let (last, commit, name) =
                    (lossy(last.as_bytes()), lossy(commit.as_bytes()), lossy(name.as_bytes()));
                Some(if namespace.as_bytes() == b"heads" {
                    Event::push(dir.clone(), last, commit, name)
                } else {
                    Event::tag(dir.clone(), last, commit, name)
                })
            })
            .collect(),
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Destination for extracted events
///
/// Publishing must not block; the request is still in flight when it runs.
pub trait EventSink: Send + Sync {
    /// Hand one event to the sink
    fn publish(&self, event: Event);
}

impl<F> EventSink for F
where
    F: Fn(Event) + Send + Sync,
{
    fn publish(&self, event: Event) {
        self(event)
    }
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Event>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event receiver dropped, discarding event");
        }
    }
}

/// Writes each event to the log as structured fields
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: Event) {
        tracing::info!(
            target: "githttp::events",
            event_type = %event.event_type,
            commit = %event.commit,
            last = event.last.as_deref().unwrap_or(""),
            branch = event.branch.as_deref().unwrap_or(""),
            tag = event.tag.as_deref().unwrap_or(""),
            dir = %event.dir.display(),
            "git event"
        );
    }
}
