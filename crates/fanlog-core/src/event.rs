//! Events carried by the buffer

use std::fmt::Display;
use std::str::FromStr;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::EventError;

/// Topic an event was published on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    /// Health changes of service instances
    ServiceHealth,
    /// Health changes of connect-enabled service instances
    ServiceHealthConnect,
}

impl Topic {
    /// Stable lowercase name of the topic
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ServiceHealth => "service_health",
            Self::ServiceHealthConnect => "service_health_connect",
        }
    }
}

impl Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "service_health" => Ok(Self::ServiceHealth),
            "service_health_connect" => Ok(Self::ServiceHealthConnect),
            other => Err(EventError::UnknownTopic(other.to_string())),
        }
    }
}

/// Event payload
///
/// The buffer never looks inside `Data`; the marker variants exist so that
/// subscribers can tell snapshot boundaries apart from ordinary changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Payload {
    /// Opaque change data
    Data(Bytes),
    /// Marks the end of the initial snapshot; live changes follow
    EndOfSnapshot,
    /// The subscriber's previous view is stale and a new snapshot follows
    NewSnapshotToFollow,
}

/// An indexed, immutable unit of change data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Position in the log, strictly increasing across appends
    pub index: u64,
    /// Topic the event was published on
    pub topic: Topic,
    /// Event content
    pub payload: Payload,
}

impl Event {
    /// Create an event carrying opaque data
    pub fn data(index: u64, topic: Topic, data: impl Into<Bytes>) -> Self {
        Self {
            index,
            topic,
            payload: Payload::Data(data.into()),
        }
    }

    /// Create an end-of-snapshot marker
    pub fn end_of_snapshot(index: u64, topic: Topic) -> Self {
        Self {
            index,
            topic,
            payload: Payload::EndOfSnapshot,
        }
    }

    /// Create a new-snapshot-to-follow marker
    pub fn new_snapshot_to_follow(index: u64, topic: Topic) -> Self {
        Self {
            index,
            topic,
            payload: Payload::NewSnapshotToFollow,
        }
    }

    /// Whether this event carries opaque data
    pub fn is_data(&self) -> bool {
        matches!(self.payload, Payload::Data(_))
    }

    /// Whether this event ends the initial snapshot
    pub fn is_end_of_snapshot(&self) -> bool {
        matches!(self.payload, Payload::EndOfSnapshot)
    }

    /// Whether this event announces a fresh snapshot
    pub fn is_new_snapshot_to_follow(&self) -> bool {
        matches!(self.payload, Payload::NewSnapshotToFollow)
    }
}
