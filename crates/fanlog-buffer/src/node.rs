//! Buffer nodes
//!
//! A node is an immutable batch of events plus the link to its successor.
//! Nodes only ever reference the node after them, so once no cursor or
//! head snapshot reaches a node it is released with everything behind it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use fanlog_core::{BufferError, Event};
use tokio_util::sync::CancellationToken;

use crate::link::Link;

static NEXT_ORIGIN: AtomicU64 = AtomicU64::new(0);

/// Identity of the buffer that created a node
///
/// Once a buffer is spliced, its origin points at the origin of the buffer
/// it continues into. Following those pointers from a node's origin lists
/// every buffer a reader starting at that node can reach.
#[derive(Debug)]
pub(crate) struct Origin {
    id: u64,
    spliced_onto: OnceLock<Arc<Origin>>,
}

impl Origin {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_ORIGIN.fetch_add(1, Ordering::Relaxed),
            spliced_onto: OnceLock::new(),
        })
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    /// Whether a reader in this origin's buffer can reach buffer `id`
    pub(crate) fn reaches(&self, id: u64) -> bool {
        let mut current = Some(self);
        while let Some(origin) = current {
            if origin.id == id {
                return true;
            }
            current = origin.spliced_onto.get().map(|next| &**next);
        }
        false
    }

    /// Record that this buffer now continues into `next`
    pub(crate) fn splice_onto(&self, next: Arc<Origin>) -> Result<(), BufferError> {
        self.spliced_onto
            .set(next)
            .map_err(|_| BufferError::Spliced)
    }
}

/// An immutable batch of events in the buffer
pub struct Node {
    events: Vec<Event>,
    link: Arc<Link>,
    origin: Arc<Origin>,
}

impl Node {
    /// Empty placeholder node, used as the start of a fresh buffer
    pub(crate) fn sentinel(origin: &Arc<Origin>) -> Self {
        Self::with_events(Vec::new(), origin)
    }

    pub(crate) fn with_events(events: Vec<Event>, origin: &Arc<Origin>) -> Self {
        Self {
            events,
            link: Arc::new(Link::new()),
            origin: Arc::clone(origin),
        }
    }

    /// Empty node owned by `origin` that shares this node's successor link
    ///
    /// Resolving another buffer's tail to a follower splices that buffer
    /// onto this one: readers continue with whatever follows `self`,
    /// without seeing `self`'s events again.
    pub(crate) fn follower(&self, origin: &Arc<Origin>) -> Self {
        Self {
            events: Vec::new(),
            link: Arc::clone(&self.link),
            origin: Arc::clone(origin),
        }
    }

    pub(crate) fn link(&self) -> &Link {
        &self.link
    }

    pub(crate) fn origin(&self) -> &Arc<Origin> {
        &self.origin
    }

    pub(crate) fn into_link(self) -> Arc<Link> {
        self.link
    }

    /// Events carried by this node, in append order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Whether this is an empty placeholder rather than an appended batch
    pub fn is_sentinel(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the first event in the batch
    pub fn first_index(&self) -> Option<u64> {
        self.events.first().map(|e| e.index)
    }

    /// Index of the last event in the batch
    pub fn last_index(&self) -> Option<u64> {
        self.events.last().map(|e| e.index)
    }

    /// Whether the batch contains an event with `index`
    pub fn has_event_index(&self, index: u64) -> bool {
        self.events.iter().any(|e| e.index == index)
    }

    /// Whether the successor (or close) has been published
    pub fn is_resolved(&self) -> bool {
        self.link.get().is_some()
    }

    /// Wait for the successor node
    ///
    /// Returns at once if the successor is already linked. Otherwise waits
    /// until the writer appends, the buffer is closed (`Closed`) or `cancel`
    /// fires (`Cancelled`).
    pub async fn next(&self, cancel: &CancellationToken) -> Result<Arc<Node>, BufferError> {
        self.link.wait(cancel).await?.to_node()
    }

    /// Successor node if already published, without waiting
    pub fn try_next(&self) -> Result<Option<Arc<Node>>, BufferError> {
        self.link.get().map(|s| s.to_node()).transpose()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("events", &self.events.len())
            .field("first_index", &self.first_index())
            .field("last_index", &self.last_index())
            .field("origin", &self.origin.id)
            .field("link", &self.link)
            .finish()
    }
}
