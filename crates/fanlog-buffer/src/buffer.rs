//! Buffer spine
//!
//! Owns the tail of the chain and performs the single append step: link a
//! new node as the tail's successor, waking every reader parked there, and
//! move the tail forward.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use fanlog_core::{BufferError, Event};
use parking_lot::{Mutex, const_mutex};
use tracing::{debug, error, instrument, trace, warn};

use crate::cursor::Cursor;
use crate::link::Successor;
use crate::node::{Node, Origin};

/// Serializes splice cycle checks across buffers
static SPLICE_LOCK: Mutex<()> = const_mutex(());

/// Configuration for an event buffer
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Name used in log fields
    pub name: String,
    /// Warn when a batch's first index does not exceed the previous last index
    pub check_index_order: bool,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            name: "events".to_string(),
            check_index_order: true,
        }
    }
}

impl BufferConfig {
    /// Create a config with the given buffer name
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpineState {
    Open,
    Closed,
    Spliced,
}

/// Writer-side state, only locked for the resolve-and-advance step
#[derive(Debug)]
struct Spine {
    tail: Arc<Node>,
    state: SpineState,
    last_index: Option<u64>,
}

/// Append-only fan-out event buffer
///
/// Appends are expected from a single writer at a time; the internal lock
/// keeps concurrent appends memory safe but does not define an order between
/// them. Readers never take that lock while waiting: they park on the link of
/// the node they are positioned at.
#[derive(Debug)]
pub struct EventBuffer {
    config: BufferConfig,
    origin: Arc<Origin>,
    spine: Mutex<Spine>,
    appended: AtomicU64,
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBuffer {
    /// Create an empty buffer with the default configuration
    pub fn new() -> Self {
        Self::with_config(BufferConfig::default())
    }

    /// Create an empty buffer
    ///
    /// The buffer starts with a single sentinel node as both head and tail.
    pub fn with_config(config: BufferConfig) -> Self {
        let origin = Origin::new();
        Self {
            config,
            spine: Mutex::new(Spine {
                tail: Arc::new(Node::sentinel(&origin)),
                state: SpineState::Open,
                last_index: None,
            }),
            appended: AtomicU64::new(0),
            origin,
        }
    }

    /// Get the buffer configuration
    pub fn config(&self) -> &BufferConfig {
        &self.config
    }

    /// Entry point for a new reader
    ///
    /// This is the most recently appended node (the sentinel before the first
    /// append). Its own events were published before the call; advancing
    /// from it yields every batch appended afterwards, in order.
    pub fn head(&self) -> Arc<Node> {
        Arc::clone(&self.spine.lock().tail)
    }

    /// Cursor positioned at [`head`](Self::head)
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.head())
    }

    /// Append a batch of events
    ///
    /// Links a new node carrying `events` after the current tail and wakes
    /// every reader waiting there. Never waits on readers.
    ///
    /// # Errors
    ///
    /// - `EmptyBatch` if `events` is empty
    /// - `Closed` if the buffer was closed
    /// - `Spliced` if the buffer was spliced onto another buffer
    pub fn append(&self, events: Vec<Event>) -> Result<(), BufferError> {
        let (first, last) = match (events.first(), events.last()) {
            (Some(first), Some(last)) => (first.index, last.index),
            _ => {
                error!(buffer = %self.config.name, "Rejected empty batch");
                return Err(BufferError::EmptyBatch);
            }
        };

        let mut spine = self.spine.lock();
        match spine.state {
            SpineState::Open => {}
            SpineState::Closed => return Err(BufferError::Closed),
            SpineState::Spliced => return Err(BufferError::Spliced),
        }

        if let Some(previous) = spine.last_index {
            if self.config.check_index_order && first <= previous {
                warn!(
                    buffer = %self.config.name,
                    previous,
                    first,
                    "Batch index does not advance"
                );
            }
        }

        let node = Arc::new(Node::with_events(events, &self.origin));
        if let Err(err) = spine.tail.link().resolve(Successor::Node(Arc::clone(&node))) {
            error!(buffer = %self.config.name, %err, "Tail resolved outside of append");
            return Err(err);
        }
        spine.tail = node;
        spine.last_index = Some(last);
        drop(spine);

        self.appended.fetch_add(1, Ordering::Relaxed);
        trace!(buffer = %self.config.name, first, last, "Appended batch");
        Ok(())
    }

    /// Close the buffer
    ///
    /// Every reader waiting at the tail, and every reader that reaches it
    /// later, gets `Closed`. Closing twice is a no-op, as is closing a buffer
    /// that was spliced (its tail belongs to the buffer it was spliced onto).
    #[instrument(skip(self), fields(buffer = %self.config.name))]
    pub fn close(&self) {
        let mut spine = self.spine.lock();
        match spine.state {
            SpineState::Open => {}
            SpineState::Closed => return,
            SpineState::Spliced => {
                debug!("Close ignored on spliced buffer");
                return;
            }
        }

        if let Err(err) = spine.tail.link().resolve(Successor::Closed) {
            error!(%err, "Tail resolved outside of append");
        }
        spine.state = SpineState::Closed;
        debug!(last_index = ?spine.last_index, "Buffer closed");
    }

    /// Splice this buffer onto another buffer's node
    ///
    /// After the last batch of this buffer, readers continue with whatever
    /// is appended after `live` in the other buffer. Used to hand readers
    /// from a snapshot backlog to the live stream without a gap. The spliced
    /// buffer accepts no further appends.
    ///
    /// The spliced buffer's tail shares `live`'s successor link, so while
    /// this buffer is alive it keeps the live chain from `live` onward
    /// reachable. Drop it once readers have been handed their cursors.
    ///
    /// # Errors
    ///
    /// - `Closed` if this buffer was closed
    /// - `Spliced` if it was already spliced, or if readers could get from
    ///   `live` back into this buffer (`live` belongs to this buffer, or to
    ///   one spliced onto it), which would turn the chain into a loop
    #[instrument(skip(self, live), fields(buffer = %self.config.name))]
    pub fn splice_onto(&self, live: &Node) -> Result<(), BufferError> {
        let mut spine = self.spine.lock();
        match spine.state {
            SpineState::Open => {}
            SpineState::Closed => return Err(BufferError::Closed),
            SpineState::Spliced => return Err(BufferError::Spliced),
        }

        let _splicing = SPLICE_LOCK.lock();
        if live.origin().reaches(self.origin.id()) {
            error!(
                live_origin = live.origin().id(),
                "Refusing to splice a buffer onto a node that leads back into it"
            );
            return Err(BufferError::Spliced);
        }

        self.origin.splice_onto(Arc::clone(live.origin()))?;
        let follower = Arc::new(live.follower(&self.origin));
        spine
            .tail
            .link()
            .resolve(Successor::Node(Arc::clone(&follower)))?;
        spine.tail = follower;
        spine.state = SpineState::Spliced;
        debug!(last_index = ?spine.last_index, "Buffer spliced");
        Ok(())
    }

    /// Whether [`close`](Self::close) was called
    pub fn is_closed(&self) -> bool {
        self.spine.lock().state == SpineState::Closed
    }

    /// Number of batches appended so far
    pub fn appended_batches(&self) -> u64 {
        self.appended.load(Ordering::Relaxed)
    }

    /// Index of the last appended event
    pub fn last_index(&self) -> Option<u64> {
        self.spine.lock().last_index
    }
}
