//! # Fanlog Buffer
//!
//! A concurrent, append-only event buffer that fans a single ordered stream
//! of event batches out to any number of independent readers.
//!
//! The buffer is a singly linked chain of immutable [`Node`]s. Each node owns
//! a one-shot successor link that the writer resolves exactly once, waking
//! every reader parked on it. Readers hold a [`Cursor`] and advance at their
//! own pace; the writer never waits for them.
//!
//! ## Features
//!
//! - **Single resolve-and-advance append**: appending never blocks on readers
//! - **Broadcast wakeup**: one append wakes every reader waiting on the old tail
//! - **Cancellable reads**: every blocking read takes a [`CancellationToken`]
//! - **Implicit reclamation**: nodes only point forward, so a node is freed as
//!   soon as no cursor or head snapshot still reaches it
//! - **Splicing**: a snapshot buffer can be linked onto a live buffer
//!
//! ## Example
//!
//! ```rust,ignore
//! use fanlog_buffer::EventBuffer;
//! use fanlog_core::{Event, Topic};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let buffer = EventBuffer::new();
//!     let mut cursor = buffer.cursor();
//!
//!     buffer.append(vec![Event::data(0, Topic::ServiceHealth, "up")]).unwrap();
//!
//!     let cancel = CancellationToken::new();
//!     let node = cursor.advance(&cancel).await.unwrap();
//!     assert_eq!(node.events()[0].index, 0);
//! }
//! ```

pub mod buffer;
pub mod cursor;
mod link;
pub mod node;

// Re-exports
pub use buffer::{BufferConfig, EventBuffer};
pub use cursor::Cursor;
pub use node::Node;

pub use fanlog_core::BufferError;
pub use tokio_util::sync::CancellationToken;
