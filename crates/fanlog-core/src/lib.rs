//! # Fanlog Core
//!
//! Core types and errors for the fanlog event buffer.
//!
//! The buffer itself treats events as opaque, ordered units. This crate
//! defines what such a unit looks like to the rest of the system and the
//! error taxonomy every fanlog crate reports through.
//!
//! ## Key Types
//!
//! - [`Event`]: An immutable, indexed unit of change data
//! - [`Topic`]: The stream an event belongs to
//! - [`Payload`]: Opaque data or a stream control marker
//! - [`BufferError`]: Errors surfaced by buffer reads and writes

pub mod error;
pub mod event;

// Re-export main types
pub use error::*;
pub use event::*;
