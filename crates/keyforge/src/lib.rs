//! Unique short-key allocation in the ticket-server style.
//!
//! A durable [`RangeCounter`] hands out disjoint blocks of counter values.
//! A [`KeyPool`] reserves one block at a time, turns every value into a
//! fixed-length base62 key with [`encode`], and buffers the keys so callers
//! are served from memory. A background [`Refiller`] keeps the buffer above
//! its low watermark.
//!
//! Uniqueness rests on two facts: no two reservations ever overlap, and the
//! encoder is injective over [`KEY_SPACE`]. A crash loses at most the unissued
//! part of the buffered ranges; it never causes a key to be issued twice.
//!
//! ## Features
//!
//! - `tracing`: emit spans and events for pool construction, refill
//!   decisions, reservations, and shutdown.

mod counter;
mod encoder;
mod error;
mod pool;

pub use crate::counter::*;
pub use crate::encoder::*;
pub use crate::error::*;
pub use crate::pool::*;
