use crate::Result;
use core::future::Future;
use core::ops::Range;
use std::sync::Arc;

/// An exclusive claim on the counter values `[start, start + size)`.
///
/// Ranges are never persisted. Whoever receives one from
/// [`RangeCounter::reserve_range`] owns every value in it, forever: no other
/// reservation, in this process or any other sharing the store, will overlap
/// it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ReservedRange {
    /// First counter value in the range.
    pub start: u64,
    /// Number of counter values in the range.
    pub size: u32,
}

impl ReservedRange {
    pub const fn new(start: u64, size: u32) -> Self {
        Self { start, size }
    }

    /// One past the last counter value in the range, saturating at
    /// `u64::MAX`.
    pub const fn end(&self) -> u64 {
        self.start.saturating_add(self.size as u64)
    }

    pub const fn contains(&self, counter: u64) -> bool {
        counter >= self.start && counter < self.end()
    }

    /// Iterates the counter values in ascending order.
    pub fn iter(&self) -> Range<u64> {
        self.start..self.end()
    }
}

impl IntoIterator for ReservedRange {
    type Item = u64;
    type IntoIter = Range<u64>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// A durable source of disjoint counter ranges.
///
/// This is the only capability the key pool needs from storage.
/// Implementations must make the read-modify-write of the counter atomic
/// against every other reservation, including those from other processes
/// sharing the same store, and must leave the counter untouched when they
/// return an error.
///
/// # Example
///
/// A process-local counter, fine for tests but never for production, since
/// it forgets its position on restart:
///
/// ```
/// use keyforge::{RangeCounter, ReservedRange, Result};
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// struct LocalCounter(AtomicU64);
///
/// impl RangeCounter for LocalCounter {
///     fn range_size(&self) -> u32 {
///         100
///     }
///
///     async fn reserve_range(&self) -> Result<ReservedRange> {
///         let start = self.0.fetch_add(100, Ordering::SeqCst);
///         Ok(ReservedRange::new(start, 100))
///     }
/// }
/// ```
pub trait RangeCounter: Send + Sync + 'static {
    /// Width of every range this counter hands out.
    fn range_size(&self) -> u32;

    /// Atomically claims the next [`Self::range_size`] counter values.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ReservationFailed`] if the reservation could not
    /// be committed. No values are consumed in that case.
    fn reserve_range(&self) -> impl Future<Output = Result<ReservedRange>> + Send;
}

impl<C: RangeCounter> RangeCounter for Arc<C> {
    fn range_size(&self) -> u32 {
        (**self).range_size()
    }

    fn reserve_range(&self) -> impl Future<Output = Result<ReservedRange>> + Send {
        (**self).reserve_range()
    }
}
