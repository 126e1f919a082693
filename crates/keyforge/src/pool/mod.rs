//! Bounded in-memory pool of pre-minted keys.
//!
//! A [`KeyPool`] buffers up to `2 × range_size` keys. Whenever the buffer
//! drains to its low watermark (`range_size / 10`), a refill cycle reserves a
//! fresh range from the [`RangeCounter`], encodes every value in it, and
//! enqueues the keys. Callers of [`KeyPool::get`] are normally served straight
//! from the buffer and only wait when it is empty.
//!
//! ## Refill decisions
//!
//! Reserving a range consumes counter values permanently, so two overlapping
//! reservations for the same shortfall would waste a whole range. The watermark
//! check is therefore double-checked: a cheap lock-free look at the buffer
//! length, then the same check again under a dedicated refill mutex. The mutex
//! only covers the decision and the reservation; it is released before the
//! keys are enqueued, so a refill blocked on a full buffer never stalls the
//! next decision.
//!
//! ## Lifecycle
//!
//! [`KeyPool::new`] spawns nothing. [`KeyPool::start`] spawns the background
//! refill loop and returns a [`Refiller`] handle that stops it. Tests that need
//! precise control over timing can skip `start` and drive
//! [`KeyPool::refill_once`] directly.

mod refiller;
mod stats;

pub use refiller::*;
pub use stats::*;

use crate::{Error, KEY_SPACE, RangeCounter, ReservedRange, Result, encode};
use async_channel::{Receiver, Sender};
use core::time::Duration;
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio_util::sync::CancellationToken;

/// Default period between refill checks.
pub const DEFAULT_REFILL_INTERVAL: Duration = Duration::from_secs(1);

/// Construction parameters for a [`KeyPool`].
///
/// The range size, and with it the buffer capacity and watermark, comes from
/// the [`RangeCounter`] itself.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Period of the background refill check.
    pub refill_interval: Duration,
    /// Span every pool event is recorded under.
    #[cfg(feature = "tracing")]
    pub span: tracing::Span,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            refill_interval: DEFAULT_REFILL_INTERVAL,
            #[cfg(feature = "tracing")]
            span: tracing::info_span!("key_pool"),
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn with_refill_interval(mut self, refill_interval: Duration) -> Self {
        self.refill_interval = refill_interval;
        self
    }

    /// Records the pool's events under `span` instead of the default
    /// `key_pool` span.
    #[cfg(feature = "tracing")]
    #[must_use]
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }
}

/// What a single refill cycle did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefillOutcome {
    /// The buffer was above the watermark; nothing was reserved.
    Skipped,
    /// A range was reserved and all of its keys were enqueued.
    Refilled(ReservedRange),
}

/// A shared, cloneable handle to a pool of unique keys.
///
/// Every key handed out by [`KeyPool::get`] (or its bounded variants) maps to
/// a counter value reserved exclusively for this pool, and is given to exactly
/// one caller.
///
/// # Example
///
/// ```
/// use keyforge::{KeyPool, PoolConfig, RangeCounter, ReservedRange, Result};
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
///         Ok(ReservedRange::new(self.0.fetch_add(100, Ordering::SeqCst), 100))
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<()> {
/// let pool = KeyPool::new(LocalCounter(AtomicU64::new(0)), PoolConfig::default())?;
/// let refiller = pool.start();
///
/// let key = pool.get().await?;
/// assert_eq!(keyforge::decode(&key)?, 0);
///
/// refiller.shutdown().await.unwrap();
/// # Ok(())
/// # }
/// ```
pub struct KeyPool<C: RangeCounter> {
    inner: Arc<Inner<C>>,
}

impl<C: RangeCounter> Clone for KeyPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<C> {
    counter: C,
    tx: Sender<String>,
    rx: Receiver<String>,
    // Serializes decisions to reserve. Queue access has its own
    // synchronization inside the channel.
    refill_lock: Mutex<()>,
    wake: Notify,
    capacity: usize,
    watermark: usize,
    refill_interval: Duration,
    stats: Stats,
    #[cfg(feature = "tracing")]
    span: tracing::Span,
}

impl<C> Inner<C> {
    fn is_low(&self) -> bool {
        self.rx.len() <= self.watermark
    }
}

impl<C: RangeCounter> KeyPool<C> {
    /// Creates an empty pool backed by `counter`.
    ///
    /// No background work is started; call [`KeyPool::start`] for that.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the counter's range size or the
    /// refill interval is zero.
    pub fn new(counter: C, config: PoolConfig) -> Result<Self> {
        let range_size = counter.range_size();
        if range_size == 0 {
            return Err(Error::InvalidConfig {
                reason: "range size must be greater than 0".to_string(),
            });
        }
        if config.refill_interval.is_zero() {
            return Err(Error::InvalidConfig {
                reason: "refill interval must be greater than 0".to_string(),
            });
        }

        let capacity = 2 * range_size as usize;
        let watermark = range_size as usize / 10;
        let (tx, rx) = async_channel::bounded(capacity);

        let inner = Inner {
            counter,
            tx,
            rx,
            refill_lock: Mutex::new(()),
            wake: Notify::new(),
            capacity,
            watermark,
            refill_interval: config.refill_interval,
            stats: Stats::default(),
            #[cfg(feature = "tracing")]
            span: config.span,
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            parent: &inner.span,
            capacity,
            watermark,
            range_size,
            "key pool created"
        );

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Takes the next key, waiting for the refiller if the buffer is empty.
    ///
    /// The wait has no upper bound: if the store stays unreachable the caller
    /// waits until it recovers. Callers that must not hang use
    /// [`KeyPool::get_timeout`] or [`KeyPool::get_cancellable`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Closed`] once the pool is closed and drained.
    pub async fn get(&self) -> Result<String> {
        let inner = &*self.inner;
        if inner.is_low() {
            // Don't make the refiller wait out the rest of its interval.
            inner.wake.notify_one();
        }
        let key = inner.rx.recv().await.map_err(|_| Error::Closed)?;
        inner.stats.record_issued();
        Ok(key)
    }

    /// Like [`KeyPool::get`], but gives up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] if no key arrived in time, or
    /// [`Error::Closed`] once the pool is closed and drained.
    pub async fn get_timeout(&self, timeout: Duration) -> Result<String> {
        tokio::time::timeout(timeout, self.get())
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Like [`KeyPool::get`], but gives up when `token` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] if the token fired first, or
    /// [`Error::Closed`] once the pool is closed and drained.
    pub async fn get_cancellable(&self, token: &CancellationToken) -> Result<String> {
        tokio::select! {
            biased;
            () = token.cancelled() => Err(Error::Cancelled),
            key = self.get() => key,
        }
    }

    /// Enqueues a minted key, waiting while the buffer is full.
    pub(crate) async fn put(&self, key: String) -> Result<()> {
        self.inner.tx.send(key).await.map_err(|_| Error::Closed)?;
        self.inner.stats.record_minted();
        Ok(())
    }

    /// Runs one refill cycle: reserve and enqueue a range if the buffer is at
    /// or below the watermark, otherwise do nothing.
    ///
    /// # Errors
    ///
    /// - [`Error::ReservationFailed`] if the counter could not commit. Nothing
    ///   was consumed and a later cycle may retry.
    /// - [`Error::EncodingDomain`] if the reserved range reaches past the key
    ///   space. No key from the range is enqueued.
    /// - [`Error::Closed`] if the pool is closed, or was closed while
    ///   enqueuing.
    pub async fn refill_once(&self) -> Result<RefillOutcome> {
        let inner = &*self.inner;
        if inner.tx.is_closed() {
            return Err(Error::Closed);
        }
        if !inner.is_low() {
            #[cfg(feature = "tracing")]
            tracing::trace!(parent: &inner.span, available = inner.rx.len(), "refill skipped");
            return Ok(RefillOutcome::Skipped);
        }

        let range = {
            let _guard = inner.refill_lock.lock().await;

            // Another cycle may have refilled while this one waited.
            if !inner.is_low() {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    parent: &inner.span,
                    available = inner.rx.len(),
                    "refill skipped after re-check"
                );
                return Ok(RefillOutcome::Skipped);
            }

            match inner.counter.reserve_range().await {
                Ok(range) => range,
                Err(e) => {
                    inner.stats.record_reservation_failure();
                    #[cfg(feature = "tracing")]
                    tracing::warn!(parent: &inner.span, error = %e, "range reservation failed");
                    return Err(e);
                }
            }
            // Guard dropped here: enqueuing below may block on a full buffer.
        };
        inner.stats.record_reservation();

        if range.end() > KEY_SPACE {
            let counter = range.start.max(KEY_SPACE);
            #[cfg(feature = "tracing")]
            tracing::error!(
                parent: &inner.span,
                start = range.start,
                size = range.size,
                "reserved range reaches past the key space"
            );
            return Err(Error::EncodingDomain { counter });
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            parent: &inner.span,
            start = range.start,
            size = range.size,
            "range reserved"
        );

        for counter in range {
            self.put(encode(counter)?).await?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            parent: &inner.span,
            start = range.start,
            available = inner.rx.len(),
            "refill complete"
        );

        Ok(RefillOutcome::Refilled(range))
    }

    /// Closes the buffer. Keys already in it are still handed out; once they
    /// are gone every wait returns [`Error::Closed`]. A running refiller stops
    /// on its next cycle.
    ///
    /// Returns `true` if this call closed the pool.
    pub fn close(&self) -> bool {
        let closed = self.inner.tx.close();
        self.inner.wake.notify_one();

        #[cfg(feature = "tracing")]
        {
            if closed {
                tracing::info!(
                    parent: &self.inner.span,
                    remaining = self.inner.rx.len(),
                    "key pool closed"
                );
            }
        }

        closed
    }

    pub fn is_closed(&self) -> bool {
        self.inner.tx.is_closed()
    }

    /// Keys currently buffered.
    pub fn available(&self) -> usize {
        self.inner.rx.len()
    }

    /// Buffer capacity, `2 × range_size`.
    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Buffer length at or below which a refill is triggered.
    pub fn watermark(&self) -> usize {
        self.inner.watermark
    }

    pub fn range_size(&self) -> u32 {
        self.inner.counter.range_size()
    }

    pub fn refill_interval(&self) -> Duration {
        self.inner.refill_interval
    }

    pub fn counter(&self) -> &C {
        &self.inner.counter
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats.snapshot()
    }
}
