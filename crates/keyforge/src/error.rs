use crate::{DecodeError, KEY_SPACE};
use std::sync::Arc;

/// A result type defaulting to the crate's [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All errors `keyforge` can produce.
///
/// The refill loop handles [`Error::ReservationFailed`] itself by retrying on
/// the next tick; callers waiting for a key only ever see the wait outcomes
/// ([`Error::Timeout`], [`Error::Cancelled`], [`Error::Closed`]).
#[derive(Clone, Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The backing store could not commit a range reservation. Nothing was
    /// persisted and no counter values were consumed.
    #[error("range reservation failed: {source}")]
    ReservationFailed {
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync>,
    },

    /// A counter value fell outside the encoder's injective domain. The key
    /// space is exhausted or the counter was configured past it.
    #[error("counter {counter} is outside the key space [0, {max})", max = KEY_SPACE)]
    EncodingDomain { counter: u64 },

    /// A string could not be decoded as a key.
    #[error("invalid key: {0}")]
    Decode(#[from] DecodeError),

    /// Pool or counter parameters were rejected at construction.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// A bounded wait for a key expired.
    #[error("timed out waiting for a key")]
    Timeout,

    /// A wait for a key was abandoned through its cancellation token.
    #[error("cancelled while waiting for a key")]
    Cancelled,

    /// The pool was closed and has no keys left.
    #[error("key pool is closed")]
    Closed,
}

impl Error {
    /// Wraps a storage error as [`Error::ReservationFailed`].
    pub fn reservation<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ReservationFailed {
            source: Arc::new(err),
        }
    }

    /// Returns `true` for failures the refill loop retries on its next tick.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::ReservationFailed { .. })
    }
}
