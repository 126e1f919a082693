/// A result type defaulting to the crate's [`enum@Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Errors from the SQLite counter.
///
/// Through the [`keyforge::RangeCounter`] impl every variant surfaces as
/// [`keyforge::Error::ReservationFailed`], with this error as its source.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// The counter row is absent; [`crate::SqliteRangeCounter::migrate`]
    /// creates it.
    #[error("counter row {id} is missing")]
    MissingCounter { id: i64 },

    /// The stored value cannot be a counter position.
    #[error("counter row holds negative value {value}")]
    CorruptCounter { value: i64 },

    #[error("reserving {range_size} values past {last_used} overflows the counter")]
    CounterOverflow { last_used: u64, range_size: u32 },
}
