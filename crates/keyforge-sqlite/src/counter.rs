use crate::{Error, Result, SqliteOptions, options::validate_range_size};
use keyforge::{RangeCounter, ReservedRange};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::path::Path;
use std::str::FromStr;

/// Primary key of the singleton counter row.
pub const COUNTER_ID: i64 = 1;

const CREATE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS range_counters (
    id INTEGER PRIMARY KEY,
    last_used INTEGER NOT NULL CHECK (last_used >= 0)
)";

const SEED_ROW: &str = "INSERT OR IGNORE INTO range_counters (id, last_used) VALUES (?1, 0)";

// A no-op write as the first statement makes SQLite take the database write
// lock before anything is read, so the read below can't go stale.
const LOCK_ROW: &str = "UPDATE range_counters SET last_used = last_used WHERE id = ?1";

const READ_ROW: &str = "SELECT last_used FROM range_counters WHERE id = ?1";

const ADVANCE_ROW: &str = "UPDATE range_counters SET last_used = ?1 WHERE id = ?2";

/// A [`RangeCounter`] persisted in a single SQLite row.
///
/// Every reservation is one transaction that locks, reads, and advances the
/// row. Any number of counters, in any number of processes, may share a
/// database file: SQLite's write lock serializes them, and a waiter gives up
/// with `SQLITE_BUSY` after [`SqliteOptions::busy_timeout`].
#[derive(Clone, Debug)]
pub struct SqliteRangeCounter {
    pool: SqlitePool,
    range_size: u32,
}

impl SqliteRangeCounter {
    /// Opens (creating if needed) the database at `url`, e.g.
    /// `sqlite://keyforge.db`, and bootstraps the counter row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] for rejected options, or
    /// [`Error::Database`] if the URL is malformed or the database can't be
    /// opened or migrated.
    pub async fn connect(url: &str, options: SqliteOptions) -> Result<Self> {
        let connect = SqliteConnectOptions::from_str(url)?;
        Self::connect_with(connect, options).await
    }

    /// Like [`SqliteRangeCounter::connect`], for a filesystem path.
    pub async fn open(path: impl AsRef<Path>, options: SqliteOptions) -> Result<Self> {
        let connect = SqliteConnectOptions::new().filename(path);
        Self::connect_with(connect, options).await
    }

    /// Like [`SqliteRangeCounter::connect`], starting from prepared connect
    /// options. Journal mode, synchronous mode, creation, and busy timeout
    /// are always overridden.
    pub async fn connect_with(connect: SqliteConnectOptions, options: SqliteOptions) -> Result<Self> {
        options.validate()?;

        let connect = connect
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect)
            .await?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            range_size = options.range_size,
            max_connections = options.max_connections,
            busy_timeout_ms = options.busy_timeout.as_millis() as u64,
            "sqlite counter connected"
        );

        let counter = Self {
            pool,
            range_size: options.range_size,
        };
        counter.migrate().await?;
        Ok(counter)
    }

    /// Wraps an existing pool. The schema is not touched; call
    /// [`SqliteRangeCounter::migrate`] if it may be missing.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if `range_size` is zero.
    pub fn from_pool(pool: SqlitePool, range_size: u32) -> Result<Self> {
        validate_range_size(range_size)?;
        Ok(Self { pool, range_size })
    }

    /// Creates the counter table and seeds the row at 0 if they don't exist.
    /// An existing value is left as it is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Database`] if either statement fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_TABLE).execute(&self.pool).await?;
        let _seeded = sqlx::query(SEED_ROW)
            .bind(COUNTER_ID)
            .execute(&self.pool)
            .await?
            .rows_affected();

        #[cfg(feature = "tracing")]
        tracing::info!(seeded = _seeded > 0, "range counter schema ready");

        Ok(())
    }

    /// Reads the persisted counter: one past the last reserved value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCounter`] before migration,
    /// [`Error::CorruptCounter`] for a negative value, or [`Error::Database`].
    pub async fn last_used(&self) -> Result<u64> {
        let value: Option<i64> = sqlx::query_scalar(READ_ROW)
            .bind(COUNTER_ID)
            .fetch_optional(&self.pool)
            .await?;
        let value = value.ok_or(Error::MissingCounter { id: COUNTER_ID })?;
        u64::try_from(value).map_err(|_| Error::CorruptCounter { value })
    }

    /// Claims the next `range_size` values in one transaction.
    ///
    /// The transaction rolls back when dropped before commit, so every early
    /// return below leaves the row untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingCounter`], [`Error::CorruptCounter`],
    /// [`Error::CounterOverflow`], or [`Error::Database`] (including
    /// `SQLITE_BUSY` once the busy timeout runs out).
    pub async fn reserve(&self) -> Result<ReservedRange> {
        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query(LOCK_ROW)
            .bind(COUNTER_ID)
            .execute(&mut *tx)
            .await?;
        if locked.rows_affected() == 0 {
            return Err(Error::MissingCounter { id: COUNTER_ID });
        }

        let stored: i64 = sqlx::query_scalar(READ_ROW)
            .bind(COUNTER_ID)
            .fetch_one(&mut *tx)
            .await?;
        let start = u64::try_from(stored).map_err(|_| Error::CorruptCounter { value: stored })?;
        let next = stored
            .checked_add(i64::from(self.range_size))
            .ok_or(Error::CounterOverflow {
                last_used: start,
                range_size: self.range_size,
            })?;

        sqlx::query(ADVANCE_ROW)
            .bind(next)
            .bind(COUNTER_ID)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        #[cfg(feature = "tracing")]
        tracing::trace!(start, size = self.range_size, "range committed");

        Ok(ReservedRange::new(start, self.range_size))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every pooled connection, waiting for in-flight queries.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

impl RangeCounter for SqliteRangeCounter {
    fn range_size(&self) -> u32 {
        self.range_size
    }

    async fn reserve_range(&self) -> keyforge::Result<ReservedRange> {
        self.reserve().await.map_err(keyforge::Error::reservation)
    }
}
