//! SQLite storage for `keyforge` range reservations.
//!
//! The counter lives in one row of the `range_counters` table:
//!
//! ```sql
//! CREATE TABLE range_counters (
//!     id INTEGER PRIMARY KEY,
//!     last_used INTEGER NOT NULL CHECK (last_used >= 0)
//! );
//! ```
//!
//! `last_used` is one past the highest reserved value. It only grows, and
//! only inside a transaction holding the database write lock.
//!
//! ```no_run
//! use keyforge::{KeyPool, PoolConfig};
//! use keyforge_sqlite::{SqliteOptions, SqliteRangeCounter};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let counter = SqliteRangeCounter::connect("sqlite://keyforge.db", SqliteOptions::default()).await?;
//! let pool = KeyPool::new(counter, PoolConfig::default())?;
//! let refiller = pool.start();
//!
//! println!("{}", pool.get().await?);
//! refiller.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - `tracing`: events for connection, schema bootstrap, and commits. Also
//!   enables `keyforge/tracing`.

mod counter;
mod error;
mod options;
#[cfg(test)]
mod tests;

pub use crate::counter::*;
pub use crate::error::*;
pub use crate::options::{
    DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_RANGE_SIZE, SqliteOptions,
};
