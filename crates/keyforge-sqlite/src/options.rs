use crate::{Error, Result};
use core::time::Duration;

pub const DEFAULT_RANGE_SIZE: u32 = 100;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 4;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Tuning for a [`crate::SqliteRangeCounter`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SqliteOptions {
    /// Counter values claimed per reservation.
    pub range_size: u32,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long a reservation waits for another writer's lock before
    /// failing with `SQLITE_BUSY`.
    pub busy_timeout: Duration,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        Self {
            range_size: DEFAULT_RANGE_SIZE,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

impl SqliteOptions {
    #[must_use]
    pub fn with_range_size(mut self, range_size: u32) -> Self {
        self.range_size = range_size;
        self
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_range_size(self.range_size)?;
        if self.max_connections == 0 {
            return Err(Error::InvalidConfig {
                reason: "max connections must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

pub(crate) fn validate_range_size(range_size: u32) -> Result<()> {
    if range_size == 0 {
        return Err(Error::InvalidConfig {
            reason: "range size must be greater than 0".to_string(),
        });
    }
    Ok(())
}
