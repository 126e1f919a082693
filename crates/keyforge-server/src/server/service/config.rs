use keyforge::KeyPool;
use keyforge_sqlite::SqliteRangeCounter;

/// Durable counter every server process reserves ranges from.
pub type Counter = SqliteRangeCounter;

/// Key pool shared by all request handlers.
pub type Pool = KeyPool<Counter>;
