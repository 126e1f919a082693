use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use keyforge_sqlite::SqliteOptions;

/// Range sizes below this reserve too often to be worth the round-trip.
pub const RECOMMENDED_MIN_RANGE_SIZE: u32 = 100;

/// Runtime configuration for the `keyforge-server` binary.
///
/// Every value can be given as a CLI flag or an environment variable (a
/// `.env` file in the working directory is loaded first). The configuration
/// is read once at startup.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "keyforge-server",
    version,
    about = "An HTTP service handing out unique 7-character base62 keys"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix socket).
    ///
    /// Example: "0.0.0.0:8080" or "/tmp/keyforge.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// SQLite database holding the range counter. Created if missing.
    ///
    /// Every server sharing one key space must point at the same file.
    ///
    /// Environment variable: `DATABASE_URL`
    #[arg(long, env = "DATABASE_URL", default_value_t = String::from("sqlite://keyforge.db"))]
    pub database_url: String,

    /// Maximum number of pooled database connections.
    ///
    /// Environment variable: `DB_MAX_CONNECTIONS`
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 4)]
    pub db_max_connections: u32,

    /// How long a reservation waits on another writer's lock, in
    /// milliseconds.
    ///
    /// Environment variable: `DB_BUSY_TIMEOUT_MS`
    #[arg(long, env = "DB_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    pub db_busy_timeout_ms: u64,

    /// Counter values claimed per database round-trip.
    ///
    /// The in-memory buffer holds up to twice this many keys. A crash loses
    /// whatever was buffered, so larger ranges trade key-space waste for
    /// fewer writes.
    ///
    /// Environment variable: `RANGE_SIZE`
    #[arg(long, env = "RANGE_SIZE", default_value_t = 100)]
    pub range_size: u32,

    /// Period of the background refill check, in milliseconds.
    ///
    /// Environment variable: `REFILL_INTERVAL_MS`
    #[arg(long, env = "REFILL_INTERVAL_MS", default_value_t = 1_000)]
    pub refill_interval_ms: u64,

    /// How long a request waits for a key before answering 503, in
    /// milliseconds.
    ///
    /// Environment variable: `GET_TIMEOUT_MS`
    #[arg(long, env = "GET_TIMEOUT_MS", default_value_t = 5_000)]
    pub get_timeout_ms: u64,

    /// How long shutdown waits for the refiller to stop, in seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub database_url: String,
    pub sqlite: SqliteOptions,
    pub refill_interval: Duration,
    pub get_timeout: Duration,
    pub shutdown_timeout: Duration,
}

impl ServerConfig {
    pub const fn range_size(&self) -> u32 {
        self.sqlite.range_size
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.range_size == 0 {
            bail!("RANGE_SIZE must be greater than 0");
        }

        if args.db_max_connections == 0 {
            bail!("DB_MAX_CONNECTIONS must be greater than 0");
        }

        if args.refill_interval_ms == 0 {
            bail!("REFILL_INTERVAL_MS must be greater than 0");
        }

        if args.get_timeout_ms == 0 {
            bail!("GET_TIMEOUT_MS must be greater than 0");
        }

        let sqlite = SqliteOptions::default()
            .with_range_size(args.range_size)
            .with_max_connections(args.db_max_connections)
            .with_busy_timeout(Duration::from_millis(args.db_busy_timeout_ms));

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            database_url: args.database_url,
            sqlite,
            refill_interval: Duration::from_millis(args.refill_interval_ms),
            get_timeout: Duration::from_millis(args.get_timeout_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let args = CliArgs::try_parse_from(
            core::iter::once("keyforge-server").chain(args.iter().copied()),
        )?;
        ServerConfig::try_from(args)
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--server-addr",
            "127.0.0.1:9000",
            "--database-url",
            "sqlite://other.db",
            "--db-max-connections",
            "2",
            "--db-busy-timeout-ms",
            "250",
            "--range-size",
            "1000",
            "--refill-interval-ms",
            "50",
            "--get-timeout-ms",
            "20",
            "--shutdown-timeout",
            "7",
        ])
        .unwrap();

        assert_eq!(config.server_addr, "127.0.0.1:9000");
        assert!(!config.uds);
        assert_eq!(config.database_url, "sqlite://other.db");
        assert_eq!(config.range_size(), 1000);
        assert_eq!(config.sqlite.max_connections, 2);
        assert_eq!(config.sqlite.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.refill_interval, Duration::from_millis(50));
        assert_eq!(config.get_timeout, Duration::from_millis(20));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(7));
    }

    #[test]
    fn small_range_size_is_accepted() {
        let config = parse(&["--range-size", "10"]).unwrap();
        assert_eq!(config.range_size(), 10);
        assert!(config.range_size() < RECOMMENDED_MIN_RANGE_SIZE);
    }

    #[test]
    fn zero_values_are_rejected() {
        for flag in [
            "--range-size",
            "--db-max-connections",
            "--refill-interval-ms",
            "--get-timeout-ms",
        ] {
            let err = parse(&[flag, "0"]).unwrap_err();
            assert!(err.to_string().contains("must be greater than 0"), "{flag}: {err}");
        }
    }

    #[test]
    fn non_numeric_values_fail_to_parse() {
        assert!(parse(&["--range-size", "lots"]).is_err());
    }
}
