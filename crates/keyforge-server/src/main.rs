#![doc = include_str!("../README.md")]

mod server;

use anyhow::Context;
use clap::Parser;
use keyforge::PoolConfig;
use server::config::{CliArgs, RECOMMENDED_MIN_RANGE_SIZE, ServerConfig};
use server::service::config::{Counter, Pool};
use server::service::handler::{KeyService, router};
use server::telemetry::{TelemetryProviders, init_telemetry};
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let counter = Counter::connect(&config.database_url, config.sqlite.clone())
        .await
        .with_context(|| format!("failed to open range counter at {}", config.database_url))?;
    let pool = Pool::new(
        counter,
        PoolConfig::default().with_refill_interval(config.refill_interval),
    )?;
    let service = KeyService::start(pool, &config);
    let app = router(service.clone());

    if config.uds {
        #[cfg(unix)]
        {
            use tokio::net::UnixListener;
            let uds_path = config.server_addr.clone();
            let uds = UnixListener::bind(&uds_path)?;
            log_startup_info(&uds_path, &config);
            let res = axum::serve(uds, app)
                .with_graceful_shutdown(shutdown_signal(service.clone()))
                .await;
            // Best effort; a panic may still leave the socket file behind.
            let _ = std::fs::remove_file(&uds_path);
            finish(res, service, providers).await
        }
        #[cfg(not(unix))]
        {
            anyhow::bail!("Unix domain sockets are not supported on this platform");
        }
    } else {
        let tcp_path = config.server_addr.clone();
        let tcp = TcpListener::bind(&tcp_path).await?;
        log_startup_info(&tcp_path, &config);
        let res = axum::serve(tcp, app)
            .with_graceful_shutdown(shutdown_signal(service.clone()))
            .await;
        finish(res, service, providers).await
    }
}

/// Runs once the HTTP server has drained: releases the store and flushes
/// telemetry, whichever way the server stopped.
async fn finish(
    res: std::io::Result<()>,
    service: KeyService,
    providers: TelemetryProviders,
) -> anyhow::Result<()> {
    // A server error skips the signal path, so the pool may still be open.
    if service.is_serving() {
        service.shutdown().await;
    }
    service.pool().counter().close().await;

    match &res {
        Ok(()) => tracing::info!("Service shut down successfully"),
        Err(e) => tracing::error!("Server error: {e}"),
    }

    providers.shutdown();
    Ok(res?)
}

fn log_startup_info(addr: &str, config: &ServerConfig) {
    if config.range_size() < RECOMMENDED_MIN_RANGE_SIZE {
        tracing::warn!(
            "RANGE_SIZE {} is below {}; expect a database write every {} keys",
            config.range_size(),
            RECOMMENDED_MIN_RANGE_SIZE,
            config.range_size()
        );
    }

    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting key service on {} with full config: {:#?}",
            addr,
            config
        );
    } else {
        tracing::info!(
            "Starting key service on {} with range size {}",
            addr,
            config.range_size()
        );
    }
}

async fn shutdown_signal(service: KeyService) {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");

    // Closing the pool first releases requests blocked on an empty buffer,
    // so the HTTP server can drain.
    service.shutdown().await;
}
