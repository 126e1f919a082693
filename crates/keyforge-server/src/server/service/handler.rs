//! HTTP service over the shared key pool.
//!
//! [`KeyService`] owns the pool and its refiller. Handlers only ever take keys
//! from the pool with a bounded wait, so a store outage turns into `503`s
//! rather than hung connections.
//!
//! ## Routes
//!
//! - `GET /get-key`: one key as a `text/plain` body.
//! - `GET /healthz`: `ok` while serving, `503` once shutdown has begun.

use crate::server::{
    config::ServerConfig,
    service::{config::Pool, error::ApiError},
    telemetry::{
        increment_key_errors, increment_keys_issued, increment_requests, record_request_duration,
    },
};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use core::time::Duration;
use keyforge::{Error, Refiller};
use portable_atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Shared state behind every route.
#[derive(Clone)]
pub struct KeyService {
    inner: Arc<Inner>,
}

struct Inner {
    pool: Pool,
    refiller: Mutex<Option<Refiller>>,
    get_timeout: Duration,
    shutdown_timeout: Duration,
    serving: AtomicBool,
}

impl KeyService {
    /// Wraps `pool` and starts its background refiller.
    pub fn start(pool: Pool, config: &ServerConfig) -> Self {
        let refiller = pool.start();
        Self::with_refiller(pool, Some(refiller), config)
    }

    /// Wraps `pool` with an optional, already running refiller.
    pub fn with_refiller(pool: Pool, refiller: Option<Refiller>, config: &ServerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                pool,
                refiller: Mutex::new(refiller),
                get_timeout: config.get_timeout,
                shutdown_timeout: config.shutdown_timeout,
                serving: AtomicBool::new(true),
            }),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.inner.pool
    }

    pub fn is_serving(&self) -> bool {
        self.inner.serving.load(Ordering::Acquire) && !self.inner.pool.is_closed()
    }

    /// Takes the next key, waiting at most the configured `GET_TIMEOUT_MS`.
    pub async fn next_key(&self) -> Result<String, Error> {
        if !self.inner.serving.load(Ordering::Acquire) {
            return Err(Error::Closed);
        }
        self.inner.pool.get_timeout(self.inner.get_timeout).await
    }

    /// Stops handing out keys.
    ///
    /// Marks the service as not serving, stops the refiller (waiting up to
    /// the shutdown timeout), then closes the pool so blocked requests return
    /// `503` instead of holding the HTTP server open. Keys still buffered are
    /// abandoned; their counter values are never reissued.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating key service shutdown");
        self.inner.serving.store(false, Ordering::Release);

        let refiller = self
            .inner
            .refiller
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        // `Refiller::shutdown` cancels before it joins, so a timed-out join
        // still leaves the loop stopping on its own.
        if let Some(refiller) = refiller {
            match tokio::time::timeout(self.inner.shutdown_timeout, refiller.shutdown()).await {
                Ok(Ok(())) => tracing::debug!("Refiller shut down gracefully"),
                Ok(Err(e)) => tracing::error!("Refiller task failed: {e}"),
                Err(_) => tracing::warn!("Refiller shutdown timeout"),
            }
        }

        self.inner.pool.close();
        tracing::info!(
            abandoned = self.inner.pool.available(),
            stats = ?self.inner.pool.stats(),
            "Key service shutdown complete"
        );
    }
}

/// Hands out one key.
#[tracing::instrument(skip_all)]
pub async fn get_key(State(service): State<KeyService>) -> Result<String, ApiError> {
    let start = std::time::Instant::now();
    increment_requests();

    let result = service.next_key().await;
    record_request_duration(start.elapsed().as_secs_f64() * 1_000.0);

    match result {
        Ok(key) => {
            increment_keys_issued();
            Ok(key)
        }
        Err(e) => {
            increment_key_errors();
            Err(e.into())
        }
    }
}

pub async fn healthz(State(service): State<KeyService>) -> (StatusCode, &'static str) {
    if service.is_serving() {
        (StatusCode::OK, "ok")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    }
}

pub fn router(service: KeyService) -> Router {
    Router::new()
        .route("/get-key", get(get_key))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                ),
        )
        .with_state(service)
}
