use super::KeyPool;
use crate::{Error, RangeCounter};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a pool's background refill task.
///
/// Dropping the handle does not stop the task; call [`Refiller::shutdown`]
/// (or cancel [`Refiller::cancellation_token`]) to stop it.
#[derive(Debug)]
pub struct Refiller {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Refiller {
    /// Token that stops the refill loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Returns `true` once the loop has exited, whether through shutdown, a
    /// closed pool, or an unrecoverable refill error.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stops the refill loop and waits for it to exit.
    ///
    /// An in-flight reservation is dropped rather than awaited, which rolls
    /// back its store transaction. If the loop was part-way through enqueuing
    /// a range, the rest of that range is never issued.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the refill task panicked.
    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.token.cancel();
        self.handle.await
    }
}

impl<C: RangeCounter> KeyPool<C> {
    /// Spawns the background refill loop on the current Tokio runtime.
    ///
    /// The loop runs a refill cycle immediately, then once per refill
    /// interval, and early whenever a caller finds the buffer at or below the
    /// watermark. Reservation failures are retried on the next tick. An
    /// [`Error::EncodingDomain`] failure means no further key can be minted,
    /// so the loop closes the pool and exits.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) -> Refiller {
        let token = CancellationToken::new();
        let fut = refill_loop(self.clone(), token.clone());

        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(self.inner.span.clone())
        };

        Refiller {
            token,
            handle: tokio::spawn(fut),
        }
    }
}

async fn refill_loop<C: RangeCounter>(pool: KeyPool<C>, token: CancellationToken) {
    let mut ticker = tokio::time::interval(pool.inner.refill_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    #[cfg(feature = "tracing")]
    tracing::info!(
        interval_ms = pool.inner.refill_interval.as_millis() as u64,
        "refiller started"
    );

    loop {
        tokio::select! {
            biased;
            () = token.cancelled() => break,
            _ = ticker.tick() => {}
            () = pool.inner.wake.notified() => {}
        }

        if pool.is_closed() {
            break;
        }

        let outcome = tokio::select! {
            biased;
            () = token.cancelled() => break,
            outcome = pool.refill_once() => outcome,
        };

        match outcome {
            Ok(_) => {}
            // Logged by `refill_once`; the next tick retries.
            Err(e) if e.is_transient() => {}
            Err(Error::Closed) => break,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_e, "refill failed permanently, closing key pool");
                pool.close();
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        available = pool.available(),
        cancelled = token.is_cancelled(),
        "refiller stopped"
    );
}
