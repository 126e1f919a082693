use portable_atomic::{AtomicU64, Ordering};

/// Point-in-time counters describing a pool's activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Ranges successfully reserved from the counter.
    pub reservations: u64,
    /// Reservation attempts that failed and were left for the next tick.
    pub reservation_failures: u64,
    /// Keys encoded and enqueued.
    pub keys_minted: u64,
    /// Keys handed out to callers.
    pub keys_issued: u64,
}

#[derive(Default)]
pub(crate) struct Stats {
    reservations: AtomicU64,
    reservation_failures: AtomicU64,
    keys_minted: AtomicU64,
    keys_issued: AtomicU64,
}

impl Stats {
    pub(crate) fn record_reservation(&self) {
        self.reservations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reservation_failure(&self) {
        self.reservation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_minted(&self) {
        self.keys_minted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_issued(&self) {
        self.keys_issued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            reservations: self.reservations.load(Ordering::Relaxed),
            reservation_failures: self.reservation_failures.load(Ordering::Relaxed),
            keys_minted: self.keys_minted.load(Ordering::Relaxed),
            keys_issued: self.keys_issued.load(Ordering::Relaxed),
        }
    }
}
