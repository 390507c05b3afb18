//! Ambient metric counters. Grounds `spec.md` §6's `promFrontendBytesSend`
//! collaborator; no exposition endpoint is built here (out of scope).

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct Metrics {
    frontend_bytes_sent: AtomicU64,
    peer_failures_total: AtomicU64,
    queries_total: AtomicU64,
    stats_queries_total: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self, is_stats: bool) {
        self.queries_total.fetch_add(1, Ordering::Relaxed);
        if is_stats {
            self.stats_queries_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_peer_failure(&self) {
        self.peer_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_frontend_bytes_sent(&self, n: u64) {
        self.frontend_bytes_sent.fetch_add(n, Ordering::Relaxed);
    }

    pub fn frontend_bytes_sent(&self) -> u64 {
        self.frontend_bytes_sent.load(Ordering::Relaxed)
    }

    pub fn peer_failures_total(&self) -> u64 {
        self.peer_failures_total.load(Ordering::Relaxed)
    }

    pub fn queries_total(&self) -> u64 {
        self.queries_total.load(Ordering::Relaxed)
    }
}
