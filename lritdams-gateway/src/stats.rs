//! Running counters for the status endpoint.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct GatewayStats {
    files_processed: AtomicU64,
    files_abandoned: AtomicU64,
    files_retried: AtomicU64,
    messages_distributed: AtomicU64,
    heartbeats_sent: AtomicU64,
    subscribers_dropped: AtomicU64,
}

/// Point-in-time copy of [`GatewayStats`], serialized as one JSON line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub files_processed: u64,
    pub files_abandoned: u64,
    pub files_retried: u64,
    pub messages_distributed: u64,
    pub heartbeats_sent: u64,
    pub subscribers_connected: u64,
    pub subscribers_dropped: u64,
}

impl GatewayStats {
    pub fn file_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_abandoned(&self) {
        self.files_abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn file_retried(&self) {
        self.files_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_distributed(&self) {
        self.messages_distributed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn heartbeat_sent(&self) {
        self.heartbeats_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscribers_dropped(&self, n: usize) {
        self.subscribers_dropped.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self, subscribers_connected: usize) -> StatsSnapshot {
        StatsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            files_abandoned: self.files_abandoned.load(Ordering::Relaxed),
            files_retried: self.files_retried.load(Ordering::Relaxed),
            messages_distributed: self.messages_distributed.load(Ordering::Relaxed),
            heartbeats_sent: self.heartbeats_sent.load(Ordering::Relaxed),
            subscribers_connected: subscribers_connected as u64,
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
        }
    }
}
