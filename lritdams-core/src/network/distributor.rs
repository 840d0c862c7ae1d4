//! Broadcast of frames to every live session.
//!
//! Writes are sequential and in registration order, so one slow
//! subscriber delays the ones after it within the same call. A failed
//! write never affects the others: failing sessions are collected
//! during the sweep and dropped after it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ClientSession, Registry};
use crate::frame::DamsNtFrame;

/// Outcome of one [`Distributor::distribute`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistributeReport {
    pub delivered: usize,
    pub failed: usize,
}

pub struct Distributor {
    registry: Registry,
    last_activity: Mutex<Instant>,
}

impl Distributor {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            last_activity: Mutex::new(Instant::now()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Send `frame` to every session in the roster. Never fails.
    pub async fn distribute(&self, frame: &DamsNtFrame) -> DistributeReport {
        let sessions = self.registry.snapshot();
        let mut report = DistributeReport::default();
        let mut failed: Vec<Arc<ClientSession>> = Vec::new();

        for session in sessions {
            match session.send(frame).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    warn!(
                        session = session.id(),
                        peer = %session.peer(),
                        "write failed, dropping subscriber: {e}"
                    );
                    failed.push(session);
                }
            }
        }

        report.failed = failed.len();
        for session in failed {
            self.registry.remove(session.id());
            session.disconnect().await;
        }

        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
        debug!(
            delivered = report.delivered,
            failed = report.failed,
            heartbeat = frame.is_heartbeat(),
            "frame distributed"
        );
        report
    }

    /// Broadcast the `NONE\r\n` idle marker.
    pub async fn send_heartbeat(&self) -> DistributeReport {
        self.distribute(&DamsNtFrame::heartbeat()).await
    }

    /// Time since the last `distribute` call, heartbeats included.
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    /// Send a heartbeat if nothing went out for at least `threshold`.
    pub async fn heartbeat_if_idle(&self, threshold: Duration) -> Option<DistributeReport> {
        if self.idle_for() >= threshold {
            Some(self.send_heartbeat().await)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn peer() -> std::net::SocketAddr {
        "127.0.0.1:9".parse().unwrap()
    }

    #[tokio::test]
    async fn failing_session_is_isolated_and_removed() {
        let reg = Registry::default();
        let good_a = tokio_test::io::Builder::new().write(b"NONE\r\n").build();
        let bad = tokio_test::io::Builder::new()
            .write_error(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let good_b = tokio_test::io::Builder::new().write(b"NONE\r\n").build();

        reg.add(Arc::new(ClientSession::new(1, peer(), Box::new(good_a))));
        reg.add(Arc::new(ClientSession::new(2, peer(), Box::new(bad))));
        reg.add(Arc::new(ClientSession::new(3, peer(), Box::new(good_b))));

        let dist = Distributor::new(reg.clone());
        let report = dist.send_heartbeat().await;
        assert_eq!(report, DistributeReport { delivered: 2, failed: 1 });

        let ids: Vec<u64> = reg.snapshot().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[tokio::test]
    async fn empty_roster_is_fine() {
        let dist = Distributor::new(Registry::default());
        let report = dist.distribute(&DamsNtFrame::heartbeat()).await;
        assert_eq!(report, DistributeReport::default());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeat_only_after_idle_window() {
        let mock = tokio_test::io::Builder::new().write(b"NONE\r\n").build();
        let reg = Registry::default();
        reg.add(Arc::new(ClientSession::new(1, peer(), Box::new(mock))));
        let dist = Distributor::new(reg);
        let window = Duration::from_secs(10);

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(dist.heartbeat_if_idle(window).await.is_none());

        tokio::time::advance(Duration::from_secs(1)).await;
        let report = dist.heartbeat_if_idle(window).await.unwrap();
        assert_eq!(report.delivered, 1);

        // The heartbeat itself counts as activity.
        assert!(dist.heartbeat_if_idle(window).await.is_none());
    }
}
