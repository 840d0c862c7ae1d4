//! Optional status port: each connection gets one JSON line of
//! counters, then the socket is closed.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lritdams_core::{GatewayError, Registry};

use crate::stats::GatewayStats;

/// Pause after a failed accept. Persistent errors such as EMFILE would
/// otherwise spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(200);

pub struct StatusEndpoint {
    listener: TcpListener,
    stats: Arc<GatewayStats>,
    registry: Registry,
}

impl StatusEndpoint {
    pub async fn bind(
        addr: &str,
        stats: Arc<GatewayStats>,
        registry: Registry,
    ) -> Result<Self, GatewayError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| GatewayError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        info!("status endpoint on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            stats,
            registry,
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, GatewayError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until `cancel` fires. Errors here are logged, never fatal.
    pub async fn run(self, cancel: CancellationToken) {
        loop {
            let (mut stream, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!("status accept error: {e}");
                        if !back_off(&cancel).await {
                            break;
                        }
                        continue;
                    }
                },
            };

            let snapshot = self.stats.snapshot(self.registry.len());
            let mut line = match serde_json::to_vec(&snapshot) {
                Ok(line) => line,
                Err(e) => {
                    warn!("could not encode status: {e}");
                    continue;
                }
            };
            line.push(b'\n');

            tokio::spawn(async move {
                if let Err(e) = stream.write_all(&line).await {
                    debug!(%peer, "status write failed: {e}");
                }
                let _ = stream.shutdown().await;
            });
        }
        debug!("status endpoint stopped");
    }
}

/// Wait out [`ACCEPT_BACKOFF`]. Returns `false` if cancelled first.
async fn back_off(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(ACCEPT_BACKOFF) => true,
    }
}
