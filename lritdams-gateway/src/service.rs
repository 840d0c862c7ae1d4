//! Gateway daemon core logic.
//!
//! Wires the lock file, the DAMS-NT server, the status endpoint and the
//! directory scanner together, and owns the shutdown sequence.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use lritdams_core::{Distributor, GatewayError, Server, SessionFactory, tcp_session_factory};

use crate::config::{ConfigWatcher, GatewayConfig};
use crate::ingest::FileIngestor;
use crate::lock::{LockFile, TOUCH_INTERVAL};
use crate::scan::DirectoryScanner;
use crate::stats::GatewayStats;
use crate::status::StatusEndpoint;

// ── GatewayService ───────────────────────────────────────────────

/// The top-level gateway service.
pub struct GatewayService {
    config: GatewayConfig,
    config_path: PathBuf,
    lock_path: PathBuf,
    factory: SessionFactory,
    stats: Arc<GatewayStats>,
    stop: CancellationToken,
}

impl GatewayService {
    pub fn new(config: GatewayConfig, config_path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            config,
            config_path: config_path.into(),
            lock_path: lock_path.into(),
            factory: tcp_session_factory(),
            stats: Arc::new(GatewayStats::default()),
            stop: CancellationToken::new(),
        }
    }

    /// Replace the session factory used for accepted connections.
    pub fn with_session_factory(mut self, factory: SessionFactory) -> Self {
        self.factory = factory;
        self
    }

    /// Obtain a handle that stops the service from another task.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn stats(&self) -> Arc<GatewayStats> {
        Arc::clone(&self.stats)
    }

    /// Run until stopped.
    ///
    /// 1. Acquires the lock file. Failure is fatal.
    /// 2. Binds the DAMS-NT listener. Failure is fatal.
    /// 3. Starts the accept loop, the lock watchdog, the optional
    ///    status endpoint and the directory scanner.
    /// 4. Stops on the stop handle, on lock loss, or on an accept error.
    /// 5. Shuts the server down, which disconnects every subscriber, then
    ///    waits for the ingestor cleanup (lock release).
    pub async fn run(self) -> Result<(), GatewayError> {
        let lock = Arc::new(LockFile::acquire(&self.lock_path)?);

        let server = Server::bind(&self.config.listen_addr(), self.factory.clone()).await?;
        let distributor = Arc::new(Distributor::new(server.registry().clone()));
        let endpoint = match self.config.status_addr() {
            Some(addr) => {
                Some(StatusEndpoint::bind(&addr, self.stats(), server.registry().clone()).await?)
            }
            None => None,
        };

        let mut accept = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.listen().await })
        };

        let mut watchdog = {
            let lock = Arc::clone(&lock);
            let stop = self.stop.clone();
            tokio::spawn(async move { lock.watch(TOUCH_INTERVAL, stop).await })
        };

        let status = endpoint.map(|e| tokio::spawn(e.run(self.stop.clone())));

        let watcher = ConfigWatcher::new(&self.config_path, self.config.clone());
        let ingestor = FileIngestor::new(watcher, distributor, self.stats())
            .with_server(Arc::clone(&server))
            .with_lock(Arc::clone(&lock));
        let scanner = tokio::spawn(DirectoryScanner::new(ingestor).run(self.stop.clone()));

        info!(
            "relaying {} to {}",
            self.config.ingest.input_dir.display(),
            server.local_addr()
        );

        let outcome: Result<(), GatewayError> = tokio::select! {
            _ = self.stop.cancelled() => Ok(()),
            joined = &mut watchdog => match joined {
                Ok(result) => result,
                Err(e) => Err(GatewayError::Other(format!("lock watchdog panicked: {e}"))),
            },
            joined = &mut accept => match joined {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(GatewayError::Other(format!("accept loop panicked: {e}"))),
            },
        };
        if let Err(e) = &outcome {
            error!("gateway stopping: {e}");
        }

        // Sessions must close before the scanner is awaited: a write to
        // a subscriber that stopped reading only returns on disconnect.
        self.stop.cancel();
        server.shutdown().await;
        if let Err(e) = scanner.await {
            error!("scanner task failed: {e}");
            lock.release();
        }
        if let Some(status) = status {
            let _ = status.await;
        }
        if !watchdog.is_finished() {
            let _ = watchdog.await;
        }
        if !accept.is_finished() {
            let _ = accept.await;
        }

        info!("gateway stopped");
        outcome
    }
}

// ── Tests ────────────────────────────────────────────────────────
