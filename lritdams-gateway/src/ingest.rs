//! Turns dropped broadcast files into distributed DAMS-NT frames.
//!
//! Each file goes through the [`IngestPhase`] lifecycle: too old on
//! first sight means abandoned unparsed; a parse failure is retried on
//! later scans until the retry window runs out; a parsed file has all
//! its messages distributed. Abandoned and distributed files are then
//! moved to the done directory, or deleted when there is none or the
//! move fails. Nothing in here ever fails the scan loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, trace, warn};

use lritdams_core::{
    BroadcastParser, Disposal, Distributor, GatewayError, HritParser, IngestPhase,
    MessageTranslator, ParseFailureAction, Server,
};

use crate::config::{ConfigWatcher, GatewayConfig};
use crate::lock::LockFile;
use crate::scan::{ScanEntry, ScanHandler, ScanSettings};
use crate::stats::GatewayStats;

pub struct FileIngestor {
    watcher: ConfigWatcher,
    config: Arc<GatewayConfig>,
    parser: Arc<dyn BroadcastParser>,
    translator: MessageTranslator,
    distributor: Arc<Distributor>,
    stats: Arc<GatewayStats>,
    /// Shut down by `cleanup`.
    server: Option<Arc<Server>>,
    /// Released by `cleanup`.
    lock: Option<Arc<LockFile>>,
}

impl FileIngestor {
    pub fn new(watcher: ConfigWatcher, distributor: Arc<Distributor>, stats: Arc<GatewayStats>) -> Self {
        let config = watcher.current();
        Self {
            watcher,
            translator: MessageTranslator::new(config.damsnt.start_pattern),
            config,
            parser: Arc::new(HritParser),
            distributor,
            stats,
            server: None,
            lock: None,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn BroadcastParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_server(mut self, server: Arc<Server>) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_lock(mut self, lock: Arc<LockFile>) -> Self {
        self.lock = Some(lock);
        self
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run one file through its lifecycle and report where it ended up.
    pub async fn ingest(&mut self, entry: &ScanEntry) -> Result<IngestPhase, GatewayError> {
        let name = entry.file_name();
        let age = entry.age();
        let policy = self.config.ingest_policy();
        let mut phase = IngestPhase::Pending;

        if policy.check_age(&mut phase, age)? {
            info!(file = %name, age_secs = age.as_secs(), "file too old, discarding without parsing");
            self.stats.file_abandoned();
            self.dispose(&entry.path, &mut phase).await?;
            return Ok(phase);
        }

        let opened = match tokio::fs::read(&entry.path).await {
            Ok(image) => self
                .parser
                .open(&name, Bytes::from(image))
                .map_err(|e| e.to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(file = %name, "file vanished before it could be read");
                return Ok(phase);
            }
            Err(e) => Err(format!("read failed: {e}")),
        };

        let messages = match opened {
            Ok(messages) => messages,
            Err(reason) => {
                match policy.parse_failed(&mut phase, age)? {
                    ParseFailureAction::Retry => {
                        debug!(file = %name, age_secs = age.as_secs(), "{reason}; will retry");
                        self.stats.file_retried();
                    }
                    ParseFailureAction::Abandon => {
                        warn!(file = %name, age_secs = age.as_secs(), "{reason}; abandoning");
                        self.stats.file_abandoned();
                        self.dispose(&entry.path, &mut phase).await?;
                    }
                }
                return Ok(phase);
            }
        };

        let mut count = 0usize;
        for msg in messages {
            let frame = self.translator.translate(&msg);
            let report = self.distributor.distribute(&frame).await;
            trace!(
                file = %name,
                address = %msg.address,
                seq = msg.sequence_num,
                delivered = report.delivered,
                "message distributed"
            );
            self.stats.message_distributed();
            self.stats.subscribers_dropped(report.failed);
            count += 1;
        }

        phase.distributed(count)?;
        info!(file = %name, messages = count, "file distributed");
        self.stats.file_processed();
        self.dispose(&entry.path, &mut phase).await?;
        Ok(phase)
    }

    async fn dispose(&self, path: &Path, phase: &mut IngestPhase) -> Result<(), GatewayError> {
        let disposal = dispose_file(path, self.config.ingest.done_dir.as_deref()).await;
        phase.finish(disposal)
    }

    fn apply_config(&mut self, config: Arc<GatewayConfig>) {
        if config.damsnt.start_pattern != self.translator.start_pattern() {
            info!("start pattern now {}", config.damsnt.start_pattern);
            self.translator = MessageTranslator::new(config.damsnt.start_pattern);
        }
        self.config = config;
    }
}

#[async_trait]
impl ScanHandler for FileIngestor {
    fn settings(&self) -> ScanSettings {
        self.config.scan_settings()
    }

    async fn process_file(&mut self, entry: &ScanEntry) {
        if let Err(e) = self.ingest(entry).await {
            warn!(file = %entry.path.display(), "ingest error: {e}");
        }
    }

    async fn finished_scan(&mut self) {
        if let Some(config) = self.watcher.reload_if_changed() {
            self.apply_config(config);
        }
        if let Some(report) = self
            .distributor
            .heartbeat_if_idle(self.config.heartbeat_idle())
            .await
        {
            debug!(delivered = report.delivered, "idle heartbeat sent");
            self.stats.heartbeat_sent();
            self.stats.subscribers_dropped(report.failed);
        }
    }

    async fn cleanup(&mut self) {
        if let Some(server) = self.server.take() {
            server.shutdown().await;
        }
        if let Some(lock) = self.lock.take() {
            lock.release();
        }
        info!("ingestor stopped");
    }
}

/// Move `path` into `done_dir`, or delete it when there is no done
/// directory or the move fails. Never errors; a missing source file is
/// reported as [`Disposal::Missing`].
pub async fn dispose_file(path: &Path, done_dir: Option<&Path>) -> Disposal {
    if let Some(dir) = done_dir {
        match move_into(path, dir).await {
            Ok(target) => {
                debug!("moved {} to {}", path.display(), target.display());
                return Disposal::Moved(target);
            }
            Err(_) if !exists(path).await => return Disposal::Missing,
            Err(e) => warn!("cannot move {} to {}: {e}; deleting", path.display(), dir.display()),
        }
    }

    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("deleted {}", path.display());
            Disposal::Deleted
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Disposal::Missing,
        Err(e) => {
            warn!("cannot delete {}: {e}", path.display());
            Disposal::Failed
        }
    }
}

async fn move_into(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| std::io::Error::other("path has no file name"))?;
    tokio::fs::create_dir_all(dir).await?;
    let target = dir.join(name);
    tokio::fs::rename(path, &target).await?;
    Ok(target)
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}
