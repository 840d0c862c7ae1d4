//! Configuration for the gateway daemon.
//!
//! Loaded once at startup from a TOML file. The ingest and DAMS-NT
//! sections are re-read between scans by [`ConfigWatcher`]; each reload
//! produces a fresh immutable snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use lritdams_core::{GatewayError, IngestPolicy, StartPattern};

use crate::scan::ScanSettings;

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Subscriber and status listeners.
    pub network: NetworkConfig,
    /// Input directory scanning and file disposal.
    pub ingest: IngestConfig,
    /// Wire format settings.
    pub damsnt: DamsNtConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration. Bound at startup only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the DAMS-NT listener binds to.
    pub bind_address: String,
    /// DAMS-NT listen port.
    pub port: u16,
    /// Optional port for the JSON status endpoint.
    pub status_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Directory scanned for broadcast files.
    pub input_dir: PathBuf,
    /// Where processed files go. Deleted when unset.
    pub done_dir: Option<PathBuf>,
    pub file_prefix: String,
    pub file_suffix: String,
    /// Files older than this on first sight are discarded unparsed.
    pub file_age_max_secs: u64,
    /// How long an unparseable file is left in place for retry.
    pub retry_window_secs: u64,
    /// Sleep between directory scans.
    pub scan_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamsNtConfig {
    /// Frame start marker as 8 hex digits.
    pub start_pattern: StartPattern,
    /// Heartbeat after this many idle seconds.
    pub heartbeat_idle_secs: u64,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            ingest: IngestConfig::default(),
            damsnt: DamsNtConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 17010,
            status_port: None,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("lrit/dcs"),
            done_dir: None,
            file_prefix: String::new(),
            file_suffix: String::new(),
            file_age_max_secs: 7200,
            retry_window_secs: 60,
            scan_interval_ms: 1000,
        }
    }
}

impl Default for DamsNtConfig {
    fn default() -> Self {
        Self {
            start_pattern: StartPattern::default(),
            heartbeat_idle_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl GatewayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    ///
    /// Runs before logging is set up, so the error behind a fallback is
    /// handed back for the caller to report.
    pub fn load(path: &Path) -> (Self, Option<GatewayError>) {
        match Self::try_load(path) {
            Ok(cfg) => (cfg, None),
            Err(e) => (Self::default(), Some(e)),
        }
    }

    /// Load configuration, failing on a missing or invalid file.
    pub fn try_load(path: &Path) -> Result<Self, GatewayError> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| GatewayError::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// `bind_address:port` for the DAMS-NT listener.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.network.bind_address, self.network.port)
    }

    pub fn status_addr(&self) -> Option<String> {
        self.network
            .status_port
            .map(|p| format!("{}:{p}", self.network.bind_address))
    }

    pub fn ingest_policy(&self) -> IngestPolicy {
        IngestPolicy::new(
            Duration::from_secs(self.ingest.file_age_max_secs),
            Duration::from_secs(self.ingest.retry_window_secs),
        )
    }

    pub fn heartbeat_idle(&self) -> Duration {
        Duration::from_secs(self.damsnt.heartbeat_idle_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.ingest.scan_interval_ms.max(1))
    }

    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            input_dir: self.ingest.input_dir.clone(),
            file_prefix: self.ingest.file_prefix.clone(),
            file_suffix: self.ingest.file_suffix.clone(),
            interval: self.scan_interval(),
        }
    }
}

// ── ConfigWatcher ────────────────────────────────────────────────

/// Re-reads the config file when its modification time changes.
#[derive(Debug)]
pub struct ConfigWatcher {
    path: PathBuf,
    mtime: Option<SystemTime>,
    current: Arc<GatewayConfig>,
}

impl ConfigWatcher {
    pub fn new(path: impl Into<PathBuf>, current: GatewayConfig) -> Self {
        let path = path.into();
        let mtime = modified(&path);
        Self {
            path,
            mtime,
            current: Arc::new(current),
        }
    }

    pub fn current(&self) -> Arc<GatewayConfig> {
        Arc::clone(&self.current)
    }

    /// Returns the new snapshot if the file changed and parsed. A file
    /// that fails to parse leaves the current snapshot in place.
    pub fn reload_if_changed(&mut self) -> Option<Arc<GatewayConfig>> {
        let mtime = modified(&self.path);
        if mtime.is_none() || mtime == self.mtime {
            return None;
        }
        self.mtime = mtime;

        let fresh = match GatewayConfig::try_load(&self.path) {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!("config reload failed, keeping previous settings: {e}");
                return None;
            }
        };
        if fresh == *self.current {
            return None;
        }
        if fresh.network != self.current.network {
            tracing::warn!("network settings changed in {}; restart to apply", self.path.display());
        }
        tracing::info!("configuration reloaded from {}", self.path.display());
        self.current = Arc::new(fresh);
        Some(self.current())
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok()?.modified().ok()
}

// ── Tests ────────────────────────────────────────────────────────
