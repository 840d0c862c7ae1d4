//! Periodic directory scan.
//!
//! Every pass lists the input directory, keeps regular files that pass
//! the name filter, and hands them to the [`ScanHandler`] oldest first.
//! Settings are fetched from the handler at the start of each pass so a
//! config reload takes effect on the next one.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// One candidate file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    pub path: PathBuf,
    pub modified: SystemTime,
}

impl ScanEntry {
    /// Time since last modification; zero for mtimes in the future.
    pub fn age(&self) -> Duration {
        SystemTime::now()
            .duration_since(self.modified)
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSettings {
    pub input_dir: PathBuf,
    pub file_prefix: String,
    pub file_suffix: String,
    pub interval: Duration,
}

impl ScanSettings {
    pub fn accepts(&self, name: &str) -> bool {
        matches_filter(name, &self.file_prefix, &self.file_suffix)
    }
}

#[async_trait]
pub trait ScanHandler: Send {
    /// Settings for the next pass.
    fn settings(&self) -> ScanSettings;

    async fn process_file(&mut self, entry: &ScanEntry);

    /// Called once after every pass.
    async fn finished_scan(&mut self);

    /// Called once when the scanner stops.
    async fn cleanup(&mut self);
}

pub struct DirectoryScanner<H> {
    handler: H,
}

impl<H: ScanHandler> DirectoryScanner<H> {
    pub fn new(handler: H) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    /// One pass: process every matching file, then `finished_scan`.
    pub async fn scan_once(&mut self) {
        let settings = self.handler.settings();
        let entries = match list_candidates(&settings).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("cannot list {}: {e}", settings.input_dir.display());
                Vec::new()
            }
        };
        if !entries.is_empty() {
            debug!(count = entries.len(), "scan found files");
        }
        for entry in &entries {
            self.handler.process_file(entry).await;
        }
        self.handler.finished_scan().await;
    }

    /// Scan until `cancel` fires, then run `cleanup`.
    pub async fn run(mut self, cancel: CancellationToken) -> H {
        while !cancel.is_cancelled() {
            self.scan_once().await;
            let interval = self.handler.settings().interval;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }
        self.handler.cleanup().await;
        self.handler
    }
}

/// Matching regular files, oldest modification first.
pub async fn list_candidates(settings: &ScanSettings) -> std::io::Result<Vec<ScanEntry>> {
    let mut dir = tokio::fs::read_dir(&settings.input_dir).await?;
    let mut entries = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !settings.accepts(&name) {
            continue;
        }
        // Errors here mean the file raced with a rename or delete.
        let modified = match entry.metadata().await {
            Ok(meta) if meta.is_file() => match meta.modified() {
                Ok(m) => m,
                Err(_) => continue,
            },
            _ => continue,
        };
        entries.push(ScanEntry {
            path: entry.path(),
            modified,
        });
    }
    entries.sort_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)));
    Ok(entries)
}

/// Prefix/suffix filter. Dot files are never candidates.
pub fn matches_filter(name: &str, prefix: &str, suffix: &str) -> bool {
    !name.starts_with('.') && name.starts_with(prefix) && name.ends_with(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    #[derive(Default)]
    struct Recorder {
        dir: PathBuf,
        seen: Vec<String>,
        scans: usize,
        cleaned: bool,
    }

    #[async_trait]
    impl ScanHandler for Recorder {
        fn settings(&self) -> ScanSettings {
            ScanSettings {
                input_dir: self.dir.clone(),
                file_prefix: "DCS".into(),
                file_suffix: ".dat".into(),
                interval: Duration::from_millis(10),
            }
        }

        async fn process_file(&mut self, entry: &ScanEntry) {
            self.seen.push(entry.file_name());
        }

        async fn finished_scan(&mut self) {
            self.scans += 1;
        }

        async fn cleanup(&mut self) {
            self.cleaned = true;
        }
    }

    fn set_mtime(path: &Path, secs_ago: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::now() - Duration::from_secs(secs_ago))
            .unwrap();
    }

    #[tokio::test]
    async fn oldest_first_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for (name, age) in [("DCS_b.dat", 10), ("DCS_a.dat", 30), ("DCS_c.tmp", 50), ("X_d.dat", 60)] {
            let p = dir.path().join(name);
            fs::write(&p, b"x").unwrap();
            set_mtime(&p, age);
        }
        fs::create_dir(dir.path().join("DCS_dir.dat")).unwrap();

        let mut scanner = DirectoryScanner::new(Recorder {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        scanner.scan_once().await;

        assert_eq!(scanner.handler().seen, vec!["DCS_a.dat", "DCS_b.dat"]);
        assert_eq!(scanner.handler().scans, 1);
    }

    #[tokio::test]
    async fn missing_directory_still_finishes_scan() {
        let mut scanner = DirectoryScanner::new(Recorder {
            dir: PathBuf::from("/nonexistent/lritdams/input"),
            ..Default::default()
        });
        scanner.scan_once().await;
        assert!(scanner.handler().seen.is_empty());
        assert_eq!(scanner.handler().scans, 1);
    }

    #[tokio::test]
    async fn run_cleans_up_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let scanner = DirectoryScanner::new(Recorder {
            dir: dir.path().to_path_buf(),
            ..Default::default()
        });
        let task = tokio::spawn(scanner.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let handler = tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(handler.cleaned);
        assert!(handler.scans >= 1);
    }

    #[test]
    fn hidden_files_are_skipped() {
        assert!(matches_filter("DCS_1", "", ""));
        assert!(!matches_filter(".DCS_1.swp", "", ""));
    }
}
