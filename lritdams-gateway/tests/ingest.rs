//! Integration tests: file lifecycle through the ingestor and the
//! directory scanner, with real files and real TCP subscribers.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use bytes::Bytes;
use futures::StreamExt;
use lritdams_core::{
    BroadcastParser, DamsNtCodec, DamsNtFrame, DcpMessage, Disposal, Distributor,
    HritError, HritFileBuilder, HritMessageSpec, HritParser, IngestPhase, Server,
    tcp_session_factory,
};
use lritdams_gateway::config::{ConfigWatcher, GatewayConfig};
use lritdams_gateway::ingest::FileIngestor;
use lritdams_gateway::scan::{DirectoryScanner, ScanEntry, ScanHandler};
use lritdams_gateway::stats::GatewayStats;
use tempfile::TempDir;
use tokio::net::TcpStream;
use tokio_util::codec::FramedRead;

// ── Helpers ──────────────────────────────────────────────────────

/// Stock parser that counts how often it was asked to open a file.
#[derive(Clone, Default)]
struct CountingParser {
    calls: Arc<AtomicUsize>,
}

impl CountingParser {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl BroadcastParser for CountingParser {
    fn open(
        &self,
        name: &str,
        image: Bytes,
    ) -> Result<Box<dyn Iterator<Item = DcpMessage> + Send>, HritError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        HritParser.open(name, image)
    }
}

struct Fixture {
    dir: TempDir,
    server: Arc<Server>,
    stats: Arc<GatewayStats>,
    parser: CountingParser,
}

impl Fixture {
    async fn new() -> Self {
        let server = Server::bind("127.0.0.1:0", tcp_session_factory())
            .await
            .unwrap();
        let s = Arc::clone(&server);
        tokio::spawn(async move { s.listen().await });
        Self {
            dir: tempfile::tempdir().unwrap(),
            server,
            stats: Arc::new(GatewayStats::default()),
            parser: CountingParser::default(),
        }
    }

    fn input(&self) -> PathBuf {
        self.dir.path().join("in")
    }

    fn done(&self) -> PathBuf {
        self.dir.path().join("done")
    }

    fn config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.ingest.input_dir = self.input();
        config.ingest.done_dir = Some(self.done());
        config.ingest.file_prefix = "DCS_".into();
        config
    }

    fn ingestor(&self, config: GatewayConfig) -> FileIngestor {
        let watcher = ConfigWatcher::new(self.dir.path().join("gw.toml"), config);
        let distributor = Arc::new(Distributor::new(self.server.registry().clone()));
        FileIngestor::new(watcher, distributor, Arc::clone(&self.stats))
            .with_parser(Arc::new(self.parser.clone()))
    }

    fn drop_file(&self, name: &str, contents: &[u8], secs_ago: u64) -> ScanEntry {
        std::fs::create_dir_all(self.input()).unwrap();
        let path = self.input().join(name);
        std::fs::write(&path, contents).unwrap();
        let modified = SystemTime::now() - Duration::from_secs(secs_ago);
        set_mtime(&path, modified);
        ScanEntry { path, modified }
    }

    async fn subscribe(&self) -> FramedRead<TcpStream, DamsNtCodec> {
        let want = self.server.registry().len() + 1;
        let stream = TcpStream::connect(self.server.local_addr()).await.unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.server.registry().len() < want {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subscriber not registered");
        FramedRead::new(stream, DamsNtCodec::default())
    }
}

fn set_mtime(path: &Path, when: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(when)
        .unwrap();
}

async fn next_frame(sub: &mut FramedRead<TcpStream, DamsNtCodec>) -> DamsNtFrame {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .expect("timeout")
        .expect("stream ended")
        .expect("decode error")
}

fn good_file(messages: u32) -> Vec<u8> {
    let mut builder = HritFileBuilder::new("DCS_20241231200000");
    for seq in 1..=messages {
        builder = builder.message(HritMessageSpec {
            sequence: seq,
            address: 0xCE12_3400 + seq,
            payload: format!("HG {seq}.00").into_bytes(),
            ..HritMessageSpec::default()
        });
    }
    builder.build()
}

const GARBAGE: &[u8] = b"this is not an HRIT file";

// ── Lifecycle ────────────────────────────────────────────────────

#[tokio::test]
async fn test_good_file_is_distributed_and_moved() {
    let fx = Fixture::new().await;
    let mut sub = fx.subscribe().await;
    let mut ingestor = fx.ingestor(fx.config());

    let entry = fx.drop_file("DCS_1", &good_file(2), 0);
    let phase = ingestor.ingest(&entry).await.unwrap();
    assert_eq!(
        phase,
        IngestPhase::Done {
            disposal: Disposal::Moved(fx.done().join("DCS_1"))
        }
    );
    assert!(!entry.path.exists());

    let first = next_frame(&mut sub).await;
    let second = next_frame(&mut sub).await;
    assert_eq!(first.corrected_address(), Some("CE123401"));
    assert_eq!(second.payload(), Some(&b"HG 2.00"[..]));

    let snap = fx.stats.snapshot(0);
    assert_eq!(snap.files_processed, 1);
    assert_eq!(snap.messages_distributed, 2);
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_old_file_is_abandoned_unparsed() {
    let fx = Fixture::new().await;
    let mut ingestor = fx.ingestor(fx.config());

    let entry = fx.drop_file("DCS_old", &good_file(1), 7300);
    let phase = ingestor.ingest(&entry).await.unwrap();

    assert!(phase.is_done());
    assert_eq!(fx.parser.calls(), 0);
    assert!(!entry.path.exists());
    assert!(fx.done().join("DCS_old").exists());
    assert_eq!(fx.stats.snapshot(0).files_abandoned, 1);
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_young_bad_file_is_left_for_retry() {
    let fx = Fixture::new().await;
    let mut ingestor = fx.ingestor(fx.config());

    let entry = fx.drop_file("DCS_partial", GARBAGE, 5);
    let phase = ingestor.ingest(&entry).await.unwrap();

    assert!(phase.is_pending());
    assert!(entry.path.exists());
    assert_eq!(fx.parser.calls(), 1);
    assert_eq!(fx.stats.snapshot(0).files_retried, 1);
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_bad_file_abandoned_after_retry_window() {
    let fx = Fixture::new().await;
    let mut ingestor = fx.ingestor(fx.config());

    let mut entry = fx.drop_file("DCS_bad", GARBAGE, 5);
    assert!(ingestor.ingest(&entry).await.unwrap().is_pending());

    // Same file seen again once the retry window has run out.
    entry.modified = SystemTime::now() - Duration::from_secs(61);
    set_mtime(&entry.path, entry.modified);
    let phase = ingestor.ingest(&entry).await.unwrap();

    assert!(phase.is_done());
    assert_eq!(fx.parser.calls(), 2);
    assert!(!entry.path.exists());
    assert_eq!(fx.stats.snapshot(0).files_abandoned, 1);
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_file_deleted_without_done_dir() {
    let fx = Fixture::new().await;
    let mut config = fx.config();
    config.ingest.done_dir = None;
    let mut ingestor = fx.ingestor(config);

    let entry = fx.drop_file("DCS_2", &good_file(1), 0);
    let phase = ingestor.ingest(&entry).await.unwrap();
    assert_eq!(
        phase,
        IngestPhase::Done {
            disposal: Disposal::Deleted
        }
    );
    assert!(!entry.path.exists());
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_vanished_file_stays_pending() {
    let fx = Fixture::new().await;
    let mut ingestor = fx.ingestor(fx.config());

    let entry = fx.drop_file("DCS_gone", &good_file(1), 0);
    std::fs::remove_file(&entry.path).unwrap();

    assert!(ingestor.ingest(&entry).await.unwrap().is_pending());
    assert_eq!(fx.parser.calls(), 0);
    fx.server.shutdown().await;
}

// ── Scanner ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_scan_relays_files_oldest_first() {
    let fx = Fixture::new().await;
    let mut sub = fx.subscribe().await;

    let newer = HritFileBuilder::new("DCS_newer")
        .message(HritMessageSpec {
            sequence: 2,
            payload: b"newer".to_vec(),
            ..HritMessageSpec::default()
        })
        .build();
    let older = HritFileBuilder::new("DCS_older")
        .message(HritMessageSpec {
            sequence: 1,
            payload: b"older".to_vec(),
            ..HritMessageSpec::default()
        })
        .build();
    fx.drop_file("DCS_b", &newer, 10);
    fx.drop_file("DCS_a", &older, 20);
    fx.drop_file("ignored.tmp", &older, 30);

    let mut scanner = DirectoryScanner::new(fx.ingestor(fx.config()));
    scanner.scan_once().await;

    assert_eq!(next_frame(&mut sub).await.payload(), Some(&b"older"[..]));
    assert_eq!(next_frame(&mut sub).await.payload(), Some(&b"newer"[..]));
    assert!(fx.done().join("DCS_a").exists());
    assert!(fx.done().join("DCS_b").exists());
    assert!(fx.input().join("ignored.tmp").exists());
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_idle_heartbeat_after_scan() {
    let fx = Fixture::new().await;
    let mut sub = fx.subscribe().await;
    let mut config = fx.config();
    config.damsnt.heartbeat_idle_secs = 0;
    let mut ingestor = fx.ingestor(config);

    ingestor.finished_scan().await;

    assert!(next_frame(&mut sub).await.is_heartbeat());
    assert_eq!(fx.stats.snapshot(0).heartbeats_sent, 1);
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_no_heartbeat_while_traffic_flows() {
    let fx = Fixture::new().await;
    let _sub = fx.subscribe().await;
    let mut ingestor = fx.ingestor(fx.config());

    let entry = fx.drop_file("DCS_3", &good_file(1), 0);
    ingestor.ingest(&entry).await.unwrap();
    ingestor.finished_scan().await;

    assert_eq!(fx.stats.snapshot(0).heartbeats_sent, 0);
    fx.server.shutdown().await;
}

#[tokio::test]
async fn test_cleanup_shuts_server_down() {
    let fx = Fixture::new().await;
    let _sub = fx.subscribe().await;
    let mut ingestor = fx.ingestor(fx.config()).with_server(Arc::clone(&fx.server));

    ingestor.cleanup().await;

    assert!(fx.server.is_shut_down());
    assert!(fx.server.registry().is_empty());
}
