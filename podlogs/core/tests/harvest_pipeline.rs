use std::{
    collections::HashMap,
    fs, io,
    path::Path,
    pin::Pin,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
};

use async_trait::async_trait;
use futures::io::{AsyncRead, Cursor};
use podlogs_core::{
    DynError, FetchError, FileNaming, HarvestConfig, HarvestError, Harvester, LogRequest,
    LogSource, LogStream, Outcome, PodDescriptor, Report, WriteError, fetch,
};
use tempfile::tempdir;

enum PodLogs {
    Bytes(Vec<u8>),
    OpenFails(&'static str),
    BreaksAfter(Vec<u8>),
    Panics(&'static str),
}

#[derive(Default)]
struct MemorySource {
    pods: Vec<PodDescriptor>,
    logs: HashMap<String, PodLogs>,
    list_error: Option<&'static str>,
    opened: Mutex<Vec<(String, String, LogRequest)>>,
    released: Arc<AtomicUsize>,
}

impl MemorySource {
    fn with_pods(names: &[&str]) -> Self {
        Self {
            pods: names.iter().copied().map(PodDescriptor::new).collect(),
            ..Self::default()
        }
    }

    fn logs(mut self, pod: &str, logs: PodLogs) -> Self {
        self.logs.insert(pod.to_owned(), logs);
        self
    }

    fn opened_pods(&self) -> Vec<String> {
        let mut pods: Vec<_> = self
            .opened
            .lock()
            .expect("opened lock")
            .iter()
            .map(|(_, pod, _)| pod.clone())
            .collect();
        pods.sort();
        pods
    }
}

#[async_trait]
impl LogSource for MemorySource {
    async fn list_pods(&self, _namespace: &str) -> Result<Vec<PodDescriptor>, DynError> {
        match self.list_error {
            Some(message) => Err(message.into()),
            None => Ok(self.pods.clone()),
        }
    }

    async fn open_log_stream(
        &self,
        namespace: &str,
        pod: &str,
        request: &LogRequest,
    ) -> Result<LogStream, DynError> {
        self.opened.lock().expect("opened lock").push((
            namespace.to_owned(),
            pod.to_owned(),
            request.clone(),
        ));

        let released = Arc::clone(&self.released);
        match self.logs.get(pod) {
            Some(PodLogs::Bytes(bytes)) => Ok(Box::pin(Tracked {
                inner: Cursor::new(bytes.clone()),
                released,
            })),
            Some(PodLogs::BreaksAfter(prefix)) => Ok(Box::pin(Tracked {
                inner: BrokenReader {
                    prefix: prefix.clone(),
                    pos: 0,
                },
                released,
            })),
            Some(PodLogs::OpenFails(message)) => Err((*message).into()),
            Some(PodLogs::Panics(message)) => Ok(Box::pin(PanickingReader(*message))),
            None => Ok(Box::pin(Cursor::new(Vec::new()))),
        }
    }
}

/// Counts drops so tests can check streams are released.
struct Tracked<R> {
    inner: R,
    released: Arc<AtomicUsize>,
}

impl<R: AsyncRead + Unpin> AsyncRead for Tracked<R> {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}

impl<R> Drop for Tracked<R> {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Yields `prefix`, then fails like a dropped connection.
struct BrokenReader {
    prefix: Vec<u8>,
    pos: usize,
}

impl AsyncRead for BrokenReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        let remaining = &self.prefix[self.pos..];
        if remaining.is_empty() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Poll::Ready(Ok(n))
    }
}

/// Panics on the first read.
struct PanickingReader(&'static str);

impl AsyncRead for PanickingReader {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        panic!("{}", self.0)
    }
}

fn fragments(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_owned()).collect()
}

async fn harvest(source: MemorySource, config: &HarvestConfig) -> (Arc<MemorySource>, Report) {
    let source = Arc::new(source);
    let report = Harvester::new(Arc::clone(&source))
        .run(config)
        .await
        .expect("harvest runs");
    (source, report)
}

fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<_> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| {
            entry
                .expect("entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn end_to_end_matches_fetches_and_writes() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["api-server-1", "worker-1"])
        .logs("api-server-1", PodLogs::Bytes(b"hello\n".to_vec()));
    let config =
        HarvestConfig::new("ns1", fragments(&["api", "missing"])).with_output_dir(dir.path());

    let (source, report) = harvest(source, &config).await;

    assert_eq!(report.namespace(), "ns1");
    assert_eq!(report.len(), 2);

    let api = report.entry("api").expect("api entry");
    assert_eq!(api.pod.as_deref(), Some("api-server-1"));
    match &api.outcome {
        Outcome::Persisted { path, bytes } => {
            assert_eq!(path, &dir.path().join("api-server-1.log"));
            assert_eq!(*bytes, 6);
            assert_eq!(fs::read(path).expect("read log"), b"hello\n");
        }
        other => panic!("unexpected outcome for api: {other:?}"),
    }

    let missing = report.entry("missing").expect("missing entry");
    assert!(missing.pod.is_none());
    assert!(matches!(missing.outcome, Outcome::NotFound));

    assert_eq!(source.opened_pods(), ["api-server-1"]);
    assert_eq!(dir_entries(dir.path()), ["api-server-1.log"]);
}

#[tokio::test]
async fn fetch_failure_is_isolated_from_siblings() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["alpha-1", "beta-1", "gamma-1"])
        .logs("alpha-1", PodLogs::Bytes(b"a\n".to_vec()))
        .logs("beta-1", PodLogs::OpenFails("pods \"beta-1\" is forbidden"))
        .logs("gamma-1", PodLogs::Bytes(b"g\n".to_vec()));
    let config = HarvestConfig::new("ns1", fragments(&["alpha", "beta", "gamma"]))
        .with_output_dir(dir.path());

    let (_source, report) = harvest(source, &config).await;

    assert_eq!(report.persisted_count(), 2);
    assert_eq!(report.failed_count(), 1);
    let beta = report.entry("beta").expect("beta entry");
    assert!(matches!(
        beta.outcome,
        Outcome::FetchFailed {
            error: FetchError::StreamOpenFailed { ref pod, .. }
        } if pod == "beta-1"
    ));
    assert_eq!(dir_entries(dir.path()), ["alpha-1.log", "gamma-1.log"]);
}

#[tokio::test]
async fn panicking_unit_is_reported_as_task_failure() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["bad-0", "good-0"])
        .logs("bad-0", PodLogs::Panics("reader exploded"))
        .logs("good-0", PodLogs::Bytes(b"ok\n".to_vec()));
    let config =
        HarvestConfig::new("ns1", fragments(&["bad", "good"])).with_output_dir(dir.path());

    let (_source, report) = harvest(source, &config).await;

    assert_eq!(report.len(), 2);
    let bad = report.entry("bad").expect("bad entry");
    assert_eq!(bad.pod.as_deref(), Some("bad-0"));
    match &bad.outcome {
        Outcome::FetchFailed {
            error: FetchError::TaskFailed { pod, message },
        } => {
            assert_eq!(pod, "bad-0");
            assert_eq!(message, "harvest unit panicked: reader exploded");
        }
        other => panic!("unexpected outcome for bad: {other:?}"),
    }

    let good = report.entry("good").expect("good entry");
    assert!(matches!(good.outcome, Outcome::Persisted { bytes: 3, .. }));
    assert_eq!(dir_entries(dir.path()), ["good-0.log"]);
}

#[tokio::test]
async fn mid_read_failure_leaves_no_file_and_releases_stream() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["flaky-0"])
        .logs("flaky-0", PodLogs::BreaksAfter(b"partial line".to_vec()));
    let config = HarvestConfig::new("ns1", fragments(&["flaky"])).with_output_dir(dir.path());

    let (source, report) = harvest(source, &config).await;

    let entry = report.entry("flaky").expect("flaky entry");
    match &entry.outcome {
        Outcome::FetchFailed {
            error: FetchError::StreamReadFailed {
                pod,
                bytes_read,
                source,
            },
        } => {
            assert_eq!(pod, "flaky-0");
            assert_eq!(*bytes_read, 12);
            assert_eq!(source.kind(), io::ErrorKind::ConnectionReset);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert!(dir_entries(dir.path()).is_empty());
    assert_eq!(source.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn listing_failure_stops_before_dispatch() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource {
        list_error: Some("namespaces \"ns1\" not found"),
        ..MemorySource::with_pods(&["api-server-1"])
    };
    let source = Arc::new(source);
    let config = HarvestConfig::new("ns1", fragments(&["api"])).with_output_dir(dir.path());

    let err = Harvester::new(Arc::clone(&source))
        .run(&config)
        .await
        .expect_err("listing failure is fatal");

    let HarvestError::ListFailed { namespace, source: cause } = err;
    assert_eq!(namespace, "ns1");
    assert_eq!(cause.to_string(), "namespaces \"ns1\" not found");
    assert!(source.opened_pods().is_empty());
    assert!(dir_entries(dir.path()).is_empty());
}

#[tokio::test]
async fn every_fragment_gets_an_outcome_in_request_order() {
    let dir = tempdir().expect("tempdir");
    let names: Vec<String> = (0..16).map(|i| format!("node-{i:02}")).collect();
    let mut source = MemorySource::with_pods(&names.iter().map(String::as_str).collect::<Vec<_>>());
    for (i, name) in names.iter().enumerate() {
        let logs = if i % 5 == 0 {
            PodLogs::OpenFails("container is waiting to start")
        } else {
            PodLogs::Bytes(format!("{name} says hi\n").into_bytes())
        };
        source = source.logs(name, logs);
    }
    let mut requested = names.clone();
    requested.reverse();
    requested.push("absent".to_owned());
    let config = HarvestConfig::new("ns1", requested.clone()).with_output_dir(dir.path());

    let (_source, report) = harvest(source, &config).await;

    let order: Vec<_> = report.entries().iter().map(|e| e.fragment.clone()).collect();
    assert_eq!(order, requested);
    assert_eq!(report.not_found_count(), 1);
    assert_eq!(report.failed_count(), 4);
    assert_eq!(report.persisted_count(), 12);

    for entry in report.entries() {
        if let Outcome::Persisted { path, .. } = &entry.outcome {
            let pod = entry.pod.as_deref().expect("persisted entries have a pod");
            assert_eq!(
                fs::read_to_string(path).expect("read log"),
                format!("{pod} says hi\n")
            );
        }
    }
}

#[tokio::test]
async fn duplicate_fragments_are_resolved_independently() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["worker-1"])
        .logs("worker-1", PodLogs::Bytes(b"w\n".to_vec()));
    let config = HarvestConfig::new("ns1", fragments(&["worker", " ", "worker"]))
        .with_output_dir(dir.path());

    let (source, report) = harvest(source, &config).await;

    assert_eq!(report.len(), 2);
    assert!(report.all_persisted());
    assert_eq!(source.opened_pods(), ["worker-1", "worker-1"]);
    assert_eq!(
        fs::read(dir.path().join("worker-1.log")).expect("read log"),
        b"w\n"
    );
}

#[tokio::test]
async fn timestamped_naming_suffixes_rfc3339() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["api-server-1"])
        .logs("api-server-1", PodLogs::Bytes(b"hello\n".to_vec()));
    let config = HarvestConfig::new("ns1", fragments(&["api"]))
        .with_output_dir(dir.path())
        .with_naming(FileNaming::Timestamped);

    let (_source, report) = harvest(source, &config).await;

    let Outcome::Persisted { path, .. } = &report.entries()[0].outcome else {
        panic!("expected persisted outcome");
    };
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .expect("utf-8 file name");
    let stamp = name
        .strip_prefix("api-server-1-")
        .and_then(|rest| rest.strip_suffix(".log"))
        .expect("timestamped name");
    assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok(), "{stamp}");
    assert_eq!(fs::read(path).expect("read log"), b"hello\n");
}

#[tokio::test]
async fn write_failure_is_reported_not_fatal() {
    let dir = tempdir().expect("tempdir");
    let missing = dir.path().join("gone");
    let source = MemorySource::with_pods(&["api-server-1"])
        .logs("api-server-1", PodLogs::Bytes(b"hello\n".to_vec()));
    let config = HarvestConfig::new("ns1", fragments(&["api", "nope"])).with_output_dir(&missing);

    let (_source, report) = harvest(source, &config).await;

    assert!(matches!(
        report.entry("api").expect("api entry").outcome,
        Outcome::WriteFailed {
            error: WriteError::Stage { .. }
        }
    ));
    assert!(matches!(
        report.entry("nope").expect("nope entry").outcome,
        Outcome::NotFound
    ));
}

#[tokio::test]
async fn log_request_is_forwarded_to_the_source() {
    let dir = tempdir().expect("tempdir");
    let source = MemorySource::with_pods(&["api-server-1"])
        .logs("api-server-1", PodLogs::Bytes(Vec::new()));
    let request = LogRequest {
        container: Some("sidecar".to_owned()),
        previous: true,
        timestamps: true,
    };
    let config = HarvestConfig::new("ns1", fragments(&["api"]))
        .with_output_dir(dir.path())
        .with_log_request(request.clone());

    let (source, _report) = harvest(source, &config).await;

    let opened = source.opened.lock().expect("opened lock");
    assert_eq!(
        *opened,
        [("ns1".to_owned(), "api-server-1".to_owned(), request)]
    );
}

#[tokio::test]
async fn fetch_reads_stream_to_the_end() {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let source = MemorySource::with_pods(&["big"]).logs("big", PodLogs::Bytes(bytes.clone()));

    let payload = fetch(&source, "ns1", "big", &LogRequest::default())
        .await
        .expect("fetch succeeds");

    assert_eq!(payload.as_bytes(), bytes.as_slice());
    assert_eq!(source.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fetch_open_failure_reports_pod() {
    let source =
        MemorySource::with_pods(&["gone"]).logs("gone", PodLogs::OpenFails("pod terminated"));

    let err = fetch(&source, "ns1", "gone", &LogRequest::default())
        .await
        .expect_err("open fails");

    assert_eq!(err.pod(), "gone");
    assert_eq!(
        err.to_string(),
        "failed to open log stream for pod gone: pod terminated"
    );
}
