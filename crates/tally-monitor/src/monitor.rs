//! Document monitor: watcher, event loop and worker pool
//!
//! ```text
//! notify thread ──paths──▶ event loop (filter, debounce) ──▶ ProcessingQueue
//!                                                              │
//!                           archive ◀── ReviewSink ◀── workers ◀┘
//! ```

use crate::archive::archive_file;
use crate::debounce::{FileSample, StabilityTracker};
use crate::queue::{InFlight, ProcessingQueue};
use crate::{MonitorConfig, MonitorError, MonitorMetrics};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt::Display;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tally_domain::{
    CategorySource, DocumentKind, DocumentState, Fingerprint, ReviewSink, SourceDocument,
};
use tally_processor::DocumentProcessor;
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Suffixes used by browsers and copy tools for partial downloads
const TEMP_SUFFIXES: &[&str] = &[".tmp", ".crdownload", ".part", ".download"];

/// Watches a directory and feeds stable documents to the processor
///
/// Every supported file that lands in the watch directory yields exactly
/// one review record and is then moved to the archive directory, whether
/// extraction succeeded or not. Unsupported files are left alone.
pub struct DocumentMonitor<S, C> {
    config: MonitorConfig,
    shared: Arc<Shared<S, C>>,
    running: AtomicBool,
    /// Held across the whole of `start` and `stop`
    tasks: AsyncMutex<Option<Running>>,
}

/// Handles owned while the monitor runs
struct Running {
    watcher: RecommendedWatcher,
    shutdown: watch::Sender<bool>,
    events: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
}

/// State shared by the event loop and the workers
struct Shared<S, C> {
    processor: Arc<DocumentProcessor>,
    sink: Arc<S>,
    categories: Arc<C>,
    archive_dir: PathBuf,
    queue: ProcessingQueue,
    in_flight: InFlight,
    metrics: Mutex<MonitorMetrics>,
    unarchived: Mutex<Vec<PathBuf>>,
}

impl<S, C> DocumentMonitor<S, C>
where
    S: ReviewSink + Send + Sync + 'static,
    S::Error: Display,
    C: CategorySource + Send + Sync + 'static,
{
    /// Create a stopped monitor
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        config: MonitorConfig,
        processor: Arc<DocumentProcessor>,
        sink: Arc<S>,
        categories: Arc<C>,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let shared = Shared {
            processor,
            sink,
            categories,
            archive_dir: config.archive_dir.clone(),
            queue: ProcessingQueue::new(),
            in_flight: InFlight::new(),
            metrics: Mutex::new(MonitorMetrics::new()),
            unarchived: Mutex::new(Vec::new()),
        };
        Ok(Self {
            config,
            shared: Arc::new(shared),
            running: AtomicBool::new(false),
            tasks: AsyncMutex::new(None),
        })
    }

    /// Begin watching
    ///
    /// Does nothing if the monitor is already running. Creates the archive
    /// directory if needed and, with `scan_existing`, queues files already
    /// present in the watch directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch directory is missing or the watcher
    /// cannot be attached.
    pub async fn start(&self) -> Result<(), MonitorError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.is_some() {
            debug!("Document monitor already running");
            return Ok(());
        }

        *tasks = Some(self.launch().await?);
        self.running.store(true, Ordering::SeqCst);
        info!(
            watch_dir = %self.config.watch_dir.display(),
            archive_dir = %self.config.archive_dir.display(),
            workers = self.config.workers,
            provider = self.shared.processor.provider_name(),
            "Document monitor started"
        );
        Ok(())
    }

    async fn launch(&self) -> Result<Running, MonitorError> {
        if !self.config.watch_dir.is_dir() {
            return Err(MonitorError::WatchDirMissing(self.config.watch_dir.clone()));
        }
        std::fs::create_dir_all(&self.config.archive_dir)?;
        let watch_dir = self.config.watch_dir.canonicalize()?;
        let existing = if self.config.scan_existing {
            existing_files(&watch_dir)?
        } else {
            Vec::new()
        };

        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity);
        let watcher_tx = tx.clone();
        let mut watcher =
            notify::recommended_watcher(move |res: notify::Result<Event>| match res {
                Ok(event) if is_relevant(&event.kind) => {
                    for path in event.paths {
                        // Runs on the watcher's own thread
                        if watcher_tx.blocking_send(path).is_err() {
                            break;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Filesystem watcher error: {}", e),
            })?;
        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        self.shared.queue.reopen();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let events = tokio::spawn(event_loop(
            self.shared.clone(),
            rx,
            shutdown_rx,
            self.config.debounce(),
            self.config.poll_interval(),
        ));
        let workers = (0..self.config.workers)
            .map(|id| tokio::spawn(worker_loop(self.shared.clone(), id)))
            .collect();

        if !existing.is_empty() {
            debug!(count = existing.len(), "Queueing files already in the watch directory");
        }
        for path in existing {
            if tx.send(path).await.is_err() {
                break;
            }
        }

        Ok(Running {
            watcher,
            shutdown,
            events,
            workers,
        })
    }

    /// Stop watching and drain the queue
    ///
    /// New events are no longer accepted and files still stabilizing are
    /// forgotten. Queued documents and any in-flight provider call are
    /// allowed to finish before this returns.
    pub async fn stop(&self) {
        let mut tasks = self.tasks.lock().await;
        let Some(running) = tasks.take() else {
            return;
        };
        let Running {
            watcher,
            shutdown,
            events,
            workers,
        } = running;

        info!(queued = self.shared.queue.len(), "Stopping document monitor");
        drop(watcher);
        let _ = shutdown.send(true);
        if let Err(e) = events.await {
            error!("Event loop ended abnormally: {}", e);
        }

        self.shared.queue.close();
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Worker ended abnormally: {}", e);
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Document monitor stopped\n{}", self.metrics().summary());
    }

    /// Whether `start` has succeeded and `stop` has not been called
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the monitor counters
    pub fn metrics(&self) -> MonitorMetrics {
        self.shared.metrics().clone()
    }

    /// Documents left in the watch directory because the review sink
    /// rejected their record or the archive move failed
    pub fn unarchived(&self) -> Vec<PathBuf> {
        self.shared.unarchived().clone()
    }

    /// Number of documents waiting for a worker
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }

    /// Active configuration
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

}

impl<S, C> Drop for DocumentMonitor<S, C> {
    fn drop(&mut self) {
        if let Some(running) = self.tasks.get_mut().take() {
            // Workers drain what is queued and exit on their own
            let _ = running.shutdown.send(true);
            self.shared.queue.close();
        }
    }
}

impl<S, C> Shared<S, C> {
    fn metrics(&self) -> MutexGuard<'_, MonitorMetrics> {
        self.metrics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unarchived(&self) -> MutexGuard<'_, Vec<PathBuf>> {
        self.unarchived.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handle one path reported by the watcher or the initial scan
    fn observe(&self, tracker: &mut StabilityTracker, path: PathBuf) {
        if is_hidden_or_temporary(&path) {
            debug!(path = %path.display(), "Ignoring hidden or temporary file");
            self.metrics().record_ignored();
            return;
        }
        if DocumentKind::from_path(&path).is_none() {
            debug!(path = %path.display(), "Ignoring unsupported file");
            self.metrics().record_ignored();
            return;
        }
        if !path.is_file() {
            return;
        }

        if tracker.observe(path.clone(), Instant::now()) {
            debug!(path = %path.display(), "Document detected, waiting for it to stabilize");
            self.metrics().record_detected();
        }
    }

    /// Queue a stable document unless its fingerprint is already in flight
    fn enqueue(&self, mut document: SourceDocument) {
        let fingerprint = match Fingerprint::of(&document.path) {
            Ok(fingerprint) => fingerprint,
            Err(e) => {
                debug!(path = %document.path.display(), "File vanished before queueing: {}", e);
                self.metrics().record_dropped();
                return;
            }
        };

        if !self.in_flight.try_claim(fingerprint.clone()) {
            debug!(path = %document.path.display(), "Document already queued, skipping duplicate");
            self.metrics().record_duplicate();
            return;
        }

        document.fingerprint = Some(fingerprint.clone());
        advance(&mut document, DocumentState::Queued);

        match self.queue.push(document) {
            Ok(()) => {
                debug!(path = %fingerprint.path.display(), "Document queued");
                self.metrics().record_queued();
            }
            Err(_) => self.in_flight.release(&fingerprint),
        }
    }
}

impl<S, C> Shared<S, C>
where
    S: ReviewSink,
    S::Error: Display,
    C: CategorySource,
{
    /// Process, record and archive one document
    async fn handle(&self, mut document: SourceDocument) {
        advance(&mut document, DocumentState::Processing);

        let categories = self.categories.categories();
        let record = self.processor.process(&document, &categories).await;
        let success = record.is_success();
        advance(
            &mut document,
            if success {
                DocumentState::Succeeded
            } else {
                DocumentState::Failed
            },
        );
        self.metrics().record_outcome(success);

        if let Err(e) = self.sink.submit(record) {
            error!(
                path = %document.path.display(),
                "Review sink rejected record: {}; file left in the watch directory",
                e
            );
            self.metrics().record_sink_failure();
            self.unarchived().push(document.path);
            return;
        }

        let source = document.path.clone();
        let archive_dir = self.archive_dir.clone();
        let archived = tokio::task::spawn_blocking(move || archive_file(&source, &archive_dir))
            .await
            .unwrap_or_else(|e| Err(io::Error::other(e)));

        match archived {
            Ok(destination) => {
                advance(&mut document, DocumentState::Archived);
                self.metrics().record_archived();
                if let Some(fingerprint) = &document.fingerprint {
                    self.in_flight.release(fingerprint);
                }
                info!(
                    path = %document.path.display(),
                    archived_to = %destination.display(),
                    success,
                    "Document archived"
                );
            }
            Err(source) => {
                let err = MonitorError::Archive {
                    path: document.path.clone(),
                    source,
                };
                error!(
                    path = %document.path.display(),
                    "{}; file left in the watch directory for manual attention",
                    err
                );
                self.metrics().record_archive_failure();
                self.unarchived().push(document.path);
            }
        }
    }
}

async fn event_loop<S, C>(
    shared: Arc<Shared<S, C>>,
    mut events: mpsc::Receiver<PathBuf>,
    mut shutdown: watch::Receiver<bool>,
    debounce: Duration,
    poll_interval: Duration,
) {
    let mut tracker = StabilityTracker::new(debounce);
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let cancelled = tracker.cancel_all();
                debug!(cancelled, "Event loop stopping");
                break;
            }
            Some(path) = events.recv() => shared.observe(&mut tracker, path),
            _ = ticker.tick() => {
                if tracker.is_empty() {
                    continue;
                }
                let outcome = tracker.poll(Instant::now(), FileSample::read);
                for path in outcome.vanished {
                    debug!(path = %path.display(), "File vanished before it stabilized");
                    shared.metrics().record_dropped();
                }
                for document in outcome.ready {
                    shared.enqueue(document);
                }
            }
        }
    }
}

async fn worker_loop<S, C>(shared: Arc<Shared<S, C>>, worker: usize)
where
    S: ReviewSink,
    S::Error: Display,
    C: CategorySource,
{
    debug!(worker, "Worker started");
    while let Some(document) = shared.queue.pop().await {
        shared.handle(document).await;
    }
    debug!(worker, "Worker stopped");
}

fn advance(document: &mut SourceDocument, next: DocumentState) {
    if let Err(e) = document.transition(next) {
        warn!(path = %document.path.display(), "{}", e);
    }
}

/// Creation and modification events; the source side of a rename is not
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Create(_) | EventKind::Any => true,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => false,
        EventKind::Modify(_) => true,
        _ => false,
    }
}

fn is_hidden_or_temporary(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    let lower = name.to_lowercase();
    name.starts_with('.') || name.starts_with("~$") || TEMP_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

/// Regular files directly inside `dir`, sorted by name
fn existing_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};
    use std::time::SystemTime;
    use tally_domain::MemorySink;
    use tally_llm::MockProvider;
    use tally_processor::ProcessorConfig;

    /// Sink that rejects every record
    struct RejectingSink;

    impl ReviewSink for RejectingSink {
        type Error = String;

        fn submit(&self, _record: tally_domain::ReviewRecord) -> Result<(), Self::Error> {
            Err("store offline".to_string())
        }
    }

    fn shared(archive_dir: &Path) -> Shared<MemorySink, Vec<String>> {
        shared_with(archive_dir, MemorySink::new())
    }

    fn shared_with<S>(archive_dir: &Path, sink: S) -> Shared<S, Vec<String>> {
        let provider = Arc::new(MockProvider::new("{}"));
        let processor = DocumentProcessor::new(provider, ProcessorConfig::default()).unwrap();
        Shared {
            processor: Arc::new(processor),
            sink: Arc::new(sink),
            categories: Arc::new(vec!["Travel".to_string()]),
            archive_dir: archive_dir.to_path_buf(),
            queue: ProcessingQueue::new(),
            in_flight: InFlight::new(),
            metrics: Mutex::new(MonitorMetrics::new()),
            unarchived: Mutex::new(Vec::new()),
        }
    }

    /// A document as the tracker hands it over once stable
    fn stable(path: PathBuf) -> SourceDocument {
        let mut document = SourceDocument::new(path);
        document.transition(DocumentState::Stabilizing).unwrap();
        document
    }

    #[test]
    fn test_duplicate_stable_event_is_suppressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.jpg");
        std::fs::write(&path, b"jpeg bytes").unwrap();
        let shared = shared(dir.path());

        shared.enqueue(stable(path.clone()));
        shared.enqueue(stable(path));

        assert_eq!(shared.queue.len(), 1);
        assert_eq!(shared.in_flight.len(), 1);
        let metrics = shared.metrics().clone();
        assert_eq!(metrics.queued, 1);
        assert_eq!(metrics.duplicates, 1);
    }

    #[tokio::test]
    async fn test_queued_document_carries_fingerprint_and_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        let shared = shared(dir.path());

        shared.enqueue(stable(path));

        let document = shared.queue.pop().await.unwrap();
        assert_eq!(document.state, DocumentState::Queued);
        assert_eq!(document.kind, Some(DocumentKind::Pdf));
        assert_eq!(document.fingerprint.as_ref().map(|f| f.size), Some(8));
    }

    #[tokio::test]
    async fn test_queued_document_keeps_detection_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("receipt.png");
        std::fs::write(&path, b"png bytes").unwrap();
        let shared = shared(dir.path());
        let mut tracker = StabilityTracker::new(Duration::from_millis(20));

        let before_detection = SystemTime::now();
        shared.observe(&mut tracker, path);
        let after_detection = SystemTime::now();

        let start = Instant::now();
        tracker.poll(start, FileSample::read);
        tokio::time::sleep(Duration::from_millis(100)).await;
        let outcome = tracker.poll(Instant::now(), FileSample::read);
        assert_eq!(outcome.ready.len(), 1);
        for document in outcome.ready {
            shared.enqueue(document);
        }
        let queued_at = SystemTime::now();

        let document = shared.queue.pop().await.unwrap();
        assert_eq!(document.state, DocumentState::Queued);
        assert!(document.detected_at >= before_detection);
        assert!(document.detected_at <= after_detection);
        let wait = queued_at.duration_since(document.detected_at).unwrap();
        assert!(wait >= Duration::from_millis(100), "{:?}", wait);
    }

    #[tokio::test]
    async fn test_rejected_record_leaves_file_in_place() {
        let watch = tempfile::tempdir().unwrap();
        let archive = tempfile::tempdir().unwrap();
        let path = watch.path().join("receipt.jpg");
        std::fs::write(&path, b"not really a jpeg").unwrap();
        let shared = shared_with(archive.path(), RejectingSink);

        shared.enqueue(stable(path.clone()));
        let document = shared.queue.pop().await.unwrap();
        shared.handle(document).await;

        assert!(path.exists());
        assert!(std::fs::read_dir(archive.path()).unwrap().next().is_none());
        assert_eq!(*shared.unarchived(), vec![path]);
        assert_eq!(shared.in_flight.len(), 1);
        let metrics = shared.metrics().clone();
        assert_eq!(metrics.sink_failures, 1);
        assert_eq!(metrics.archived, 0);
        assert_eq!(metrics.processed(), 1);
    }

    #[test]
    fn test_vanished_file_is_dropped_at_enqueue() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared(dir.path());

        shared.enqueue(stable(dir.path().join("gone.jpg")));

        assert!(shared.queue.is_empty());
        assert_eq!(shared.metrics().dropped, 1);
    }

    #[test]
    fn test_observe_filters() {
        let dir = tempfile::tempdir().unwrap();
        let shared = shared(dir.path());
        let mut tracker = StabilityTracker::new(Duration::from_millis(10));

        for name in ["notes.txt", ".hidden.jpg", "scan.pdf.part", "receipt.jpg"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
            shared.observe(&mut tracker, dir.path().join(name));
        }
        shared.observe(&mut tracker, dir.path().join("receipt.jpg"));

        assert_eq!(tracker.len(), 1);
        assert!(tracker.contains(&dir.path().join("receipt.jpg")));
        let metrics = shared.metrics().clone();
        assert_eq!(metrics.ignored, 3);
        assert_eq!(metrics.detected, 1);
    }

    #[test]
    fn test_hidden_and_temporary_names() {
        assert!(is_hidden_or_temporary(Path::new("/in/.DS_Store")));
        assert!(is_hidden_or_temporary(Path::new("/in/~$invoice.pdf")));
        assert!(is_hidden_or_temporary(Path::new("/in/receipt.jpg.crdownload")));
        assert!(is_hidden_or_temporary(Path::new("/in/receipt.JPG.TMP")));
        assert!(!is_hidden_or_temporary(Path::new("/in/receipt.jpg")));
    }

    #[test]
    fn test_relevant_event_kinds() {
        assert!(is_relevant(&EventKind::Create(CreateKind::File)));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Data(DataChange::Content))));
        assert!(is_relevant(&EventKind::Modify(ModifyKind::Name(RenameMode::To))));
        assert!(!is_relevant(&EventKind::Modify(ModifyKind::Name(RenameMode::From))));
        assert!(!is_relevant(&EventKind::Remove(RemoveKind::File)));
    }

    #[test]
    fn test_existing_files_skips_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("archive")).unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("a.pdf"), b"x").unwrap();

        let files = existing_files(dir.path()).unwrap();
        assert_eq!(files, vec![dir.path().join("a.pdf"), dir.path().join("b.jpg")]);
    }
}
