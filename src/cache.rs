//! Stale-while-revalidate customer cache.
//!
//! [`CustomerCache`] owns the current index generation (index plus the
//! source timestamp it was built from) behind one `RwLock`, and swaps in a
//! new generation wholesale when a background rebuild finishes. Readers
//! clone the `Arc` out of the lock and never wait on spreadsheet I/O once
//! the cache is warm.
//!
//! Lifecycle: `Cold` → (snapshot restore or blocking build) → `Warm` →
//! (source modified) → `Refreshing` → `Warm` …

use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

use crate::columns::ColumnSet;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::index::{self, CustomerIndex};
use crate::refresh::{RefreshWorker, SubmitError};
use crate::saving;

/// Where index generations come from.
///
/// The production source is [`SpreadsheetSource`]; the trait exists so the
/// orchestration can be driven by anything that has a modification time and
/// can produce a full index.
pub trait IndexSource: Send + Sync + 'static {
    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Current modification time of the backing data.
    fn modified(&self) -> Result<SystemTime, CacheError>;

    /// Reads the backing data in full and indexes it.
    fn build(&self) -> Result<CustomerIndex, CacheError>;
}

/// A spreadsheet on the local filesystem.
#[derive(Debug, Clone)]
pub struct SpreadsheetSource {
    path: PathBuf,
    columns: ColumnSet,
}

impl SpreadsheetSource {
    pub fn new(path: impl Into<PathBuf>, columns: ColumnSet) -> Self {
        SpreadsheetSource {
            path: path.into(),
            columns,
        }
    }
}

impl IndexSource for SpreadsheetSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn modified(&self) -> Result<SystemTime, CacheError> {
        std::fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map_err(|e| CacheError::unavailable(&self.path, e))
    }

    fn build(&self) -> Result<CustomerIndex, CacheError> {
        index::build_index(&self.path, &self.columns)
    }
}

/// Clears the in-progress flag of a [`TimedSource`] when the read it guards
/// ends, panics included.
struct ReadGuard(Arc<AtomicBool>);

impl Drop for ReadGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Bounds how long a caller waits for `S::build`.
///
/// The read runs on its own thread so it can be abandoned. An abandoned read
/// keeps running until it finishes and its result is dropped; until then no
/// other read of the same source is started and builds fail immediately.
pub struct TimedSource<S> {
    inner: Arc<S>,
    limit: Duration,
    reading: Arc<AtomicBool>,
}

impl<S: IndexSource> TimedSource<S> {
    pub fn new(inner: S, limit: Duration) -> Self {
        TimedSource {
            inner: Arc::new(inner),
            limit,
            reading: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a read, possibly an abandoned one, is still running.
    pub fn is_reading(&self) -> bool {
        self.reading.load(Ordering::Acquire)
    }
}

impl<S: IndexSource> IndexSource for TimedSource<S> {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn modified(&self) -> Result<SystemTime, CacheError> {
        self.inner.modified()
    }

    fn build(&self) -> Result<CustomerIndex, CacheError> {
        if self
            .reading
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CacheError::unavailable(
                self.describe(),
                "an earlier read that timed out is still running",
            ));
        }
        let guard = ReadGuard(Arc::clone(&self.reading));

        let (tx, rx) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        thread::Builder::new()
            .name("customer-sheet-read".to_string())
            .spawn(move || {
                let _guard = guard;
                let _ = tx.send(inner.build());
            })
            .map_err(|e| CacheError::unavailable(self.describe(), e))?;

        match rx.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(CacheError::unavailable(
                self.describe(),
                format!("read exceeded {:.1}s timeout", self.limit.as_secs_f64()),
            )),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CacheError::unavailable(self.describe(), "reader thread panicked"))
            }
        }
    }
}

#[derive(Clone)]
struct Generation {
    index: Arc<CustomerIndex>,
    source_modified: SystemTime,
}

struct Shared {
    source: Box<dyn IndexSource>,
    snapshot_path: Option<PathBuf>,
    current: RwLock<Option<Generation>>,
    // Serializes the blocking cold path.
    cold_start: Mutex<()>,
    // Set while the source cannot be stat'ed, so the warning is logged once.
    source_missing: AtomicBool,
}

impl Shared {
    fn current(&self) -> Option<Generation> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, generation: Generation) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(generation);
    }

    /// Reads the source, indexes it and writes the snapshot.
    ///
    /// The timestamp is taken before the read, so a source rewritten during
    /// the read shows up as stale on the next check.
    fn build_generation(&self) -> Result<Generation, CacheError> {
        let source_modified = self.source.modified()?;
        let index = self.source.build()?;

        if let Some(path) = &self.snapshot_path {
            match saving::save_snapshot(&index, source_modified, path) {
                Ok(()) => log::debug!("wrote customer snapshot {}", path.display()),
                Err(e) => log::warn!("could not write customer snapshot {}: {}", path.display(), e),
            }
        }

        Ok(Generation {
            index: Arc::new(index),
            source_modified,
        })
    }

    fn restore_snapshot(&self) -> Option<Generation> {
        let path = self.snapshot_path.as_ref()?;
        if !path.exists() {
            return None;
        }

        let started = Instant::now();
        match saving::load_snapshot(path) {
            Ok(snapshot) => {
                log::info!(
                    "loaded {} customers from snapshot {} in {:.3}s (source as of {})",
                    snapshot.index.len(),
                    path.display(),
                    started.elapsed().as_secs_f64(),
                    format_time(snapshot.source_modified)
                );
                Some(Generation {
                    index: Arc::new(snapshot.index),
                    source_modified: snapshot.source_modified,
                })
            }
            Err(e) => {
                log::warn!("ignoring customer snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    fn refresh(&self) {
        // A reader may have queued this against a generation that was
        // replaced before the job started.
        if let (Some(current), Ok(modified)) = (self.current(), self.source.modified()) {
            if current.source_modified == modified {
                log::debug!("customer index already current, skipping refresh");
                return;
            }
        }

        log::info!("refreshing customer index from {}", self.source.describe());
        let started = Instant::now();

        match self.build_generation() {
            Ok(generation) => {
                let customers = generation.index.len();
                self.install(generation);
                log::info!(
                    "customer index refreshed in {:.2}s, {} customers",
                    started.elapsed().as_secs_f64(),
                    customers
                );
            }
            Err(e) => log::warn!("customer index refresh failed, keeping stale index: {}", e),
        }
    }
}

/// Lifecycle state reported by [`CustomerCache::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Cold,
    Warm,
    Refreshing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub state: CacheState,
    pub customers: usize,
    /// RFC 3339 modification time of the source the index was built from.
    pub source_modified: Option<String>,
}

/// Process-wide customer lookup cache. Build one and share it behind an
/// `Arc`.
pub struct CustomerCache {
    shared: Arc<Shared>,
    worker: RefreshWorker,
}

impl CustomerCache {
    /// Cache over the spreadsheet and snapshot named in `config`.
    pub fn new(config: CacheConfig) -> std::io::Result<Self> {
        let source = SpreadsheetSource::new(config.source_path, config.columns);
        let snapshot_path = Some(config.snapshot_path);
        match config.load_timeout {
            Some(limit) => Self::with_source(TimedSource::new(source, limit), snapshot_path),
            None => Self::with_source(source, snapshot_path),
        }
    }

    /// Cache over an arbitrary source. Without a snapshot path nothing is
    /// persisted and every cold start reads the source.
    pub fn with_source(
        source: impl IndexSource,
        snapshot_path: Option<PathBuf>,
    ) -> std::io::Result<Self> {
        Ok(CustomerCache {
            shared: Arc::new(Shared {
                source: Box::new(source),
                snapshot_path,
                current: RwLock::new(None),
                cold_start: Mutex::new(()),
                source_missing: AtomicBool::new(false),
            }),
            worker: RefreshWorker::spawn("customer-index-refresh")?,
        })
    }

    /// Returns the current index.
    ///
    /// Once warm this never touches the spreadsheet: if the source changed
    /// since the index was built, a background rebuild is queued (at most one
    /// at a time) and the stale index is returned. Only a cold cache blocks,
    /// and only a cold build can fail.
    pub fn get_index(&self) -> Result<Arc<CustomerIndex>, CacheError> {
        if let Some(generation) = self.shared.current() {
            self.revalidate(&generation);
            return Ok(generation.index);
        }
        self.cold_start()
    }

    /// Populates a cold cache eagerly.
    pub fn warm_up(&self) -> Result<(), CacheError> {
        self.get_index().map(|_| ())
    }

    pub fn status(&self) -> CacheStatus {
        match self.shared.current() {
            None => CacheStatus {
                state: CacheState::Cold,
                customers: 0,
                source_modified: None,
            },
            Some(generation) => CacheStatus {
                state: if self.worker.is_busy() {
                    CacheState::Refreshing
                } else {
                    CacheState::Warm
                },
                customers: generation.index.len(),
                source_modified: Some(
                    chrono::DateTime::<chrono::Utc>::from(generation.source_modified).to_rfc3339(),
                ),
            },
        }
    }

    fn cold_start(&self) -> Result<Arc<CustomerIndex>, CacheError> {
        let _guard = self
            .shared
            .cold_start
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished the cold path while we waited.
        if let Some(generation) = self.shared.current() {
            self.revalidate(&generation);
            return Ok(generation.index);
        }

        if let Some(generation) = self.shared.restore_snapshot() {
            self.shared.install(generation.clone());
            self.revalidate(&generation);
            return Ok(generation.index);
        }

        log::info!(
            "no usable customer snapshot, loading {} synchronously",
            self.shared.source.describe()
        );
        let generation = self.shared.build_generation()?;
        log::info!("customer index ready, {} customers", generation.index.len());
        self.shared.install(generation.clone());
        Ok(generation.index)
    }

    fn revalidate(&self, generation: &Generation) {
        let modified = match self.shared.source.modified() {
            Ok(modified) => modified,
            Err(e) => {
                if self.shared.source_missing.swap(true, Ordering::AcqRel) {
                    log::debug!("customer source still unreadable: {}", e);
                } else {
                    log::warn!("cannot check customer source, serving cached index: {}", e);
                }
                return;
            }
        };
        if self.shared.source_missing.swap(false, Ordering::AcqRel) {
            log::info!("customer source {} is readable again", self.shared.source.describe());
        }
        if modified == generation.source_modified {
            return;
        }

        let shared = Arc::clone(&self.shared);
        match self.worker.try_submit(move || shared.refresh()) {
            Ok(()) => log::info!(
                "customer data stale (index {}, source {}), refreshing in background",
                format_time(generation.source_modified),
                format_time(modified)
            ),
            Err(SubmitError::Busy) => log::debug!("customer data stale, refresh already running"),
            Err(SubmitError::WorkerGone) => {
                log::error!("customer refresh worker is gone, serving stale index")
            }
        }
    }
}

fn format_time(time: SystemTime) -> String {
    chrono::DateTime::<chrono::Local>::from(time)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SourceRecord;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc::{Receiver, Sender, channel};

    #[derive(Default)]
    struct FakeInner {
        modified: Mutex<Option<SystemTime>>,
        invoice_tag: Mutex<String>,
        fail: AtomicBool,
        builds: AtomicUsize,
        running: AtomicUsize,
        max_running: AtomicUsize,
        hold: Mutex<Option<Receiver<()>>>,
    }

    #[derive(Clone, Default)]
    struct FakeSource(Arc<FakeInner>);

    impl FakeSource {
        fn at(secs: u64, tag: &str) -> Self {
            let source = FakeSource::default();
            source.set(secs, tag);
            source
        }

        fn set(&self, secs: u64, tag: &str) {
            *self.0.modified.lock().unwrap() = Some(time(secs));
            *self.0.invoice_tag.lock().unwrap() = tag.to_string();
        }

        fn remove(&self) {
            *self.0.modified.lock().unwrap() = None;
        }

        /// Makes the next build block until the returned sender fires.
        fn hold(&self) -> Sender<()> {
            let (tx, rx) = channel();
            *self.0.hold.lock().unwrap() = Some(rx);
            tx
        }

        fn builds(&self) -> usize {
            self.0.builds.load(Ordering::SeqCst)
        }
    }

    impl IndexSource for FakeSource {
        fn describe(&self) -> String {
            "fake".to_string()
        }

        fn modified(&self) -> Result<SystemTime, CacheError> {
            self.0
                .modified
                .lock()
                .unwrap()
                .ok_or_else(|| CacheError::unavailable("fake", "gone"))
        }

        fn build(&self) -> Result<CustomerIndex, CacheError> {
            self.0.builds.fetch_add(1, Ordering::SeqCst);
            let running = self.0.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.0.max_running.fetch_max(running, Ordering::SeqCst);

            let hold = self.0.hold.lock().unwrap().take();
            if let Some(rx) = hold {
                let _ = rx.recv_timeout(Duration::from_secs(10));
            }
            self.0.running.fetch_sub(1, Ordering::SeqCst);

            if self.0.fail.load(Ordering::SeqCst) {
                return Err(CacheError::unavailable("fake", "broken"));
            }
            let tag = self.0.invoice_tag.lock().unwrap().clone();
            Ok(CustomerIndex::from_records((0..3).map(|i| SourceRecord {
                phone: "9876543210".to_string(),
                name: "Asha".to_string(),
                invoice: format!("{}-{}", tag, i),
                ..SourceRecord::default()
            })))
        }
    }

    fn time(secs: u64) -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + secs)
    }

    fn invoices(index: &CustomerIndex) -> Vec<String> {
        index
            .get("9876543210")
            .unwrap()
            .products
            .iter()
            .map(|p| p.invoice.clone())
            .collect()
    }

    fn wait_until(what: &str, cond: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !cond() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn cold_build_then_warm_reads_do_not_rebuild() {
        let source = FakeSource::at(0, "v1");
        let cache = CustomerCache::with_source(source.clone(), None).unwrap();
        assert_eq!(cache.status().state, CacheState::Cold);

        for _ in 0..5 {
            assert_eq!(invoices(&cache.get_index().unwrap()), vec!["v1-0", "v1-1", "v1-2"]);
        }
        assert_eq!(source.builds(), 1);
        assert_eq!(cache.status().state, CacheState::Warm);
        assert_eq!(cache.status().customers, 1);
    }

    #[test]
    fn cold_failure_surfaces() {
        let source = FakeSource::at(0, "v1");
        source.0.fail.store(true, Ordering::SeqCst);
        let cache = CustomerCache::with_source(source.clone(), None).unwrap();

        assert!(matches!(
            cache.get_index(),
            Err(CacheError::SourceUnavailable { .. })
        ));
        assert_eq!(cache.status().state, CacheState::Cold);
    }

    #[test]
    fn stale_index_served_while_refreshing() {
        let source = FakeSource::at(0, "v1");
        let cache = CustomerCache::with_source(source.clone(), None).unwrap();
        cache.warm_up().unwrap();

        let release = source.hold();
        source.set(10, "v2");

        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");
        wait_until("refresh to start", || source.builds() == 2);
        assert_eq!(cache.status().state, CacheState::Refreshing);
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");

        release.send(()).unwrap();
        wait_until("refresh to finish", || cache.status().state == CacheState::Warm);
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v2-0");
        assert_eq!(source.builds(), 2);
    }

    #[test]
    fn at_most_one_refresh_in_flight() {
        let source = FakeSource::at(0, "v1");
        let cache = Arc::new(CustomerCache::with_source(source.clone(), None).unwrap());
        cache.warm_up().unwrap();

        let release = source.hold();
        source.set(10, "v2");

        let readers: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let index = cache.get_index().unwrap();
                        assert_eq!(invoices(&index)[0], "v1-0");
                    }
                })
            })
            .collect();
        for reader in readers {
            reader.join().unwrap();
        }

        wait_until("refresh to start", || source.builds() == 2);
        assert_eq!(cache.status().state, CacheState::Refreshing);
        release.send(()).unwrap();
        wait_until("refresh to finish", || cache.status().state == CacheState::Warm);
        assert_eq!(source.0.max_running.load(Ordering::SeqCst), 1);
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v2-0");
    }

    #[test]
    fn failed_refresh_keeps_stale_index_and_retries_later() {
        let source = FakeSource::at(0, "v1");
        let cache = CustomerCache::with_source(source.clone(), None).unwrap();
        cache.warm_up().unwrap();

        source.0.fail.store(true, Ordering::SeqCst);
        source.set(10, "v2");
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");
        wait_until("failed refresh", || {
            source.builds() == 2 && cache.status().state == CacheState::Warm
        });
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");

        // Still stale, so the read above queued another attempt.
        source.0.fail.store(false, Ordering::SeqCst);
        wait_until("retry", || source.builds() >= 3 && cache.status().state == CacheState::Warm);
        cache.get_index().unwrap();
        wait_until("new data", || invoices(&cache.get_index().unwrap())[0] == "v2-0");
    }

    #[test]
    fn vanished_source_serves_stale_index() {
        let source = FakeSource::at(0, "v1");
        let cache = CustomerCache::with_source(source.clone(), None).unwrap();
        cache.warm_up().unwrap();

        source.remove();
        for _ in 0..3 {
            assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");
        }
        assert!(cache.shared.source_missing.load(Ordering::SeqCst));
        assert_eq!(source.builds(), 1);
        assert_eq!(cache.status().state, CacheState::Warm);

        source.set(0, "v1");
        cache.get_index().unwrap();
        assert!(!cache.shared.source_missing.load(Ordering::SeqCst));
        assert_eq!(source.builds(), 1);
    }

    #[test]
    fn snapshot_skips_source_read_on_cold_start() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("customers.bin.gz");
        let source = FakeSource::at(0, "v1");

        let first = CustomerCache::with_source(source.clone(), Some(snapshot.clone())).unwrap();
        first.warm_up().unwrap();
        assert!(snapshot.exists());
        drop(first);

        let second = CustomerCache::with_source(source.clone(), Some(snapshot)).unwrap();
        assert_eq!(invoices(&second.get_index().unwrap())[0], "v1-0");
        assert_eq!(source.builds(), 1);
        assert!(!second.worker.is_busy());
    }

    #[test]
    fn outdated_snapshot_is_served_then_refreshed() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("customers.bin.gz");
        let source = FakeSource::at(0, "v1");

        let first = CustomerCache::with_source(source.clone(), Some(snapshot.clone())).unwrap();
        first.warm_up().unwrap();
        drop(first);

        source.set(10, "v2");
        let second = CustomerCache::with_source(source.clone(), Some(snapshot)).unwrap();
        assert_eq!(invoices(&second.get_index().unwrap())[0], "v1-0");
        wait_until("refresh", || source.builds() == 2 && !second.worker.is_busy());
        assert_eq!(invoices(&second.get_index().unwrap())[0], "v2-0");
    }

    #[test]
    fn corrupt_snapshot_falls_back_to_source() {
        let dir = tempfile::tempdir().unwrap();
        let snapshot = dir.path().join("customers.bin.gz");
        std::fs::write(&snapshot, b"not a snapshot").unwrap();
        let source = FakeSource::at(0, "v1");

        let cache = CustomerCache::with_source(source.clone(), Some(snapshot.clone())).unwrap();
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");
        assert_eq!(source.builds(), 1);
        assert!(saving::load_snapshot(&snapshot).is_ok());
    }

    #[test]
    fn concurrent_cold_callers_build_once() {
        let source = FakeSource::at(0, "v1");
        let cache = Arc::new(CustomerCache::with_source(source.clone(), None).unwrap());

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.get_index().map(|index| index.len()))
            })
            .collect();
        for caller in callers {
            assert_eq!(caller.join().unwrap().unwrap(), 1);
        }
        assert_eq!(source.builds(), 1);
    }

    #[test]
    fn timed_out_cold_build_is_unavailable() {
        let source = FakeSource::at(0, "v1");
        let release = source.hold();
        let timed = TimedSource::new(source.clone(), Duration::from_millis(50));
        let cache = CustomerCache::with_source(timed, None).unwrap();

        assert!(matches!(
            cache.get_index(),
            Err(CacheError::SourceUnavailable { .. })
        ));
        assert_eq!(cache.status().state, CacheState::Cold);

        // The abandoned read is still running, so no second one starts.
        assert!(matches!(
            cache.get_index(),
            Err(CacheError::SourceUnavailable { .. })
        ));
        assert_eq!(source.builds(), 1);

        release.send(()).unwrap();
        wait_until("abandoned read to finish", || cache.get_index().is_ok());
        assert_eq!(source.builds(), 2);
        assert_eq!(source.0.max_running.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn timed_out_refresh_keeps_stale_index_and_reads_once() {
        let source = FakeSource::at(0, "v1");
        let timed = TimedSource::new(source.clone(), Duration::from_millis(20));
        let cache = CustomerCache::with_source(timed, None).unwrap();
        cache.warm_up().unwrap();

        let release = source.hold();
        source.set(10, "v2");
        for _ in 0..40 {
            assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");
            thread::sleep(Duration::from_millis(10));
        }
        wait_until("slow read to start", || source.builds() == 2);
        wait_until("worker idle", || cache.status().state == CacheState::Warm);

        // Every refresh after the first timed out was refused without reading.
        assert_eq!(source.builds(), 2);
        assert_eq!(source.0.max_running.load(Ordering::SeqCst), 1);
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v1-0");

        release.send(()).unwrap();
        wait_until("new data", || invoices(&cache.get_index().unwrap())[0] == "v2-0");
        assert_eq!(source.builds(), 3);
    }

    #[test]
    fn timed_spreadsheet_read_within_limit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("customers.csv");
        std::fs::write(&path, "Mobile,Customer\n9876543210,Asha\n").unwrap();

        let source = TimedSource::new(
            SpreadsheetSource::new(&path, ColumnSet::default()),
            Duration::from_secs(30),
        );
        assert_eq!(source.build().unwrap().len(), 1);
        wait_until("reader to exit", || !source.is_reading());
        assert_eq!(source.build().unwrap().len(), 1);
    }

    #[test]
    fn refresh_skips_when_index_already_current() {
        let source = FakeSource::at(0, "v1");
        let cache = CustomerCache::with_source(source.clone(), None).unwrap();
        cache.warm_up().unwrap();

        // Queued by a reader holding a generation that has since been replaced.
        cache.shared.refresh();
        assert_eq!(source.builds(), 1);

        source.set(10, "v2");
        cache.shared.refresh();
        assert_eq!(source.builds(), 2);
        assert_eq!(invoices(&cache.get_index().unwrap())[0], "v2-0");
    }
}
