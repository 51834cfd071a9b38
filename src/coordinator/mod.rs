use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::api::PoolMeasure;
use crate::api::client::Result;
use crate::history::HistoryRecorder;

/// How often a device is polled for a fresh measure.
pub const SCAN_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Wait before re-polling after a failed fetch.
const RETRY_DELAY: Duration = Duration::from_secs(60);

/// Anything the coordinator can poll for the latest pool measure.
pub trait MeasureSource: Send + 'static {
    fn fetch_latest(&mut self) -> Result<PoolMeasure>;
}

impl<F> MeasureSource for F
where
    F: FnMut() -> Result<PoolMeasure> + Send + 'static,
{
    fn fetch_latest(&mut self) -> Result<PoolMeasure> {
        (self)()
    }
}

#[derive(Default)]
struct Shared {
    data: Option<PoolMeasure>,
    last_update_success: bool,
}

/// Cheap read-only view of a coordinator's cached state, held by sensors.
#[derive(Clone)]
pub struct CoordinatorHandle {
    shared: Arc<RwLock<Shared>>,
}

impl CoordinatorHandle {
    /// Latest successfully fetched measure, `None` before the first refresh.
    pub fn data(&self) -> Option<PoolMeasure> {
        self.shared.read().ok().and_then(|s| s.data.clone())
    }

    pub fn last_update_success(&self) -> bool {
        self.shared.read().map(|s| s.last_update_success).unwrap_or(false)
    }
}

/// Polls one Flipr device on a timer and caches the latest measure.
///
/// The fetch is a blocking HTTP call, so it runs on the coordinator's own
/// worker thread; sensors only ever touch the cached state through a
/// [`CoordinatorHandle`]. A failed poll keeps the stale measure, clears the
/// success flag and retries after `RETRY_DELAY` instead of waiting out the
/// full interval.
pub struct FliprCoordinator {
    name: String,
    update_interval: Duration,
    shared: Arc<RwLock<Shared>>,
    source: Option<Box<dyn MeasureSource>>,
    recorder: Option<HistoryRecorder>,
    stop_tx: Option<mpsc::Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl FliprCoordinator {
    pub fn new(name: &str, source: impl MeasureSource) -> Self {
        Self::with_interval(name, source, SCAN_INTERVAL)
    }

    pub fn with_interval(name: &str, source: impl MeasureSource, update_interval: Duration) -> Self {
        info!("Creating coordinator '{}', update interval {:?}", name, update_interval);
        FliprCoordinator {
            name: name.to_string(),
            update_interval,
            shared: Arc::new(RwLock::new(Shared::default())),
            source: Some(Box::new(source)),
            recorder: None,
            stop_tx: None,
            worker: None,
        }
    }

    /// Append every successful poll to a CSV history file.
    pub fn with_recorder(mut self, recorder: HistoryRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Fetch once, synchronously. Called at setup so a dead device fails the
    /// whole entry instead of silently exposing empty sensors.
    pub fn first_refresh(&mut self) -> Result<()> {
        let source = match self.source.as_mut() {
            Some(s) => s,
            None => {
                warn!("'{}': first_refresh called after start, ignoring", self.name);
                return Ok(());
            }
        };

        let measure = source.fetch_latest()?;
        info!("'{}': first refresh succeeded", self.name);
        store_success(&self.shared, self.recorder.as_mut(), &self.name, measure);
        Ok(())
    }

    /// Spawn the background worker. The measure source moves into the
    /// worker thread; `first_refresh` must happen before this.
    pub fn start(&mut self) {
        let mut source = match self.source.take() {
            Some(s) => s,
            None => {
                warn!("'{}': already started", self.name);
                return;
            }
        };

        let (tx, rx) = mpsc::channel();
        self.stop_tx = Some(tx);

        let shared = Arc::clone(&self.shared);
        let mut recorder = self.recorder.take();
        let name = self.name.clone();
        let interval = self.update_interval;

        self.worker = Some(thread::spawn(move || {
            info!("'{}': refresh worker started", name);
            let mut wait = interval;
            loop {
                match rx.recv_timeout(wait) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                        info!("'{}': refresh worker stopping", name);
                        break;
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                }

                match source.fetch_latest() {
                    Ok(measure) => {
                        store_success(&shared, recorder.as_mut(), &name, measure);
                        wait = interval;
                    }
                    Err(e) => {
                        error!("'{}': refresh failed: {}", name, e);
                        store_failure(&shared);
                        wait = RETRY_DELAY.min(interval);
                    }
                }
            }
        }));
    }

    /// Stop the worker thread and wait for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
            info!("'{}': coordinator shut down", self.name);
        }
    }
}

impl Drop for FliprCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn store_success(
    shared: &RwLock<Shared>,
    recorder: Option<&mut HistoryRecorder>,
    name: &str,
    measure: PoolMeasure,
) {
    if let Some(rec) = recorder {
        if let Err(e) = rec.record(&measure) {
            warn!("'{}': failed to append history row: {}", name, e);
        }
    }
    if let Ok(mut state) = shared.write() {
        state.data = Some(measure);
        state.last_update_success = true;
    }
}

fn store_failure(shared: &RwLock<Shared>) {
    // Keep the stale measure so sensors can still show the last known value.
    if let Ok(mut state) = shared.write() {
        state.last_update_success = false;
    }
}
