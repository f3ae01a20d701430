//! Off-thread execution of the detection pipeline
//!
//! [`ExecutionHost::initialize`] probes once for worker threads and records
//! the outcome as a [`Capability`]. Every later call branches on that record:
//! with workers, the grid is moved into a request message for the next worker
//! in rotation and the caller gets a [`PendingRun`] that resolves when
//! the reply with the matching correlation id arrives; without workers, the
//! pipeline runs in the caller's thread.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace, warn};

use crate::config::{ExecutionContext, PipelineConfig};
use crate::detector::Engines;
use crate::error::{Result, ScanError};
use crate::models::{DetectedBarcode, DetectionRequest, PixelGrid};
use crate::pipeline;

/// What `initialize` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// A pool of this many worker threads
    Workers(usize),
    /// No workers; the pipeline runs in the caller's thread
    InThread,
}

struct Shared {
    engines: Engines,
    config: PipelineConfig,
}

enum Message {
    Detect {
        id: u64,
        grid: PixelGrid,
        request: DetectionRequest,
        reply: Sender<Reply>,
    },
    Shutdown,
}

struct Reply {
    id: u64,
    detections: Vec<DetectedBarcode>,
}

struct Worker {
    sender: Sender<Message>,
    thread: Option<JoinHandle<()>>,
}

/// Fixed set of worker threads fed round-robin
pub struct WorkerPool {
    workers: Vec<Worker>,
    cursor: AtomicUsize,
    next_id: AtomicU64,
}

impl WorkerPool {
    fn spawn(size: usize, shared: &Arc<Shared>) -> std::io::Result<Self> {
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(size),
            cursor: AtomicUsize::new(0),
            next_id: AtomicU64::new(1),
        };
        for index in 0..size {
            let (sender, receiver) = mpsc::channel();
            let shared = Arc::clone(shared);
            // on error `pool` drops here and joins the workers already started
            let thread = thread::Builder::new()
                .name(format!("barcode-worker-{index}"))
                .spawn(move || worker_loop(index, receiver, shared))?;
            pool.workers.push(Worker {
                sender,
                thread: Some(thread),
            });
        }
        Ok(pool)
    }

    /// Number of workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    fn dispatch(&self, grid: PixelGrid, request: DetectionRequest) -> Result<PendingRun> {
        let worker = self.cursor.fetch_add(1, Ordering::Relaxed) % self.workers.len();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = mpsc::channel();

        trace!(worker, id, "Dispatching detection");
        self.workers[worker]
            .sender
            .send(Message::Detect {
                id,
                grid,
                request,
                reply,
            })
            .map_err(|_| {
                warn!(worker, id, "Worker is gone");
                ScanError::WorkerLost { worker, id }
            })?;

        Ok(PendingRun(Pending::Waiting {
            worker,
            id,
            receiver,
        }))
    }

    fn shutdown(&mut self) {
        for worker in &self.workers {
            let _ = worker.sender.send(Message::Shutdown);
        }
        for (index, worker) in self.workers.iter_mut().enumerate() {
            if let Some(handle) = worker.thread.take() {
                if handle.join().is_err() {
                    warn!(worker = index, "Worker panicked before shutdown");
                }
            }
        }
        self.workers.clear();
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(index: usize, receiver: Receiver<Message>, shared: Arc<Shared>) {
    debug!(worker = index, "Worker started");
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Detect {
                id,
                grid,
                request,
                reply,
            } => {
                let detections = pipeline::run(&grid, &request, &shared.engines, &shared.config);
                // the caller may have dropped its handle
                let _ = reply.send(Reply { id, detections });
            }
            Message::Shutdown => break,
        }
    }
    debug!(worker = index, "Worker stopped");
}

enum Pending {
    Ready(Vec<DetectedBarcode>),
    Waiting {
        worker: usize,
        id: u64,
        receiver: Receiver<Reply>,
    },
}

/// Handle to a detection that may still be running
pub struct PendingRun(Pending);

impl PendingRun {
    pub(crate) fn ready(detections: Vec<DetectedBarcode>) -> Self {
        Self(Pending::Ready(detections))
    }

    /// Block until the result is available
    ///
    /// Fails with [`ScanError::WorkerLost`] when the worker disappears
    /// before replying and [`ScanError::CorrelationMismatch`] when the reply
    /// belongs to another call.
    pub fn wait(self) -> Result<Vec<DetectedBarcode>> {
        match self.0 {
            Pending::Ready(detections) => Ok(detections),
            Pending::Waiting {
                worker,
                id,
                receiver,
            } => {
                let reply = receiver.recv().map_err(|_| {
                    warn!(worker, id, "Worker vanished before replying");
                    ScanError::WorkerLost { worker, id }
                })?;
                check_reply(id, reply)
            }
        }
    }

    /// Take the result if it has arrived, or hand the run back
    pub fn try_wait(self) -> std::result::Result<Result<Vec<DetectedBarcode>>, Self> {
        match self.0 {
            Pending::Ready(detections) => Ok(Ok(detections)),
            Pending::Waiting {
                worker,
                id,
                receiver,
            } => match receiver.try_recv() {
                Ok(reply) => Ok(check_reply(id, reply)),
                Err(TryRecvError::Empty) => Err(Self(Pending::Waiting {
                    worker,
                    id,
                    receiver,
                })),
                Err(TryRecvError::Disconnected) => {
                    warn!(worker, id, "Worker vanished before replying");
                    Ok(Err(ScanError::WorkerLost { worker, id }))
                }
            },
        }
    }
}

fn check_reply(expected: u64, reply: Reply) -> Result<Vec<DetectedBarcode>> {
    if reply.id != expected {
        return Err(ScanError::CorrelationMismatch {
            expected,
            actual: reply.id,
        });
    }
    Ok(reply.detections)
}

impl std::fmt::Debug for PendingRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Pending::Ready(d) => f.debug_tuple("Ready").field(&d.len()).finish(),
            Pending::Waiting { worker, id, .. } => f
                .debug_struct("Waiting")
                .field("worker", worker)
                .field("id", id)
                .finish(),
        }
    }
}

/// Runs the pipeline on a worker pool, or in-thread when none is available
pub struct ExecutionHost {
    capability: Capability,
    pool: Option<WorkerPool>,
    shared: Arc<Shared>,
}

impl ExecutionHost {
    /// Probe for worker support and start the pool
    ///
    /// `concurrency` overrides the pool size; `Some(0)` forces in-thread
    /// execution. The default is the available parallelism clamped to
    /// `1..=config.max_workers`.
    pub fn initialize(concurrency: Option<usize>, engines: Engines, config: PipelineConfig) -> Self {
        let size = concurrency.unwrap_or_else(|| default_pool_size(config.max_workers));
        let shared = Arc::new(Shared { engines, config });

        let pool = if size == 0 {
            None
        } else {
            match WorkerPool::spawn(size, &shared) {
                Ok(pool) => Some(pool),
                Err(err) => {
                    warn!(error = %err, "Could not start workers, running in-thread");
                    None
                }
            }
        };
        let capability = match &pool {
            Some(pool) => Capability::Workers(pool.size()),
            None => Capability::InThread,
        };
        debug!(?capability, "Execution host ready");

        Self {
            capability,
            pool,
            shared,
        }
    }

    /// Recorded capability
    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Pipeline settings shared with the workers
    pub fn config(&self) -> &PipelineConfig {
        &self.shared.config
    }

    /// Start a detection and return a handle to its result
    pub fn submit(&self, grid: PixelGrid, request: DetectionRequest) -> Result<PendingRun> {
        if self.shared.config.context == ExecutionContext::NonInteractive {
            return Ok(PendingRun::ready(Vec::new()));
        }
        match (&self.capability, &self.pool) {
            (Capability::Workers(_), Some(pool)) => pool.dispatch(grid, request),
            _ => Ok(PendingRun::ready(pipeline::run(
                &grid,
                &request,
                &self.shared.engines,
                &self.shared.config,
            ))),
        }
    }

    /// Run a detection and block until it finishes
    pub fn run_detection(&self, grid: PixelGrid, request: DetectionRequest) -> Result<Vec<DetectedBarcode>> {
        self.submit(grid, request)?.wait()
    }

    /// Stop and join every worker; later calls run in-thread
    pub fn shutdown(&mut self) {
        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
            debug!("Execution host shut down");
        }
        self.capability = Capability::InThread;
    }
}

impl std::fmt::Debug for ExecutionHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionHost")
            .field("capability", &self.capability)
            .field("engines", &self.shared.engines)
            .finish()
    }
}

fn default_pool_size(max_workers: usize) -> usize {
    if max_workers == 0 {
        return 0;
    }
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, max_workers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use crate::detector::FastPathEngine;
    use crate::models::{Point, Symbology};

    /// Reports the grid width as payload and records the thread it ran on
    struct Recorder {
        threads: Mutex<HashSet<String>>,
    }

    impl FastPathEngine for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn detect(&self, grid: &PixelGrid) -> crate::error::Result<Option<DetectedBarcode>> {
            let name = thread::current().name().unwrap_or("unnamed").to_string();
            self.threads.lock().unwrap().insert(name);
            Ok(Some(DetectedBarcode::new(
                grid.width().to_string(),
                Symbology::QrCode,
                vec![Point::new(0.0, 0.0), Point::new(4.0, 4.0)],
            )))
        }
    }

    fn host(concurrency: Option<usize>, config: PipelineConfig) -> (ExecutionHost, Arc<Recorder>) {
        let recorder = Arc::new(Recorder {
            threads: Mutex::new(HashSet::new()),
        });
        let engines = Engines::new(recorder.clone(), None);
        (ExecutionHost::initialize(concurrency, engines, config), recorder)
    }

    fn quiet_config() -> PipelineConfig {
        // no tiles on small grids, no enhancer work
        PipelineConfig {
            enhance_presets: Vec::new(),
            ..PipelineConfig::default()
        }
    }

    fn grid(width: u32) -> PixelGrid {
        PixelGrid::filled(width, 20, [255, 255, 255, 255]).unwrap()
    }

    #[test]
    fn test_default_pool_size_is_capped() {
        assert_eq!(default_pool_size(0), 0);
        assert_eq!(default_pool_size(1), 1);
        let size = default_pool_size(4);
        assert!((1..=4).contains(&size));
    }

    #[test]
    fn test_zero_concurrency_runs_in_thread() {
        let (host, recorder) = host(Some(0), quiet_config());
        assert_eq!(host.capability(), Capability::InThread);

        let hits = host.run_detection(grid(20), DetectionRequest::all()).unwrap();
        assert_eq!(hits[0].raw_value, "20");
        let threads = recorder.threads.lock().unwrap();
        assert!(!threads.iter().any(|t| t.starts_with("barcode-worker")));
    }

    #[test]
    fn test_calls_rotate_across_workers() {
        let (host, recorder) = host(Some(3), quiet_config());
        assert_eq!(host.capability(), Capability::Workers(3));

        let pending: Vec<_> = (0..6)
            .map(|i| host.submit(grid(10 + i), DetectionRequest::all()).unwrap())
            .collect();
        let values: Vec<String> = pending
            .into_iter()
            .map(|p| p.wait().unwrap()[0].raw_value.clone())
            .collect();
        assert_eq!(values, vec!["10", "11", "12", "13", "14", "15"]);

        let threads = recorder.threads.lock().unwrap();
        assert_eq!(threads.len(), 3);
        assert!(threads.iter().all(|t| t.starts_with("barcode-worker-")));
    }

    #[test]
    fn test_non_interactive_context_returns_empty_without_work() {
        let config = PipelineConfig {
            context: ExecutionContext::NonInteractive,
            ..quiet_config()
        };
        let (host, recorder) = host(Some(2), config);
        assert!(host.run_detection(grid(20), DetectionRequest::all()).unwrap().is_empty());
        assert!(recorder.threads.lock().unwrap().is_empty());
    }

    #[test]
    fn test_shutdown_joins_and_falls_back() {
        let (mut host, _) = host(Some(2), quiet_config());
        host.shutdown();
        assert_eq!(host.capability(), Capability::InThread);
        let hits = host.run_detection(grid(30), DetectionRequest::all()).unwrap();
        assert_eq!(hits[0].raw_value, "30");
        host.shutdown();
    }

    #[test]
    fn test_wrong_reply_id_is_rejected() {
        let (tx, rx) = mpsc::channel();
        tx.send(Reply {
            id: 8,
            detections: Vec::new(),
        })
        .unwrap();
        let pending = PendingRun(Pending::Waiting {
            worker: 0,
            id: 7,
            receiver: rx,
        });
        match pending.wait() {
            Err(ScanError::CorrelationMismatch { expected, actual }) => {
                assert_eq!((expected, actual), (7, 8));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_try_wait_hands_back_unfinished_run() {
        let (tx, rx) = mpsc::channel();
        let pending = PendingRun(Pending::Waiting {
            worker: 1,
            id: 3,
            receiver: rx,
        });
        let pending = pending.try_wait().expect_err("no reply yet");

        tx.send(Reply {
            id: 3,
            detections: Vec::new(),
        })
        .unwrap();
        let hits = pending.try_wait().expect("reply arrived").unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_vanished_worker_is_reported() {
        let (tx, rx) = mpsc::channel::<Reply>();
        drop(tx);
        let pending = PendingRun(Pending::Waiting {
            worker: 2,
            id: 11,
            receiver: rx,
        });
        assert!(matches!(
            pending.wait(),
            Err(ScanError::WorkerLost { worker: 2, id: 11 })
        ));
    }
}
