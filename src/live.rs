//! Rate-limited scanning of a camera frame stream
//!
//! At most one frame is in flight at a time and frames arriving faster than
//! the target rate are dropped before any normalization work.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

use crate::error::Result;
use crate::frame::FrameSource;
use crate::models::DetectedBarcode;
use crate::{Detector, PendingDetection};

/// Frame rate used by [`LiveScanner::with_default_rate`]
pub const DEFAULT_TARGET_FPS: f32 = 10.0;

/// State shared between a scanner and its tickets
#[derive(Debug, Default)]
struct LiveState {
    busy: AtomicBool,
    last_value: Mutex<Option<String>>,
    /// Frame whose ticket was dropped before its reply arrived
    abandoned: Mutex<Option<PendingDetection>>,
}

impl LiveState {
    fn record(&self, detections: &[DetectedBarcode]) {
        if let Some(first) = detections.first() {
            *lock(&self.last_value) = Some(first.raw_value.clone());
        }
    }

    /// Release the busy flag once an abandoned frame has finished
    fn reap(&self) {
        let mut slot = lock(&self.abandoned);
        let Some(pending) = slot.take() else {
            return;
        };
        match pending.try_wait() {
            Ok(Ok(detections)) => {
                self.record(&detections);
                self.busy.store(false, Ordering::Release);
            }
            Ok(Err(err)) => {
                warn!(error = %err, "Abandoned frame failed");
                self.busy.store(false, Ordering::Release);
            }
            Err(pending) => *slot = Some(pending),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Throttles a frame stream into a [`Detector`]
#[derive(Debug)]
pub struct LiveScanner {
    detector: Detector,
    min_interval: Duration,
    last_submit: Option<Instant>,
    state: Arc<LiveState>,
}

impl LiveScanner {
    /// Scanner submitting at most `target_fps` frames per second
    ///
    /// A non-positive or non-finite rate disables the interval check; the
    /// busy flag still applies.
    pub fn new(detector: Detector, target_fps: f32) -> Self {
        let min_interval = if target_fps.is_finite() && target_fps > 0.0 {
            Duration::from_secs_f32(1.0 / target_fps)
        } else {
            Duration::ZERO
        };
        Self {
            detector,
            min_interval,
            last_submit: None,
            state: Arc::new(LiveState::default()),
        }
    }

    /// Scanner at [`DEFAULT_TARGET_FPS`]
    pub fn with_default_rate(detector: Detector) -> Self {
        Self::new(detector, DEFAULT_TARGET_FPS)
    }

    /// Offer a frame captured at `now`
    ///
    /// Returns `None` when the frame is dropped, either because a previous
    /// frame is still in flight or because it arrived within the frame
    /// interval. Malformed frames fail without holding the busy flag.
    pub fn offer(&mut self, source: impl Into<FrameSource>, now: Instant) -> Result<Option<LiveTicket>> {
        self.state.reap();
        if let Some(last) = self.last_submit {
            if now.saturating_duration_since(last) < self.min_interval {
                trace!("Frame dropped: interval");
                return Ok(None);
            }
        }
        if self
            .state
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("Frame dropped: busy");
            return Ok(None);
        }

        let pending = match self.detector.submit(source) {
            Ok(pending) => pending,
            Err(err) => {
                self.state.busy.store(false, Ordering::Release);
                return Err(err);
            }
        };
        self.last_submit = Some(now);

        Ok(Some(LiveTicket {
            pending: Some(pending),
            state: Arc::clone(&self.state),
        }))
    }

    /// True while a submitted frame has not finished
    ///
    /// A frame whose ticket was dropped counts until its reply arrives.
    pub fn is_busy(&self) -> bool {
        self.state.reap();
        self.state.busy.load(Ordering::Acquire)
    }

    /// Payload of the most recent frame that decoded anything
    pub fn last_value(&self) -> Option<String> {
        self.state.reap();
        lock(&self.state.last_value).clone()
    }

    /// Underlying detector
    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}

/// One in-flight frame
///
/// Waiting releases the scanner. Dropping it unawaited keeps the scanner
/// busy until the worker replies.
#[derive(Debug)]
pub struct LiveTicket {
    pending: Option<PendingDetection>,
    state: Arc<LiveState>,
}

impl LiveTicket {
    /// Wait for the frame's detections
    pub fn wait(mut self) -> Result<Vec<DetectedBarcode>> {
        let detections = match self.pending.take() {
            Some(pending) => pending.wait()?,
            None => Vec::new(),
        };
        self.state.record(&detections);
        Ok(detections)
    }
}

impl Drop for LiveTicket {
    fn drop(&mut self) {
        match self.pending.take() {
            Some(pending) => {
                trace!("Ticket dropped while its frame is in flight");
                *lock(&self.state.abandoned) = Some(pending);
            }
            None => self.state.busy.store(false, Ordering::Release),
        }
    }
}
