//! rust_barcode - on-device barcode and QR decoding
//!
//! Turns still images, camera frames, raw pixel grids or encoded image blobs
//! into decoded symbols with corner geometry in source-image coordinates.
//!
//! The decode is layered: a fast QR pass, the same pass over enhanced copies
//! of the frame, a tiled re-scan for small or off-center symbols, and a
//! multi-symbology pass. Every pass may fail on its own; the survivors are
//! fused so each symbol is reported once.
//!
//! ```no_run
//! use rust_barcode::{Detector, Symbology};
//!
//! let detector = Detector::new([Symbology::QrCode, Symbology::Ean13]);
//! let bytes = std::fs::read("label.png").unwrap();
//! for hit in detector.detect(rust_barcode::FrameSource::encoded(bytes)).unwrap() {
//!     println!("{} {}", hit.format, hit.raw_value);
//! }
//! ```

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Pipeline tuning and environment overrides
pub mod config;
/// Symbol detection passes and engine adapters
pub mod detector;
/// Error type
pub mod error;
/// Input normalization
pub mod frame;
/// Cross-pass duplicate removal
pub mod fusion;
/// Worker pool and in-thread fallback
pub mod host;
/// Rate-limited scanning of frame streams
pub mod live;
/// Core data structures (PixelGrid, DetectedBarcode, Symbology, etc.)
pub mod models;
/// Multi-pass decode
pub mod pipeline;
/// Working-to-source coordinate mapping
pub mod rescale;
/// Pixel operations (grayscale, binarization, enhancement)
pub mod utils;

pub use config::{ExecutionContext, PipelineConfig};
pub use detector::{Engines, FastPathEngine, MultiSymbologyEngine};
pub use error::{Result, ScanError};
pub use frame::{FrameSource, RgbaFrame, Roi};
pub use host::{Capability, ExecutionHost};
pub use live::{LiveScanner, LiveTicket};
pub use models::{BoundingBox, DetectedBarcode, DetectionRequest, PixelGrid, Point, Symbology};
pub use pipeline::PipelineTelemetry;

use host::PendingRun;
use models::SUPPORTED_FORMATS;

/// Every symbology this crate can report
pub fn supported_formats() -> &'static [Symbology] {
    &SUPPORTED_FORMATS
}

/// Decode every supported symbology in `source` on the calling thread
pub fn detect(source: impl Into<FrameSource>) -> Result<Vec<DetectedBarcode>> {
    Detector::with_engines(
        DetectionRequest::all(),
        Engines::default(),
        PipelineConfig::default(),
        Some(0),
    )
    .detect(source)
}

/// Configured detector owning its execution host
#[derive(Debug)]
pub struct Detector {
    host: ExecutionHost,
    request: DetectionRequest,
}

impl Detector {
    /// Detector for `formats` with default tuning (empty = all formats)
    pub fn new(formats: impl IntoIterator<Item = Symbology>) -> Self {
        Self::with_config(formats, PipelineConfig::default())
    }

    /// Detector with explicit tuning
    pub fn with_config(formats: impl IntoIterator<Item = Symbology>, config: PipelineConfig) -> Self {
        let engines = Engines::with_max_symbols(config.max_symbols);
        Self::with_engines(DetectionRequest::new(formats), engines, config, None)
    }

    /// Detector configured from `SCAN_*` environment variables
    pub fn from_env() -> Self {
        let request = config::formats_from_env().unwrap_or_default();
        let config = PipelineConfig::from_env();
        let engines = Engines::with_max_symbols(config.max_symbols);
        Self::with_engines(request, engines, config, None)
    }

    /// Detector with custom engines and an explicit worker count
    ///
    /// `concurrency` of `None` sizes the pool from the available
    /// parallelism; `Some(0)` runs every detection in the caller's thread.
    pub fn with_engines(
        request: DetectionRequest,
        engines: Engines,
        config: PipelineConfig,
        concurrency: Option<usize>,
    ) -> Self {
        Self {
            host: ExecutionHost::initialize(concurrency, engines, config),
            request,
        }
    }

    /// Formats this detector reports
    pub fn request(&self) -> &DetectionRequest {
        &self.request
    }

    /// Execution capability found at construction
    pub fn capability(&self) -> Capability {
        self.host.capability()
    }

    /// Decode `source` and block until done
    pub fn detect(&self, source: impl Into<FrameSource>) -> Result<Vec<DetectedBarcode>> {
        self.submit(source)?.wait()
    }

    /// Normalize `source` now and decode it on the execution host
    ///
    /// Malformed input fails here; the returned handle only fails when the
    /// worker running it is lost.
    pub fn submit(&self, source: impl Into<FrameSource>) -> Result<PendingDetection> {
        let config = self.host.config();
        if config.context == ExecutionContext::NonInteractive {
            return Ok(PendingDetection {
                run: PendingRun::ready(Vec::new()),
                scale: 1.0,
                origin: Point::default(),
            });
        }

        let frame = frame::normalize(source.into(), &config.normalize_options())?;
        let run = self.host.submit(frame.grid, self.request.clone())?;
        Ok(PendingDetection {
            run,
            scale: frame.scale,
            origin: frame.origin,
        })
    }

    /// Stop the worker pool; later calls run in-thread
    pub fn shutdown(&mut self) {
        self.host.shutdown();
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::new(Vec::<Symbology>::new())
    }
}

/// Result of [`Detector::submit`], in source-image coordinates once resolved
#[derive(Debug)]
pub struct PendingDetection {
    run: PendingRun,
    scale: f32,
    origin: Point,
}

impl PendingDetection {
    /// Block until the detection finishes
    pub fn wait(self) -> Result<Vec<DetectedBarcode>> {
        let detections = self.run.wait()?;
        Ok(rescale::rescale(detections, self.scale, self.origin))
    }

    /// Take the detections if the run has finished, or hand it back
    pub fn try_wait(self) -> std::result::Result<Result<Vec<DetectedBarcode>>, Self> {
        let Self { run, scale, origin } = self;
        match run.try_wait() {
            Ok(result) => Ok(result.map(|d| rescale::rescale(d, scale, origin))),
            Err(run) => Err(Self { run, scale, origin }),
        }
    }
}
