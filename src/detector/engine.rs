//! Detector engine seams
//!
//! The pipeline only knows these two traits. The default implementations
//! wrap `rqrr` (fast QR path) and `rxing` (multi-symbology), and tests swap
//! in their own.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::models::{DetectedBarcode, PixelGrid, Symbology};

use super::fast_path::RqrrReader;
use super::multi::RxingReader;

/// Cheap two-dimensional-code reader run first
pub trait FastPathEngine: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Decode at most one symbol, corners in `grid` coordinates.
    /// `Ok(None)` means nothing was found.
    fn detect(&self, grid: &PixelGrid) -> Result<Option<DetectedBarcode>>;
}

/// Slower reader covering every supported symbology
pub trait MultiSymbologyEngine: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Decode every symbol of the given formats, corners in `grid` coordinates
    fn detect(&self, grid: &PixelGrid, formats: &[Symbology]) -> Result<Vec<DetectedBarcode>>;
}

/// The engines one pipeline run uses
#[derive(Clone)]
pub struct Engines {
    /// Fast path, also used per tile
    pub fast: Arc<dyn FastPathEngine>,
    /// Fusion pass; `None` when no multi-symbology engine is available
    pub multi: Option<Arc<dyn MultiSymbologyEngine>>,
}

impl Engines {
    /// Bundle custom engines
    pub fn new(fast: Arc<dyn FastPathEngine>, multi: Option<Arc<dyn MultiSymbologyEngine>>) -> Self {
        Self { fast, multi }
    }

    /// Default engines with the multi-symbology symbol cap set
    pub fn with_max_symbols(max_symbols: usize) -> Self {
        Self {
            fast: Arc::new(RqrrReader),
            multi: Some(Arc::new(RxingReader::new(max_symbols))),
        }
    }
}

impl Default for Engines {
    fn default() -> Self {
        Self {
            fast: Arc::new(RqrrReader),
            multi: Some(Arc::new(RxingReader::default())),
        }
    }
}

impl fmt::Debug for Engines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engines")
            .field("fast", &self.fast.name())
            .field("multi", &self.multi.as_ref().map(|m| m.name()))
            .finish()
    }
}
