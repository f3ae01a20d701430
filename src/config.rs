use std::collections::BTreeSet;
use std::str::FromStr;

use tracing::warn;

use crate::detector::TileOptions;
use crate::detector::multi::DEFAULT_MAX_SYMBOLS;
use crate::frame::{DEFAULT_MAX_SIDE, NormalizeOptions, Roi};
use crate::fusion::DEFAULT_IOU_THRESHOLD;
use crate::models::{DetectionRequest, Symbology};
use crate::utils::enhance::EnhanceOptions;

/// Upper bound on the default worker pool size
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// Where the pipeline is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionContext {
    /// A real image source is attached; decode normally
    #[default]
    Interactive,
    /// Pre-render or server execution; every detection returns empty
    NonInteractive,
}

/// Pipeline tuning
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Longest working side after downscale
    pub max_side: u32,
    /// Region of interest, applied after downscale
    pub roi: Option<Roi>,
    /// Convert the working grid to grayscale before any pass
    pub grayscale: bool,
    /// Tiled re-scan geometry
    pub tile: TileOptions,
    /// IoU above which equal payloads are fused
    pub iou_threshold: f32,
    /// Worker pool cap when no explicit concurrency is given
    pub max_workers: usize,
    /// Cap on multi-symbology hits per call
    pub max_symbols: usize,
    /// Enhancer presets tried in order when the plain fast path misses
    pub enhance_presets: Vec<EnhanceOptions>,
    /// Execution context
    pub context: ExecutionContext,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_MAX_SIDE,
            roi: None,
            grayscale: false,
            tile: TileOptions::default(),
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            max_workers: DEFAULT_MAX_WORKERS,
            max_symbols: DEFAULT_MAX_SYMBOLS,
            enhance_presets: vec![EnhanceOptions::default(), EnhanceOptions::binarized()],
            context: ExecutionContext::Interactive,
        }
    }
}

impl PipelineConfig {
    /// Defaults overlaid with `SCAN_*` environment variables
    ///
    /// Recognized: `SCAN_MAX_SIDE`, `SCAN_TILE_OVERLAP`,
    /// `SCAN_TILE_WINDOW_RATIO`, `SCAN_MAX_WORKERS`, `SCAN_MAX_SYMBOLS`.
    /// Values that fail to parse or fall outside their range are ignored.
    pub fn from_env() -> Self {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values from an arbitrary lookup, e.g. a parsed config file
    pub fn overlay<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_var::<u32, _>(&lookup, "SCAN_MAX_SIDE", |v| *v > 0) {
            self.max_side = v;
        }
        if let Some(v) = parse_var::<f32, _>(&lookup, "SCAN_TILE_OVERLAP", |v| (0.0..1.0).contains(v)) {
            self.tile.overlap = v;
        }
        if let Some(v) = parse_var::<f32, _>(&lookup, "SCAN_TILE_WINDOW_RATIO", |v| {
            *v > 0.0 && *v <= 1.0
        }) {
            self.tile.window_ratio = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "SCAN_MAX_WORKERS", |_| true) {
            self.max_workers = v;
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "SCAN_MAX_SYMBOLS", |v| *v > 0) {
            self.max_symbols = v;
        }
        self
    }

    /// Frame normalizer settings carried by this config
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            max_side: self.max_side,
            roi: self.roi,
            grayscale: self.grayscale,
        }
    }
}

/// Format filter from `SCAN_FORMATS`; `None` when unset or unusable
pub fn formats_from_env() -> Option<DetectionRequest> {
    formats_from(&|name| std::env::var(name).ok())
}

fn formats_from<F>(lookup: &F) -> Option<DetectionRequest>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup("SCAN_FORMATS")?;
    let mut formats = BTreeSet::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match name.parse::<Symbology>() {
            Ok(format) => {
                formats.insert(format);
            }
            Err(err) => warn!(var = "SCAN_FORMATS", %err, "Ignoring format"),
        }
    }
    if formats.is_empty() {
        return None;
    }
    Some(DetectionRequest::new(formats))
}

fn parse_var<T, F>(lookup: &F, name: &str, valid: impl Fn(&T) -> bool) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => Some(v),
        _ => {
            warn!(var = name, value = %raw, "Ignoring invalid setting");
            None
        }
    }
}
