//! Multi-pass decode over one working grid
//!
//! Passes, in order: fast path, enhanced fast path (only when the plain fast
//! path missed), tiled re-scan, multi-symbology. Every pass can fail or panic
//! on its own; failures are logged and counted and the remaining passes still
//! run. Hits are filtered to the request and fused at the end. Coordinates
//! stay in working-grid space; rescaling happens at the API boundary.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::PipelineConfig;
use crate::detector::{Engines, tiled};
use crate::error::{Result, panic_message};
use crate::fusion;
use crate::models::{DetectedBarcode, DetectionRequest, PixelGrid, Symbology};
use crate::utils::enhance::enhance;

/// Per-pass counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineTelemetry {
    /// Hits from the plain fast path (0 or 1)
    pub fast_path_hits: usize,
    /// Enhancer presets tried
    pub enhance_presets_tried: usize,
    /// Hits from the enhanced fast path (0 or 1)
    pub enhanced_hits: usize,
    /// Windows decoded by the tiled re-scan
    pub tiles_scanned: usize,
    /// Unique hits from the tiled re-scan
    pub tile_hits: usize,
    /// Hits from the multi-symbology engine
    pub multi_hits: usize,
    /// Passes or tiles that errored or panicked
    pub stage_failures: usize,
    /// Detections left after filtering and fusion
    pub fused: usize,
}

/// Run every pass over `grid` and return fused detections
pub fn run(
    grid: &PixelGrid,
    request: &DetectionRequest,
    engines: &Engines,
    config: &PipelineConfig,
) -> Vec<DetectedBarcode> {
    run_with_telemetry(grid, request, engines, config).0
}

/// Like [`run`] but also returns per-pass counters
pub fn run_with_telemetry(
    grid: &PixelGrid,
    request: &DetectionRequest,
    engines: &Engines,
    config: &PipelineConfig,
) -> (Vec<DetectedBarcode>, PipelineTelemetry) {
    let mut tel = PipelineTelemetry::default();
    let mut found: Vec<DetectedBarcode> = Vec::new();
    let started = Instant::now();

    if request.allows(Symbology::QrCode) {
        let fast = engines.fast.as_ref();

        let t = Instant::now();
        if let Some(Some(hit)) = guarded("fast_path", &mut tel, || fast.detect(grid)) {
            tel.fast_path_hits = 1;
            found.push(hit);
        }
        debug!(
            engine = fast.name(),
            hits = tel.fast_path_hits,
            elapsed_ms = t.elapsed().as_millis() as u64,
            "Fast path finished"
        );

        if found.is_empty() {
            let t = Instant::now();
            for preset in &config.enhance_presets {
                tel.enhance_presets_tried += 1;
                let hit = guarded("enhanced_fast_path", &mut tel, || {
                    fast.detect(&enhance(grid, preset))
                });
                if let Some(Some(hit)) = hit {
                    tel.enhanced_hits = 1;
                    found.push(hit);
                    break;
                }
            }
            debug!(
                presets = tel.enhance_presets_tried,
                hits = tel.enhanced_hits,
                elapsed_ms = t.elapsed().as_millis() as u64,
                "Enhanced fast path finished"
            );
        }

        let t = Instant::now();
        if let Some(scan) = guarded("tiled", &mut tel, || {
            Ok(tiled::scan(grid, &config.tile, fast))
        }) {
            tel.tiles_scanned = scan.tiles_scanned;
            tel.tile_hits = scan.detections.len();
            tel.stage_failures += scan.failures;
            found.extend(scan.detections);
        }
        debug!(
            tiles = tel.tiles_scanned,
            hits = tel.tile_hits,
            elapsed_ms = t.elapsed().as_millis() as u64,
            "Tiled re-scan finished"
        );
    } else {
        debug!("QR not requested; fast path and tiled re-scan skipped");
    }

    match &engines.multi {
        Some(multi) => {
            let formats = request.effective_formats();
            let t = Instant::now();
            if let Some(hits) = guarded("multi", &mut tel, || multi.detect(grid, &formats)) {
                tel.multi_hits = hits.len();
                found.extend(hits);
            }
            debug!(
                engine = multi.name(),
                hits = tel.multi_hits,
                elapsed_ms = t.elapsed().as_millis() as u64,
                "Multi-symbology pass finished"
            );
        }
        None => debug!("No multi-symbology engine; pass skipped"),
    }

    found.retain(|d| request.allows(d.format));
    let fused = fusion::dedupe_with_threshold(found, config.iou_threshold);
    tel.fused = fused.len();
    debug!(
        fused = tel.fused,
        failures = tel.stage_failures,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Pipeline finished"
    );

    (fused, tel)
}

/// Run one pass, turning errors and panics into `None`
fn guarded<T>(
    stage: &'static str,
    tel: &mut PipelineTelemetry,
    pass: impl FnOnce() -> Result<T>,
) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(pass)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            warn!(stage, error = %err, "Pass failed, continuing with partial results");
            tel.stage_failures += 1;
            None
        }
        Err(payload) => {
            warn!(
                stage,
                panic = panic_message(payload.as_ref()),
                "Pass panicked, continuing with partial results"
            );
            tel.stage_failures += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::detector::{FastPathEngine, MultiSymbologyEngine};
    use crate::error::ScanError;
    use crate::models::Point;

    fn square(value: &str, format: Symbology, x: f32, y: f32, side: f32) -> DetectedBarcode {
        DetectedBarcode::new(
            value,
            format,
            vec![
                Point::new(x, y),
                Point::new(x + side, y),
                Point::new(x + side, y + side),
                Point::new(x, y + side),
            ],
        )
    }

    /// Hits on grids no wider than `max_side`, counting calls
    struct FixedFast {
        max_side: u32,
        calls: AtomicUsize,
    }

    impl FixedFast {
        fn new(max_side: u32) -> Self {
            Self {
                max_side,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl FastPathEngine for FixedFast {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn detect(&self, grid: &PixelGrid) -> Result<Option<DetectedBarcode>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if grid.width() > self.max_side {
                return Ok(None);
            }
            Ok(Some(square("QR", Symbology::QrCode, 10.0, 10.0, 50.0)))
        }
    }

    /// Hits only on binarized grids (every channel 0 or 255)
    struct BinaryOnly;

    impl FastPathEngine for BinaryOnly {
        fn name(&self) -> &'static str {
            "binary-only"
        }

        fn detect(&self, grid: &PixelGrid) -> Result<Option<DetectedBarcode>> {
            if grid.width() < 100 {
                return Ok(None);
            }
            let binary = grid.data().chunks_exact(4).all(|p| p[0] == 0 || p[0] == 255);
            Ok(binary.then(|| square("BIN", Symbology::QrCode, 0.0, 0.0, 20.0)))
        }
    }

    struct Failing;

    impl FastPathEngine for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn detect(&self, _grid: &PixelGrid) -> Result<Option<DetectedBarcode>> {
            Err(ScanError::Engine {
                engine: "failing",
                message: "boom".into(),
            })
        }
    }

    struct Panicking;

    impl MultiSymbologyEngine for Panicking {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn detect(&self, _grid: &PixelGrid, _formats: &[Symbology]) -> Result<Vec<DetectedBarcode>> {
            panic!("engine crashed")
        }
    }

    struct FixedMulti(Vec<DetectedBarcode>);

    impl MultiSymbologyEngine for FixedMulti {
        fn name(&self) -> &'static str {
            "fixed-multi"
        }

        fn detect(&self, _grid: &PixelGrid, formats: &[Symbology]) -> Result<Vec<DetectedBarcode>> {
            Ok(self
                .0
                .iter()
                .filter(|d| formats.contains(&d.format))
                .cloned()
                .collect())
        }
    }

    fn gray(size: u32) -> PixelGrid {
        PixelGrid::filled(size, size, [128, 128, 128, 255]).unwrap()
    }

    #[test]
    fn test_fast_path_hit_skips_enhancer_and_fuses_tiles() {
        let fast = Arc::new(FixedFast::new(u32::MAX));
        let engines = Engines::new(fast.clone(), None);
        let (hits, tel) = run_with_telemetry(
            &gray(400),
            &DetectionRequest::all(),
            &engines,
            &PipelineConfig::default(),
        );
        assert_eq!(tel.fast_path_hits, 1);
        assert_eq!(tel.enhance_presets_tried, 0);
        assert_eq!(tel.tiles_scanned, 4);
        // every tile reports the same box at a different offset
        assert_eq!(tel.tile_hits, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(fast.calls.load(Ordering::SeqCst), 1 + 4);
    }

    #[test]
    fn test_tiles_recover_what_the_full_frame_misses() {
        // full frame is 2000 wide, tiles are 1200: the engine only hits tiles
        let engines = Engines::new(Arc::new(FixedFast::new(1500)), None);
        let config = PipelineConfig {
            enhance_presets: Vec::new(),
            ..PipelineConfig::default()
        };
        let (hits, tel) =
            run_with_telemetry(&gray(2000), &DetectionRequest::all(), &engines, &config);
        assert_eq!(tel.fast_path_hits, 0);
        assert_eq!(tel.tiles_scanned, 4);
        assert_eq!(tel.tile_hits, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw_value, "QR");
    }

    #[test]
    fn test_enhancer_presets_run_in_order_until_hit() {
        let engines = Engines::new(Arc::new(BinaryOnly), None);
        let (hits, tel) = run_with_telemetry(
            &gray(120),
            &DetectionRequest::all(),
            &engines,
            &PipelineConfig::default(),
        );
        // default preset leaves mid-gray values; the Otsu preset binarizes
        assert_eq!(tel.enhance_presets_tried, 2);
        assert_eq!(tel.enhanced_hits, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].raw_value, "BIN");
    }

    #[test]
    fn test_failures_are_swallowed() {
        let engines = Engines::new(Arc::new(Failing), Some(Arc::new(Panicking)));
        let (hits, tel) = run_with_telemetry(
            &gray(100),
            &DetectionRequest::all(),
            &engines,
            &PipelineConfig::default(),
        );
        assert!(hits.is_empty());
        // fast path + 2 presets + 4 tiles + multi
        assert_eq!(tel.tiles_scanned, 4);
        assert_eq!(tel.stage_failures, 8);
    }

    #[test]
    fn test_multi_hits_are_fused_with_fast_path() {
        let multi = FixedMulti(vec![
            square("QR", Symbology::QrCode, 5.0, 5.0, 60.0),
            square("4006381333931", Symbology::Ean13, 200.0, 200.0, 80.0),
        ]);
        let engines = Engines::new(Arc::new(FixedFast::new(u32::MAX)), Some(Arc::new(multi)));
        let (hits, tel) = run_with_telemetry(
            &gray(400),
            &DetectionRequest::all(),
            &engines,
            &PipelineConfig::default(),
        );
        assert_eq!(tel.multi_hits, 2);
        assert_eq!(hits.len(), 2);
        let qr = hits.iter().find(|d| d.format == Symbology::QrCode).unwrap();
        // the larger multi-symbology box wins over the fast-path box
        assert_eq!(qr.bounding_box.width, 60.0);
    }

    #[test]
    fn test_request_filters_passes_and_results() {
        let fast = Arc::new(FixedFast::new(u32::MAX));
        let multi = FixedMulti(vec![
            square("QR", Symbology::QrCode, 5.0, 5.0, 60.0),
            square("CODE", Symbology::Code128, 200.0, 200.0, 80.0),
        ]);
        let engines = Engines::new(fast.clone(), Some(Arc::new(multi)));
        let request = DetectionRequest::new([Symbology::Code128]);
        let hits = run(&gray(400), &request, &engines, &PipelineConfig::default());

        assert_eq!(fast.calls.load(Ordering::SeqCst), 0);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].format, Symbology::Code128);
    }
}
