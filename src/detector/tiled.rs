//! Tiled re-scan: the fast path run over overlapping windows
//!
//! Catches symbols too small or too far off-center for a whole-frame pass.
//! Tiles are decoded in parallel; results are reported in row-major tile
//! order and deduplicated by payload, first tile wins.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};

use rayon::prelude::*;
use tracing::{trace, warn};

use crate::error::panic_message;
use crate::models::{DetectedBarcode, PixelGrid};

use super::engine::FastPathEngine;

const MIN_WINDOW: u32 = 32;
const MIN_STRIDE: u32 = 16;

/// Window geometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileOptions {
    /// Fraction of the window shared with its neighbour, 0..1
    pub overlap: f32,
    /// Window size as a fraction of the frame, 0..1
    pub window_ratio: f32,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            overlap: 0.5,
            window_ratio: 0.6,
        }
    }
}

/// Where the windows go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLayout {
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Horizontal step
    pub stride_x: u32,
    /// Vertical step
    pub stride_y: u32,
    /// Top-left corner of every window, row-major
    pub origins: Vec<(u32, u32)>,
}

impl TileLayout {
    /// Lay windows over a `width` x `height` grid
    pub fn new(width: u32, height: u32, options: &TileOptions) -> Self {
        let ratio = options.window_ratio.clamp(0.0, 1.0);
        let overlap = options.overlap.clamp(0.0, 1.0);

        let window_width = MIN_WINDOW.max((width as f32 * ratio).floor() as u32);
        let window_height = MIN_WINDOW.max((height as f32 * ratio).floor() as u32);
        let stride_x = MIN_STRIDE.max((window_width as f32 * (1.0 - overlap)).floor() as u32);
        let stride_y = MIN_STRIDE.max((window_height as f32 * (1.0 - overlap)).floor() as u32);

        let xs = axis_origins(width, window_width, stride_x);
        let ys = axis_origins(height, window_height, stride_y);
        let origins = ys
            .iter()
            .flat_map(|&y| xs.iter().map(move |&x| (x, y)))
            .collect();

        Self {
            window_width,
            window_height,
            stride_x,
            stride_y,
            origins,
        }
    }
}

fn axis_origins(dim: u32, window: u32, stride: u32) -> Vec<u32> {
    let mut origins = Vec::new();
    let mut pos = 0u32;
    while pos + window <= dim {
        origins.push(pos);
        pos += stride;
    }
    origins
}

/// Outcome of one tiled pass
#[derive(Debug, Clone, Default)]
pub struct TileScan {
    /// Hits in frame coordinates, unique by payload
    pub detections: Vec<DetectedBarcode>,
    /// Windows decoded
    pub tiles_scanned: usize,
    /// Windows whose decode returned an error or panicked
    pub failures: usize,
}

/// Run `engine` over every window of `grid`
pub fn scan(grid: &PixelGrid, options: &TileOptions, engine: &dyn FastPathEngine) -> TileScan {
    let layout = TileLayout::new(grid.width(), grid.height(), options);
    trace!(
        tiles = layout.origins.len(),
        window_width = layout.window_width,
        window_height = layout.window_height,
        "Tiled re-scan layout"
    );

    let per_tile: Vec<Result<Option<DetectedBarcode>, String>> = layout
        .origins
        .par_iter()
        .map(|&(x, y)| {
            let tile = grid
                .crop(x, y, layout.window_width, layout.window_height)
                .map_err(|e| e.to_string())?;
            let hit = panic::catch_unwind(AssertUnwindSafe(|| engine.detect(&tile)))
                .map_err(|payload| format!("panicked: {}", panic_message(payload.as_ref())))?
                .map_err(|e| e.to_string())?;
            Ok(hit.map(|mut det| {
                det.translate(x as f32, y as f32);
                det
            }))
        })
        .collect();

    let mut scan = TileScan {
        tiles_scanned: per_tile.len(),
        ..TileScan::default()
    };
    let mut seen = HashSet::new();
    for (origin, result) in layout.origins.iter().zip(per_tile) {
        match result {
            Ok(Some(det)) => {
                if seen.insert(det.raw_value.clone()) {
                    trace!(?origin, value = %det.raw_value, "Tile hit");
                    scan.detections.push(det);
                }
            }
            Ok(None) => {}
            Err(message) => {
                warn!(?origin, %message, "Tile decode failed");
                scan.failures += 1;
            }
        }
    }
    scan
}
