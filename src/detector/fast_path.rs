use rqrr::PreparedImage;
use tracing::trace;

use crate::error::Result;
use crate::models::{DetectedBarcode, PixelGrid, Point, Symbology};

use super::engine::FastPathEngine;
use super::geometry::{EngineGeometry, corner_points};

/// QR reader backed by `rqrr`
///
/// Tries the grid as-is first, then with inverted polarity for light-on-dark
/// symbols. The first grid that decodes wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrReader;

impl FastPathEngine for RqrrReader {
    fn name(&self) -> &'static str {
        "rqrr"
    }

    fn detect(&self, grid: &PixelGrid) -> Result<Option<DetectedBarcode>> {
        let width = grid.width() as usize;
        let height = grid.height() as usize;
        let luma = grid.to_luma();

        for inverted in [false, true] {
            if let Some(hit) = decode_luma(&luma, width, height, inverted) {
                return Ok(Some(hit));
            }
        }
        Ok(None)
    }
}

fn decode_luma(luma: &[u8], width: usize, height: usize, inverted: bool) -> Option<DetectedBarcode> {
    let mut prepared = PreparedImage::prepare_from_greyscale(width, height, |x, y| {
        let v = luma[y * width + x];
        if inverted { 255 - v } else { v }
    });

    let grids = prepared.detect_grids();
    trace!(candidates = grids.len(), inverted, "rqrr grid candidates");

    for grid in grids {
        match grid.decode() {
            Ok((_, content)) => {
                let [tl, tr, br, bl] = grid.bounds;
                let geometry = EngineGeometry::NamedCorners {
                    top_left: Point::new(tl.x as f32, tl.y as f32),
                    top_right: Point::new(tr.x as f32, tr.y as f32),
                    bottom_right: Point::new(br.x as f32, br.y as f32),
                    bottom_left: Point::new(bl.x as f32, bl.y as f32),
                };
                return Some(DetectedBarcode::new(
                    content,
                    Symbology::QrCode,
                    corner_points(&geometry),
                ));
            }
            Err(err) => {
                trace!(error = ?err, inverted, "rqrr grid failed to decode");
            }
        }
    }

    None
}
