use std::collections::HashSet;

use rxing::common::HybridBinarizer;
use rxing::multi::{GenericMultipleBarcodeReader, MultipleBarcodeReader};
use rxing::{
    BarcodeFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Exceptions, Luma8LuminanceSource, MultiFormatReader, RXingResult,
};
use tracing::{debug, trace};

use crate::error::{Result, ScanError};
use crate::models::{DetectedBarcode, PixelGrid, Point, Symbology};

use super::engine::MultiSymbologyEngine;
use super::geometry::{EngineGeometry, corner_points};

/// Default cap on symbols returned by one call
pub const DEFAULT_MAX_SYMBOLS: usize = 16;

/// Two-way mapping between [`Symbology`] and `rxing` formats
const FORMAT_TABLE: [(Symbology, BarcodeFormat); 10] = [
    (Symbology::QrCode, BarcodeFormat::QR_CODE),
    (Symbology::Code128, BarcodeFormat::CODE_128),
    (Symbology::Code39, BarcodeFormat::CODE_39),
    (Symbology::Ean13, BarcodeFormat::EAN_13),
    (Symbology::Ean8, BarcodeFormat::EAN_8),
    (Symbology::UpcA, BarcodeFormat::UPC_A),
    (Symbology::UpcE, BarcodeFormat::UPC_E),
    (Symbology::Itf, BarcodeFormat::ITF),
    (Symbology::Pdf417, BarcodeFormat::PDF_417),
    (Symbology::DataMatrix, BarcodeFormat::DATA_MATRIX),
];

/// Engine format for a symbology
pub fn to_engine_format(format: Symbology) -> Option<BarcodeFormat> {
    FORMAT_TABLE
        .iter()
        .find(|(s, _)| *s == format)
        .map(|(_, f)| *f)
}

/// Symbology for an engine format; `None` for formats outside the table
pub fn from_engine_format(format: &BarcodeFormat) -> Option<Symbology> {
    FORMAT_TABLE
        .iter()
        .find(|(_, f)| f == format)
        .map(|(s, _)| *s)
}

/// Multi-symbology reader backed by `rxing`, in try-harder mode
#[derive(Debug, Clone)]
pub struct RxingReader {
    max_symbols: usize,
}

impl RxingReader {
    /// Reader returning at most `max_symbols` hits per call
    pub fn new(max_symbols: usize) -> Self {
        Self {
            max_symbols: max_symbols.max(1),
        }
    }

    /// Symbol cap
    pub fn max_symbols(&self) -> usize {
        self.max_symbols
    }
}

impl Default for RxingReader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SYMBOLS)
    }
}

impl MultiSymbologyEngine for RxingReader {
    fn name(&self) -> &'static str {
        "rxing"
    }

    fn detect(&self, grid: &PixelGrid, formats: &[Symbology]) -> Result<Vec<DetectedBarcode>> {
        let possible: HashSet<BarcodeFormat> =
            formats.iter().filter_map(|f| to_engine_format(*f)).collect();
        if possible.is_empty() {
            return Ok(Vec::new());
        }

        let mut hints = DecodingHintDictionary::new();
        hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(possible),
        );

        let source = Luma8LuminanceSource::new(grid.to_luma(), grid.width(), grid.height());
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = GenericMultipleBarcodeReader::new(MultiFormatReader::default());

        let results = match reader.decode_multiple_with_hints(&mut bitmap, &hints) {
            Ok(results) => results,
            Err(Exceptions::NotFoundException(_)) => return Ok(Vec::new()),
            Err(err) => {
                return Err(ScanError::Engine {
                    engine: "rxing",
                    message: err.to_string(),
                });
            }
        };

        let detections: Vec<DetectedBarcode> = results
            .iter()
            .filter_map(convert_result)
            .take(self.max_symbols)
            .collect();
        trace!(
            raw = results.len(),
            kept = detections.len(),
            "rxing decode finished"
        );
        Ok(detections)
    }
}

fn convert_result(result: &RXingResult) -> Option<DetectedBarcode> {
    let Some(format) = from_engine_format(result.getBarcodeFormat()) else {
        debug!(
            engine_format = ?result.getBarcodeFormat(),
            "Dropping hit with unmapped engine format"
        );
        return None;
    };

    let points: Vec<Point> = result
        .getPoints()
        .iter()
        .map(|p| Point::new(p.x, p.y))
        .collect();
    let geometry = if points.is_empty() {
        EngineGeometry::Missing
    } else {
        EngineGeometry::Points(points)
    };

    Some(DetectedBarcode::new(
        result.getText(),
        format,
        corner_points(&geometry),
    ))
}
