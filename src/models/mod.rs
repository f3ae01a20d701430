pub mod barcode;
pub mod grid;
pub mod point;
pub mod symbology;

pub use barcode::{BoundingBox, DetectedBarcode};
pub use grid::PixelGrid;
pub use point::Point;
pub use symbology::{DetectionRequest, SUPPORTED_FORMATS, Symbology, UnknownSymbology};
