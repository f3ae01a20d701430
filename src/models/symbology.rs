use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Barcode standards the pipeline can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symbology {
    /// QR code
    QrCode,
    /// Code 128
    #[serde(rename = "code_128")]
    Code128,
    /// Code 39
    #[serde(rename = "code_39")]
    Code39,
    /// EAN-13
    #[serde(rename = "ean_13")]
    Ean13,
    /// EAN-8
    #[serde(rename = "ean_8")]
    Ean8,
    /// UPC-A
    UpcA,
    /// UPC-E
    UpcE,
    /// Interleaved 2 of 5
    Itf,
    /// PDF417
    #[serde(rename = "pdf417")]
    Pdf417,
    /// Data Matrix
    DataMatrix,
}

/// Every supported symbology, in declaration order
pub const SUPPORTED_FORMATS: [Symbology; 10] = [
    Symbology::QrCode,
    Symbology::Code128,
    Symbology::Code39,
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::UpcA,
    Symbology::UpcE,
    Symbology::Itf,
    Symbology::Pdf417,
    Symbology::DataMatrix,
];

impl Symbology {
    /// Canonical snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            Symbology::QrCode => "qr_code",
            Symbology::Code128 => "code_128",
            Symbology::Code39 => "code_39",
            Symbology::Ean13 => "ean_13",
            Symbology::Ean8 => "ean_8",
            Symbology::UpcA => "upc_a",
            Symbology::UpcE => "upc_e",
            Symbology::Itf => "itf",
            Symbology::Pdf417 => "pdf417",
            Symbology::DataMatrix => "data_matrix",
        }
    }

    /// Name used by multi-symbology engines (`QRCode`, `Code128`, ...)
    pub fn engine_name(&self) -> &'static str {
        match self {
            Symbology::QrCode => "QRCode",
            Symbology::Code128 => "Code128",
            Symbology::Code39 => "Code39",
            Symbology::Ean13 => "EAN-13",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcA => "UPC-A",
            Symbology::UpcE => "UPC-E",
            Symbology::Itf => "ITF",
            Symbology::Pdf417 => "PDF417",
            Symbology::DataMatrix => "DataMatrix",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a name matches no supported symbology
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown symbology: {0}")]
pub struct UnknownSymbology(pub String);

impl FromStr for Symbology {
    type Err = UnknownSymbology;

    /// Accepts canonical names and engine names, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        SUPPORTED_FORMATS
            .iter()
            .copied()
            .find(|f| {
                f.as_str().eq_ignore_ascii_case(needle) || f.engine_name().eq_ignore_ascii_case(needle)
            })
            .ok_or_else(|| UnknownSymbology(needle.to_string()))
    }
}

/// Which symbologies one call targets. Empty means no restriction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectionRequest {
    formats: BTreeSet<Symbology>,
}

impl DetectionRequest {
    /// Request restricted to `formats` (empty = all)
    pub fn new(formats: impl IntoIterator<Item = Symbology>) -> Self {
        Self {
            formats: formats.into_iter().collect(),
        }
    }

    /// Request for every supported symbology
    pub fn all() -> Self {
        Self::default()
    }

    /// Whether `format` may be returned
    pub fn allows(&self, format: Symbology) -> bool {
        self.formats.is_empty() || self.formats.contains(&format)
    }

    /// Effective format list: the explicit set, or every supported format
    pub fn effective_formats(&self) -> Vec<Symbology> {
        if self.formats.is_empty() {
            SUPPORTED_FORMATS.to_vec()
        } else {
            self.formats.iter().copied().collect()
        }
    }
}
