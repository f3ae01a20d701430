//! Pixel-level helpers for the decode pipeline
//!
//! - Grayscale conversion (RGBA to luma)
//! - Binarization (Otsu's method and fixed threshold)
//! - Enhancement (brightness/contrast, unsharp mask)

pub mod binarization;
pub mod enhance;
pub mod grayscale;
