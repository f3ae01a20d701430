//! Symbol detection passes
//!
//! This module contains the passes the pipeline layers on top of each other:
//! - Fast path (`rqrr`, QR only, both polarities)
//! - Tiled re-scan (fast path over overlapping windows)
//! - Multi-symbology fusion pass (`rxing`)
//! - Geometry adapter shared by all engines

/// Engine traits and the engine bundle
pub mod engine;
/// QR fast path backed by `rqrr`
pub mod fast_path;
/// Canonical corner extraction from engine-specific geometry
pub mod geometry;
/// Multi-symbology pass backed by `rxing`
pub mod multi;
/// Overlapping-window re-scan
pub mod tiled;

pub use engine::{Engines, FastPathEngine, MultiSymbologyEngine};
pub use fast_path::RqrrReader;
pub use multi::RxingReader;
pub use tiled::{TileLayout, TileOptions, TileScan};
