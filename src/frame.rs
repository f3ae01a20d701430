//! Frame normalization: any supported input becomes one working-resolution
//! [`PixelGrid`], plus the scale and crop origin needed to map results back.

use image::imageops::FilterType;
use image::{DynamicImage, RgbaImage};
use tracing::{debug, trace};

use crate::error::{Result, ScanError};
use crate::models::{PixelGrid, Point};
use crate::utils::grayscale::grayscale_in_place;

/// Default longest side of the working grid
pub const DEFAULT_MAX_SIDE: u32 = 720;

/// A strided RGBA frame, as delivered by cameras and canvases
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    /// Pixel bytes, `stride` bytes per row
    pub data: Vec<u8>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Bytes per row, at least `width * 4`
    pub stride: usize,
}

impl RgbaFrame {
    /// Tightly packed frame (`stride == width * 4`)
    pub fn packed(data: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            stride: width as usize * 4,
        }
    }
}

/// Anything the detector accepts
#[derive(Debug, Clone)]
pub enum FrameSource {
    /// Decoded still image or bitmap
    Image(DynamicImage),
    /// Video or canvas frame
    Frame(RgbaFrame),
    /// Ready-made grid; never resized
    Grid(PixelGrid),
    /// Compressed image bytes (PNG, JPEG, ...)
    Encoded(Vec<u8>),
}

impl FrameSource {
    /// Compressed image bytes
    pub fn encoded(bytes: impl Into<Vec<u8>>) -> Self {
        FrameSource::Encoded(bytes.into())
    }
}

impl From<DynamicImage> for FrameSource {
    fn from(img: DynamicImage) -> Self {
        FrameSource::Image(img)
    }
}

impl From<RgbaImage> for FrameSource {
    fn from(img: RgbaImage) -> Self {
        FrameSource::Image(DynamicImage::ImageRgba8(img))
    }
}

impl From<RgbaFrame> for FrameSource {
    fn from(frame: RgbaFrame) -> Self {
        FrameSource::Frame(frame)
    }
}

impl From<PixelGrid> for FrameSource {
    fn from(grid: PixelGrid) -> Self {
        FrameSource::Grid(grid)
    }
}

/// Region of interest
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Roi {
    /// Rectangle in source-image pixels
    Absolute {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
    /// Rectangle as fractions (0..1) of the frame
    Normalized {
        /// Left edge
        x: f32,
        /// Top edge
        y: f32,
        /// Width
        width: f32,
        /// Height
        height: f32,
    },
}

/// Normalization settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeOptions {
    /// Longest side of the working grid
    pub max_side: u32,
    /// Crop applied after downscaling
    pub roi: Option<Roi>,
    /// Replace RGB with luma
    pub grayscale: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_side: DEFAULT_MAX_SIDE,
            roi: None,
            grayscale: false,
        }
    }
}

/// Output of [`normalize`]
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    /// Working grid
    pub grid: PixelGrid,
    /// Working size / source size, in (0, 1]
    pub scale: f32,
    /// Top-left of the ROI crop in working pixels
    pub origin: Point,
}

/// `min(1, max_side / max(width, height))`
pub fn working_scale(width: u32, height: u32, max_side: u32) -> f32 {
    let longest = width.max(height).max(1) as f32;
    (max_side.max(1) as f32 / longest).min(1.0)
}

/// Convert `source` into a working grid
pub fn normalize(source: FrameSource, options: &NormalizeOptions) -> Result<NormalizedFrame> {
    let (grid, scale) = match source {
        FrameSource::Grid(grid) => (grid, 1.0),
        FrameSource::Image(img) => downscale(img.to_rgba8(), options.max_side)?,
        FrameSource::Frame(frame) => downscale(unpack_frame(frame)?, options.max_side)?,
        FrameSource::Encoded(bytes) => {
            if bytes.is_empty() {
                return Err(ScanError::malformed("image blob is empty"));
            }
            let img = image::load_from_memory(&bytes)?;
            downscale(img.to_rgba8(), options.max_side)?
        }
    };

    let (mut grid, origin) = match options.roi {
        Some(roi) => crop_to_roi(grid, roi, scale)?,
        None => (grid, Point::default()),
    };

    if options.grayscale {
        grayscale_in_place(&mut grid);
    }

    debug!(
        width = grid.width(),
        height = grid.height(),
        scale,
        "Normalized frame"
    );

    Ok(NormalizedFrame {
        grid,
        scale,
        origin,
    })
}

fn downscale(img: RgbaImage, max_side: u32) -> Result<(PixelGrid, f32)> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(ScanError::malformed(format!(
            "source has zero dimension ({width}x{height})"
        )));
    }

    let scale = working_scale(width, height, max_side);
    if scale >= 1.0 {
        return Ok((PixelGrid::from_rgba_image(img)?, 1.0));
    }

    let new_width = ((width as f32 * scale).round() as u32).max(1);
    let new_height = ((height as f32 * scale).round() as u32).max(1);
    trace!(width, height, new_width, new_height, "Downscaling source");
    let resized = image::imageops::resize(&img, new_width, new_height, FilterType::Triangle);
    Ok((PixelGrid::from_rgba_image(resized)?, scale))
}

/// Copy RGBA frame data without stride padding
fn unpack_frame(frame: RgbaFrame) -> Result<RgbaImage> {
    let RgbaFrame {
        data,
        width,
        height,
        stride,
    } = frame;
    if width == 0 || height == 0 {
        return Err(ScanError::malformed(format!(
            "frame has zero dimension ({width}x{height})"
        )));
    }
    let row_bytes = width as usize * 4;
    if stride < row_bytes {
        return Err(ScanError::malformed(format!(
            "frame stride {stride} is shorter than a {width}-pixel row"
        )));
    }
    let needed = stride
        .checked_mul(height as usize - 1)
        .and_then(|n| n.checked_add(row_bytes))
        .ok_or_else(|| {
            ScanError::malformed(format!(
                "frame {width}x{height} with stride {stride} overflows the address space"
            ))
        })?;
    if data.len() < needed {
        return Err(ScanError::malformed(format!(
            "frame {width}x{height} with stride {stride} needs {needed} bytes, got {}",
            data.len()
        )));
    }

    let packed = if stride == row_bytes {
        let mut data = data;
        data.truncate(row_bytes * height as usize);
        data
    } else {
        let mut packed = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            packed.extend_from_slice(&data[start..start + row_bytes]);
        }
        packed
    };

    RgbaImage::from_raw(width, height, packed)
        .ok_or_else(|| ScanError::malformed("frame bytes do not match its dimensions"))
}

/// Clip `roi` to the grid and crop; an empty intersection keeps the full grid
fn crop_to_roi(grid: PixelGrid, roi: Roi, scale: f32) -> Result<(PixelGrid, Point)> {
    let gw = grid.width() as f32;
    let gh = grid.height() as f32;
    let (x, y, w, h) = match roi {
        Roi::Absolute {
            x,
            y,
            width,
            height,
        } => (x * scale, y * scale, width * scale, height * scale),
        Roi::Normalized {
            x,
            y,
            width,
            height,
        } => (x * gw, y * gh, width * gw, height * gh),
    };

    let x0 = x.clamp(0.0, gw).floor();
    let y0 = y.clamp(0.0, gh).floor();
    let x1 = (x + w).clamp(0.0, gw).ceil();
    let y1 = (y + h).clamp(0.0, gh).ceil();

    // written so that NaN coordinates also fall back
    if !(x1 - x0 >= 1.0 && y1 - y0 >= 1.0) {
        debug!(?roi, "ROI lies outside the frame, using the full frame");
        return Ok((grid, Point::default()));
    }

    let cropped = grid.crop(x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32)?;
    Ok((cropped, Point::new(x0, y0)))
}
