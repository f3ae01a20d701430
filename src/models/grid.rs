use image::RgbaImage;

use crate::error::{Result, ScanError};
use crate::utils::grayscale::luma;

/// Interleaved RGBA8 pixel buffer, the unit of work of every stage
///
/// Invariant: `data.len() == width * height * 4`. Stages that modify pixels
/// clone the grid first; a grid handed to the pipeline is never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelGrid {
    /// Wrap an RGBA buffer, checking dimensions against its length
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ScanError::malformed(format!(
                "pixel grid has zero dimension ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(ScanError::malformed(format!(
                "pixel grid {width}x{height} needs {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Grid filled with one RGBA value
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self> {
        let count = width as usize * height as usize;
        let mut data = Vec::with_capacity(count * 4);
        for _ in 0..count {
            data.extend_from_slice(&rgba);
        }
        Self::new(width, height, data)
    }

    /// Take ownership of an `image` RGBA buffer
    pub fn from_rgba_image(img: RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }

    /// Grid width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Grid height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Bytes per row
    pub fn stride(&self) -> usize {
        self.width as usize * 4
    }

    /// RGBA value at (x, y)
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.data[idx],
            self.data[idx + 1],
            self.data[idx + 2],
            self.data[idx + 3],
        ]
    }

    /// Luma of the pixel at (x, y)
    pub fn luma_at(&self, x: u32, y: u32) -> u8 {
        let [r, g, b, _] = self.pixel(x, y);
        luma(r, g, b)
    }

    /// One luma byte per pixel, row-major
    pub fn to_luma(&self) -> Vec<u8> {
        crate::utils::grayscale::rgba_to_luma(&self.data, self.width as usize, self.height as usize)
    }

    /// Copy of the sub-rectangle at (x, y), clipped to the grid
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Result<PixelGrid> {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let width = width.min(self.width - x);
        let height = height.min(self.height - y);

        let row_bytes = width as usize * 4;
        let mut data = Vec::with_capacity(row_bytes * height as usize);
        for row in y..y + height {
            let start = (row as usize * self.width as usize + x as usize) * 4;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        PixelGrid::new(width, height, data)
    }
}
