//! Contrast, sharpening and binarization for hard-to-read frames
//!
//! Stages run in a fixed order: grayscale, brightness/contrast, unsharp mask,
//! threshold. Every stage works on RGB and leaves alpha alone.

use rayon::prelude::*;

use crate::models::PixelGrid;
use crate::utils::binarization::otsu_binarize_in_place;
use crate::utils::grayscale::grayscale_in_place;

/// Unsharp mask parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnsharpMask {
    /// Strength, 0..=2
    pub amount: f32,
    /// Box blur radius, 1..=3
    pub radius: u32,
}

impl Default for UnsharpMask {
    fn default() -> Self {
        Self {
            amount: 0.5,
            radius: 2,
        }
    }
}

/// Final binarization step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Threshold {
    /// Leave intensities as they are
    #[default]
    None,
    /// Global Otsu threshold to {0, 255}
    Otsu,
}

/// Enhancement settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnhanceOptions {
    /// Convert to luma first
    pub grayscale: bool,
    /// Contrast in -1..1
    pub contrast: f32,
    /// Brightness in -1..1, as a fraction of the full 0..255 range
    pub brightness: f32,
    /// Sharpening, `None` to disable
    pub unsharp: Option<UnsharpMask>,
    /// Binarization
    pub threshold: Threshold,
}

impl Default for EnhanceOptions {
    fn default() -> Self {
        Self {
            grayscale: true,
            contrast: 0.2,
            brightness: 0.0,
            unsharp: Some(UnsharpMask::default()),
            threshold: Threshold::None,
        }
    }
}

impl EnhanceOptions {
    /// Defaults followed by Otsu binarization
    pub fn binarized() -> Self {
        Self {
            threshold: Threshold::Otsu,
            ..Self::default()
        }
    }
}

/// Enhance a private copy of `grid`
pub fn enhance(grid: &PixelGrid, options: &EnhanceOptions) -> PixelGrid {
    let mut out = grid.clone();

    if options.grayscale {
        grayscale_in_place(&mut out);
    }
    if options.contrast != 0.0 || options.brightness != 0.0 {
        adjust_brightness_contrast(&mut out, options.brightness, options.contrast);
    }
    if let Some(mask) = options.unsharp {
        if mask.amount > 0.0 {
            unsharp_mask(&mut out, mask.amount, mask.radius);
        }
    }
    if options.threshold == Threshold::Otsu {
        otsu_binarize_in_place(&mut out);
    }

    out
}

#[inline]
fn clamp_channel(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}

/// Linear remap `k * (p + b - 128) + 128` with `k = 259(c+1) / (255(1-c))`
pub fn adjust_brightness_contrast(grid: &mut PixelGrid, brightness: f32, contrast: f32) {
    let c = contrast.clamp(-1.0, 0.99);
    let b = brightness.clamp(-1.0, 1.0) * 255.0;
    let k = 259.0 * (c + 1.0) / (255.0 * (1.0 - c));

    let mut lut = [0u8; 256];
    for (v, slot) in lut.iter_mut().enumerate() {
        *slot = clamp_channel(k * (v as f32 + b - 128.0) + 128.0);
    }

    let stride = grid.stride();
    grid.data_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            px[0] = lut[px[0] as usize];
            px[1] = lut[px[1] as usize];
            px[2] = lut[px[2] as usize];
        }
    });
}

/// Separable box blur of the RGB channels, clamp-to-edge, kernel `2r+1`
pub fn box_blur(grid: &PixelGrid, radius: u32) -> Vec<f32> {
    let w = grid.width() as usize;
    let h = grid.height() as usize;
    let r = radius as isize;
    let norm = 1.0 / (2 * radius + 1) as f32;
    let src = grid.data();

    let mut horizontal = vec![0.0f32; w * h * 3];
    horizontal
        .par_chunks_mut(w * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for dx in -r..=r {
                    let sx = (x as isize + dx).clamp(0, w as isize - 1) as usize;
                    let idx = (y * w + sx) * 4;
                    acc[0] += src[idx] as f32;
                    acc[1] += src[idx + 1] as f32;
                    acc[2] += src[idx + 2] as f32;
                }
                row[x * 3] = acc[0] * norm;
                row[x * 3 + 1] = acc[1] * norm;
                row[x * 3 + 2] = acc[2] * norm;
            }
        });

    let mut blurred = vec![0.0f32; w * h * 3];
    blurred
        .par_chunks_mut(w * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for dy in -r..=r {
                    let sy = (y as isize + dy).clamp(0, h as isize - 1) as usize;
                    let idx = (sy * w + x) * 3;
                    acc[0] += horizontal[idx];
                    acc[1] += horizontal[idx + 1];
                    acc[2] += horizontal[idx + 2];
                }
                row[x * 3] = acc[0] * norm;
                row[x * 3 + 1] = acc[1] * norm;
                row[x * 3 + 2] = acc[2] * norm;
            }
        });

    blurred
}

/// `p + (p - blurred) * amount`
pub fn unsharp_mask(grid: &mut PixelGrid, amount: f32, radius: u32) {
    let amount = amount.clamp(0.0, 2.0);
    let radius = radius.clamp(1, 3);
    let blurred = box_blur(grid, radius);
    let w = grid.width() as usize;
    let stride = grid.stride();

    grid.data_mut()
        .par_chunks_mut(stride)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.chunks_exact_mut(4).enumerate() {
                let base = (y * w + x) * 3;
                for c in 0..3 {
                    let p = px[c] as f32;
                    px[c] = clamp_channel(p + (p - blurred[base + c]) * amount);
                }
            }
        });
}
