//! Luma conversion: Y = 0.299*R + 0.587*G + 0.114*B, truncated
//!
//! Integer form `(299*R + 587*G + 114*B) / 1000` truncates exactly the way the
//! float formula does without drifting below 255 for white.

use rayon::prelude::*;

use crate::models::PixelGrid;

const COEF_R: u32 = 299;
const COEF_G: u32 = 587;
const COEF_B: u32 = 114;

/// Luma of one RGB sample
#[inline]
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) / 1000) as u8
}

/// Convert RGBA to one luma byte per pixel, rows in parallel
pub fn rgba_to_luma(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = vec![0u8; width * height];
    if width == 0 {
        return gray;
    }

    gray.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
        let row_start = y * width * 4;
        for (x, out) in row.iter_mut().enumerate() {
            let idx = row_start + x * 4;
            *out = luma(rgba[idx], rgba[idx + 1], rgba[idx + 2]);
        }
    });

    gray
}

/// Replace R, G and B of every pixel with its luma; alpha is kept
pub fn grayscale_in_place(grid: &mut PixelGrid) {
    let stride = grid.stride();
    grid.data_mut().par_chunks_mut(stride).for_each(|row| {
        for px in row.chunks_exact_mut(4) {
            let y = luma(px[0], px[1], px[2]);
            px[0] = y;
            px[1] = y;
            px[2] = y;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_extremes() {
        assert_eq!(luma(255, 255, 255), 255);
        assert_eq!(luma(0, 0, 0), 0);
        // 0.299 * 255 = 76.245
        assert_eq!(luma(255, 0, 0), 76);
        // 0.587 * 255 = 149.685
        assert_eq!(luma(0, 255, 0), 149);
        // 0.114 * 255 = 29.07
        assert_eq!(luma(0, 0, 255), 29);
    }

    #[test]
    fn test_rgba_to_luma() {
        let rgba = vec![255, 0, 0, 255, 0, 255, 0, 0, 0, 0, 255, 255, 255, 255, 255, 255];
        let gray = rgba_to_luma(&rgba, 2, 2);
        assert_eq!(gray, vec![76, 149, 29, 255]);
    }

    #[test]
    fn test_grayscale_in_place_keeps_alpha() {
        let mut grid = PixelGrid::new(1, 2, vec![100, 150, 200, 7, 0, 0, 0, 9]).unwrap();
        grayscale_in_place(&mut grid);
        // 0.299*100 + 0.587*150 + 0.114*200 = 140.75
        assert_eq!(grid.pixel(0, 0), [140, 140, 140, 7]);
        assert_eq!(grid.pixel(0, 1), [0, 0, 0, 9]);
    }
}
