use crate::models::PixelGrid;

/// Calculate Otsu's optimal threshold over a 256-bin histogram
///
/// Pixels at or below the returned value form the dark class.
pub fn otsu_threshold(histogram: &[u32; 256]) -> u8 {
    let total: u64 = histogram.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 0;
    }
    let sum_all: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_bg = 0u64;
    let mut sum_bg = 0.0f64;
    let mut max_variance = 0.0f64;
    let mut optimal_threshold = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        weight_bg += count as u64;
        if weight_bg == 0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0 {
            break;
        }

        sum_bg += t as f64 * count as f64;
        let mean_bg = sum_bg / weight_bg as f64;
        let mean_fg = (sum_all - sum_bg) / weight_fg as f64;

        let variance = weight_bg as f64 * weight_fg as f64 * (mean_bg - mean_fg).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = t as u8;
        }
    }

    optimal_threshold
}

/// Histogram of one channel (0 = R, 1 = G, 2 = B, 3 = A)
pub fn channel_histogram(grid: &PixelGrid, channel: usize) -> [u32; 256] {
    let mut histogram = [0u32; 256];
    for px in grid.data().chunks_exact(4) {
        histogram[px[channel] as usize] += 1;
    }
    histogram
}

/// Binarize every colour channel to {0, 255} with a global Otsu threshold
///
/// The threshold is computed on the red channel, which holds luma once the
/// grid has been converted to grayscale. Returns the threshold used.
pub fn otsu_binarize_in_place(grid: &mut PixelGrid) -> u8 {
    let threshold = otsu_threshold(&channel_histogram(grid, 0));
    threshold_in_place(grid, threshold);
    threshold
}

/// Simple global threshold binarization: values above `threshold` become 255
pub fn threshold_in_place(grid: &mut PixelGrid, threshold: u8) {
    for px in grid.data_mut().chunks_exact_mut(4) {
        let v = if px[0] > threshold { 255 } else { 0 };
        px[0] = v;
        px[1] = v;
        px[2] = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_grid(values: &[u8], width: u32) -> PixelGrid {
        let data = values.iter().flat_map(|&v| [v, v, v, 255]).collect();
        PixelGrid::new(width, (values.len() as u32) / width, data).unwrap()
    }

    #[test]
    fn test_threshold_in_place() {
        let mut grid = gray_grid(&[100, 150, 200, 50], 2);
        threshold_in_place(&mut grid, 128);
        assert_eq!(grid.pixel(0, 0), [0, 0, 0, 255]);
        assert_eq!(grid.pixel(1, 0), [255, 255, 255, 255]);
        assert_eq!(grid.pixel(0, 1), [255, 255, 255, 255]);
        assert_eq!(grid.pixel(1, 1), [0, 0, 0, 255]);
    }

    #[test]
    fn test_otsu_separates_two_classes() {
        let mut values = vec![50u8; 50];
        values.extend(vec![200u8; 50]);
        let mut histogram = [0u32; 256];
        for &v in &values {
            histogram[v as usize] += 1;
        }
        let t = otsu_threshold(&histogram);
        assert!((50..200).contains(&t), "threshold {t}");

        let mut grid = gray_grid(&values, 10);
        otsu_binarize_in_place(&mut grid);
        assert_eq!(grid.pixel(0, 0)[0], 0);
        assert_eq!(grid.pixel(0, 7)[0], 255);
    }

    #[test]
    fn test_otsu_reproduces_noisy_two_level_image() {
        // Deterministic noise in [0, 40) on a 0/255 checkerboard of 4x4 blocks.
        let (w, h) = (32u32, 32u32);
        let mut clean = Vec::new();
        let mut noisy = Vec::new();
        let mut seed = 0x2545_f491u32;
        for y in 0..h {
            for x in 0..w {
                seed ^= seed << 13;
                seed ^= seed >> 17;
                seed ^= seed << 5;
                let noise = (seed % 40) as u8;
                let dark = ((x / 4) + (y / 4)) % 2 == 0;
                clean.push(if dark { 0 } else { 255 });
                noisy.push(if dark { noise } else { 255 - noise });
            }
        }
        let mut grid = gray_grid(&noisy, w);
        otsu_binarize_in_place(&mut grid);
        let binarized: Vec<u8> = grid.data().chunks_exact(4).map(|px| px[0]).collect();
        assert_eq!(binarized, clean);
    }

    #[test]
    fn test_otsu_uniform_image() {
        let mut histogram = [0u32; 256];
        histogram[255] = 100;
        assert_eq!(otsu_threshold(&histogram), 0);
        assert_eq!(otsu_threshold(&[0u32; 256]), 0);
    }
}
