#![allow(dead_code)]

use std::io::Cursor;

use image::{ImageOutputFormat, Rgba, RgbaImage};
use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// QR symbol for `text` with its quiet zone, `module_px` pixels per module
pub fn render_qr(text: &str, module_px: u32) -> RgbaImage {
    let matrix = MultiFormatWriter::default()
        .encode(text, &BarcodeFormat::QR_CODE, 0, 0)
        .expect("QR encode");
    let (w, h) = (matrix.width(), matrix.height());
    RgbaImage::from_fn(w * module_px, h * module_px, |x, y| {
        if matrix.get(x / module_px, y / module_px) {
            BLACK
        } else {
            WHITE
        }
    })
}

/// White canvas with `symbol` pasted at (x, y)
pub fn place(width: u32, height: u32, symbol: &RgbaImage, x: u32, y: u32) -> RgbaImage {
    let mut canvas = RgbaImage::from_pixel(width, height, WHITE);
    image::imageops::overlay(&mut canvas, symbol, x as i64, y as i64);
    canvas
}

/// White canvas with `symbol` centered
pub fn centered(width: u32, height: u32, symbol: &RgbaImage) -> RgbaImage {
    let x = (width - symbol.width()) / 2;
    let y = (height - symbol.height()) / 2;
    place(width, height, symbol, x, y)
}

/// White canvas with a black square covering `[x0, x0 + side)` on both axes
pub fn dark_square(size: u32, x0: u32, side: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        let inside = (x0..x0 + side).contains(&x) && (x0..x0 + side).contains(&y);
        if inside { BLACK } else { WHITE }
    })
}

/// PNG bytes for `img`
pub fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut out, ImageOutputFormat::Png)
        .expect("PNG encode");
    out.into_inner()
}
