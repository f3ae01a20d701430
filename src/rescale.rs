//! Working-resolution to source-resolution mapping
//!
//! Applied once, at the outer API boundary. A working coordinate `v` maps
//! back to `(v + origin) / scale`, where `origin` is the ROI crop offset in
//! working pixels. Extents only divide.

use crate::models::{BoundingBox, DetectedBarcode, Point};

/// Map one detection back to source coordinates
pub fn rescale_detection(detection: &mut DetectedBarcode, scale: f32, origin: Point) {
    if detection.corner_points.is_empty() {
        return;
    }
    let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };

    for p in &mut detection.corner_points {
        *p = p.translate(origin.x, origin.y).unscale(scale);
    }
    let b = detection.bounding_box;
    detection.bounding_box = BoundingBox::new(
        (b.x + origin.x) / scale,
        (b.y + origin.y) / scale,
        b.width / scale,
        b.height / scale,
    );
}

/// Map every detection back to source coordinates
pub fn rescale(mut detections: Vec<DetectedBarcode>, scale: f32, origin: Point) -> Vec<DetectedBarcode> {
    for detection in &mut detections {
        rescale_detection(detection, scale, origin);
    }
    detections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Symbology;

    fn quad() -> DetectedBarcode {
        DetectedBarcode::new(
            "x",
            Symbology::QrCode,
            vec![
                Point::new(10.0, 20.0),
                Point::new(30.0, 20.0),
                Point::new(30.0, 40.0),
                Point::new(10.0, 40.0),
            ],
        )
    }

    #[test]
    fn test_divides_by_scale() {
        let out = rescale(vec![quad()], 0.5, Point::default());
        assert_eq!(out[0].corner_points[0], Point::new(20.0, 40.0));
        assert_eq!(out[0].bounding_box, BoundingBox::new(20.0, 40.0, 40.0, 40.0));
    }

    #[test]
    fn test_adds_roi_origin_before_dividing() {
        let mut det = quad();
        rescale_detection(&mut det, 0.5, Point::new(5.0, 10.0));
        assert_eq!(det.corner_points[2], Point::new(70.0, 100.0));
        assert_eq!(det.bounding_box, BoundingBox::new(30.0, 60.0, 40.0, 40.0));
    }

    #[test]
    fn test_box_stays_envelope_of_corners() {
        let mut det = quad();
        rescale_detection(&mut det, 0.37, Point::new(3.0, 7.0));
        let envelope = BoundingBox::from_points(&det.corner_points);
        assert!((envelope.x - det.bounding_box.x).abs() < 1e-3);
        assert!((envelope.width - det.bounding_box.width).abs() < 1e-3);
    }

    #[test]
    fn test_no_geometry_stays_zero() {
        let det = DetectedBarcode::new("x", Symbology::Ean8, Vec::new());
        let out = rescale(vec![det], 0.25, Point::new(40.0, 40.0));
        assert!(out[0].bounding_box.is_degenerate());
        assert!(out[0].corner_points.is_empty());
    }
}
