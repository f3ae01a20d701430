use serde::{Deserialize, Serialize};

use super::{Point, Symbology};

/// Axis-aligned envelope of a symbol's corner points
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub x: f32,
    /// Top edge
    pub y: f32,
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl BoundingBox {
    /// Create a new box
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Min/max envelope of `points`; all-zero for an empty slice
    pub fn from_points(points: &[Point]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let mut min_x = f32::INFINITY;
        let mut min_y = f32::INFINITY;
        let mut max_x = f32::NEG_INFINITY;
        let mut max_y = f32::NEG_INFINITY;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Self::new(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Area in square pixels
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union, 0 when disjoint or both boxes are empty
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// True when every field is zero (no geometry)
    pub fn is_degenerate(&self) -> bool {
        *self == Self::default()
    }
}

/// One decoded symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedBarcode {
    /// Decoded payload
    pub raw_value: String,
    /// Symbology the payload was read from
    pub format: Symbology,
    /// Four corners, or empty when the engine reported no geometry
    pub corner_points: Vec<Point>,
    /// Envelope of `corner_points`
    pub bounding_box: BoundingBox,
}

impl DetectedBarcode {
    /// Build a detection, deriving the bounding box from the corners
    pub fn new(raw_value: impl Into<String>, format: Symbology, corner_points: Vec<Point>) -> Self {
        let bounding_box = BoundingBox::from_points(&corner_points);
        Self {
            raw_value: raw_value.into(),
            format,
            corner_points,
            bounding_box,
        }
    }

    /// Shift all geometry by (dx, dy); detections without corners stay at zero
    pub fn translate(&mut self, dx: f32, dy: f32) {
        if self.corner_points.is_empty() {
            return;
        }
        for p in &mut self.corner_points {
            *p = p.translate(dx, dy);
        }
        self.bounding_box.x += dx;
        self.bounding_box.y += dy;
    }
}
