use serde::{Deserialize, Serialize};

/// 2D point in pixel units of the grid it was measured against
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Calculate distance to another point
    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Translate point by (dx, dy)
    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Map a working-resolution point back to source resolution
    pub fn unscale(&self, scale: f32) -> Self {
        Self {
            x: self.x / scale,
            y: self.y / scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_and_unscale() {
        let p = Point::new(10.0, 20.0).translate(5.0, -4.0);
        assert_eq!(p, Point::new(15.0, 16.0));
        assert_eq!(p.unscale(0.5), Point::new(30.0, 32.0));
    }

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
    }
}
