//! Engine geometry normalization
//!
//! Engines report symbol positions in different shapes. Everything is folded
//! into one canonical list of four corners (top-left, top-right,
//! bottom-right, bottom-left) or an empty list, checked in this order:
//!
//! 1. named corners: used as-is
//! 2. four or more points: the first four
//! 3. three points: finder centers in engine order (bottom-left, top-left,
//!    top-right); the fourth corner completes the parallelogram
//! 4. two points: a scan line across a linear code, as a flat quad
//! 5. one point: all four corners collapse onto it
//! 6. nothing: empty

use crate::models::Point;

/// Position data as reported by an engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineGeometry {
    /// Explicit corners
    NamedCorners {
        /// Top-left
        top_left: Point,
        /// Top-right
        top_right: Point,
        /// Bottom-right
        bottom_right: Point,
        /// Bottom-left
        bottom_left: Point,
    },
    /// Unlabelled points in engine order
    Points(Vec<Point>),
    /// No position reported
    Missing,
}

/// Canonical four corners, or an empty list
pub fn corner_points(geometry: &EngineGeometry) -> Vec<Point> {
    match geometry {
        EngineGeometry::NamedCorners {
            top_left,
            top_right,
            bottom_right,
            bottom_left,
        } => vec![*top_left, *top_right, *bottom_right, *bottom_left],
        EngineGeometry::Points(points) => match points.as_slice() {
            [a, b, c, d, ..] => vec![*a, *b, *c, *d],
            [bottom_left, top_left, top_right] => {
                let bottom_right = Point::new(
                    top_right.x + bottom_left.x - top_left.x,
                    top_right.y + bottom_left.y - top_left.y,
                );
                vec![*top_left, *top_right, bottom_right, *bottom_left]
            }
            [start, end] => vec![*start, *end, *end, *start],
            [only] => vec![*only; 4],
            [] => Vec::new(),
        },
        EngineGeometry::Missing => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_corners_keep_order() {
        let geometry = EngineGeometry::NamedCorners {
            top_left: Point::new(0.0, 0.0),
            top_right: Point::new(10.0, 0.0),
            bottom_right: Point::new(10.0, 10.0),
            bottom_left: Point::new(0.0, 10.0),
        };
        let corners = corner_points(&geometry);
        assert_eq!(corners[2], Point::new(10.0, 10.0));
        assert_eq!(corners[3], Point::new(0.0, 10.0));
    }

    #[test]
    fn test_three_points_complete_parallelogram() {
        let geometry = EngineGeometry::Points(vec![
            Point::new(10.0, 50.0),
            Point::new(10.0, 10.0),
            Point::new(50.0, 10.0),
        ]);
        let corners = corner_points(&geometry);
        assert_eq!(
            corners,
            vec![
                Point::new(10.0, 10.0),
                Point::new(50.0, 10.0),
                Point::new(50.0, 50.0),
                Point::new(10.0, 50.0),
            ]
        );
    }

    #[test]
    fn test_extra_points_are_dropped() {
        let points: Vec<Point> = (0..6).map(|i| Point::new(i as f32, 0.0)).collect();
        let corners = corner_points(&EngineGeometry::Points(points));
        assert_eq!(corners.len(), 4);
        assert_eq!(corners[3], Point::new(3.0, 0.0));
    }

    #[test]
    fn test_scan_line_and_single_point() {
        let line = corner_points(&EngineGeometry::Points(vec![
            Point::new(5.0, 20.0),
            Point::new(95.0, 20.0),
        ]));
        assert_eq!(line.len(), 4);
        assert_eq!(line[1], Point::new(95.0, 20.0));

        let single = corner_points(&EngineGeometry::Points(vec![Point::new(1.0, 2.0)]));
        assert!(single.iter().all(|p| *p == Point::new(1.0, 2.0)));
    }

    #[test]
    fn test_missing_geometry_is_empty() {
        assert!(corner_points(&EngineGeometry::Missing).is_empty());
        assert!(corner_points(&EngineGeometry::Points(Vec::new())).is_empty());
    }
}
