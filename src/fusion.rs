//! Cross-pass result fusion
//!
//! Two detections are the same symbol when their payloads match and their
//! boxes overlap with IoU above the threshold. The larger box survives.

use crate::models::DetectedBarcode;

/// IoU above which equal payloads are treated as one symbol
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.3;

/// Whether `a` and `b` describe the same symbol
pub fn is_duplicate(a: &DetectedBarcode, b: &DetectedBarcode, iou_threshold: f32) -> bool {
    a.raw_value == b.raw_value && a.bounding_box.iou(&b.bounding_box) > iou_threshold
}

/// Collapse duplicates with the default threshold
pub fn dedupe(detections: Vec<DetectedBarcode>) -> Vec<DetectedBarcode> {
    dedupe_with_threshold(detections, DEFAULT_IOU_THRESHOLD)
}

/// Collapse duplicates, keeping the larger box of every duplicate pair
///
/// Candidates are visited largest box first (ties keep input order), so a
/// kept detection is never displaced later and no two survivors are
/// duplicates of each other; running this on its own output changes
/// nothing. Survivors come back in input order.
pub fn dedupe_with_threshold(
    detections: Vec<DetectedBarcode>,
    iou_threshold: f32,
) -> Vec<DetectedBarcode> {
    if detections.len() < 2 {
        return detections;
    }

    let mut order: Vec<usize> = (0..detections.len()).collect();
    order.sort_by(|&a, &b| {
        detections[b]
            .bounding_box
            .area()
            .total_cmp(&detections[a].bounding_box.area())
    });

    let mut kept: Vec<usize> = Vec::with_capacity(detections.len());
    for idx in order {
        let candidate = &detections[idx];
        let duplicate = kept
            .iter()
            .any(|&k| is_duplicate(&detections[k], candidate, iou_threshold));
        if !duplicate {
            kept.push(idx);
        }
    }
    kept.sort_unstable();

    let mut slots: Vec<Option<DetectedBarcode>> = detections.into_iter().map(Some).collect();
    kept.into_iter().filter_map(|i| slots[i].take()).collect()
}
