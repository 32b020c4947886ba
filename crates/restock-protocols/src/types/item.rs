//! Detector output types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Bounding box of one detection, in image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// A single object recognized by the vision detector.
///
/// The detector is an external collaborator; this type is the contract at
/// its boundary. Everything downstream works on per-class tallies produced
/// by [`tally_detections`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectedItem {
    /// Stable class key, e.g. `milk` or `water_bottle`.
    pub class_id: String,
    /// Human-readable label for UI surfaces.
    pub display_name: String,
    /// How many units this detection represents (usually 1).
    pub count: u32,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<Rect>,
    /// (width, height) of the source image, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_dims: Option<(u32, u32)>,
}

impl DetectedItem {
    pub fn new(class_id: impl Into<String>, count: u32, confidence: f32) -> Self {
        let class_id = class_id.into();
        let display_name = class_id.replace('_', " ");
        Self {
            class_id,
            display_name,
            count,
            confidence,
            bounding_box: None,
            image_dims: None,
        }
    }
}

/// Sums detection counts per class key, dropping entries whose confidence
/// falls below `threshold`.
///
/// Confidence filtering happens here, at the detector boundary, so the
/// resolver only ever sees settled counts.
pub fn tally_detections(items: &[DetectedItem], threshold: f32) -> BTreeMap<String, u32> {
    let mut tally = BTreeMap::new();
    for item in items {
        if item.confidence < threshold {
            continue;
        }
        *tally.entry(item.class_id.clone()).or_insert(0) += item.count;
    }
    tally
}

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;
