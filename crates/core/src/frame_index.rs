//! Read-only frame → detections index built from a full per-camera
//! detection listing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::detection::Detection;
use crate::types::FrameIndex;

/// Detections grouped by `frame_id`, in listing order within each frame.
#[derive(Debug, Clone, Default)]
pub struct FrameDetectionIndex {
    by_frame: HashMap<FrameIndex, Arc<[Detection]>>,
    detection_count: usize,
}

impl FrameDetectionIndex {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Group `detections` by frame id.
    pub fn build(detections: impl IntoIterator<Item = Detection>) -> Self {
        let mut grouped: HashMap<FrameIndex, Vec<Detection>> = HashMap::new();
        let mut detection_count = 0;
        for detection in detections {
            detection_count += 1;
            grouped.entry(detection.frame_id).or_default().push(detection);
        }

        Self {
            by_frame: grouped
                .into_iter()
                .map(|(frame, list)| (frame, Arc::from(list)))
                .collect(),
            detection_count,
        }
    }

    /// Detections recorded for `frame`, if any.
    pub fn get(&self, frame: FrameIndex) -> Option<&Arc<[Detection]>> {
        self.by_frame.get(&frame)
    }

    /// Number of distinct frames with at least one detection.
    pub fn frame_count(&self) -> usize {
        self.by_frame.len()
    }

    pub fn detection_count(&self) -> usize {
        self.detection_count
    }

    pub fn is_empty(&self) -> bool {
        self.by_frame.is_empty()
    }
}
