//! Operator confidence filter.

use crate::detect::result::{Detection, DetectionBatch};

/// Reduce a batch to the detections at or above the operator threshold.
///
/// `threshold_pct` is the operator-facing percentage in `[0, 100]`; it maps
/// to the service's `[0, 1]` confidence scale by dividing by 100. Pure and
/// order-preserving; the batch is consumed, nothing else of it is retained.
pub fn apply(batch: DetectionBatch, threshold_pct: u8) -> Vec<Detection> {
    let cutoff = f32::from(threshold_pct.min(100)) / 100.0;
    batch
        .detections
        .into_iter()
        .filter(|det| det.conf >= cutoff)
        .collect()
}
