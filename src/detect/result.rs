use serde::{Deserialize, Serialize};

/// One classified bounding box from the inference service.
///
/// `bbox_xywh` is `[x, y, width, height]` in source-frame pixel coordinates.
/// Detections are immutable once received; a new batch always replaces the
/// previous set, never patches it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub cls: String,
    pub conf: f32,
    pub bbox_xywh: [f32; 4],
}

/// The full detection set returned for one submitted frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DetectionBatch {
    /// Server-side timestamp for the inference run.
    pub ts: String,
    /// Model identifier reported by the service.
    pub model: String,
    /// Effective inference throughput reported by the service.
    pub fps: f32,
    /// May be empty; an empty batch is a valid "nothing detected" answer.
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Operator-facing severity tiers for a confidence score.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Low,
    Elevated,
    Critical,
}

impl Severity {
    pub fn for_confidence(conf: f32) -> Self {
        if conf >= 0.9 {
            Severity::Critical
        } else if conf >= 0.75 {
            Severity::Elevated
        } else {
            Severity::Low
        }
    }
}
