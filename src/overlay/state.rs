//! The single source of truth for current detections.
//!
//! One writer (the dispatch path), many read-only consumers (box overlay,
//! event sidebar, statistics). Every accepted batch replaces the detection
//! list wholesale; consumers derive their counts from the same snapshot so
//! nothing can drift.

use std::sync::Mutex;

use crate::detect::result::Detection;
use crate::overlay::geometry::SourceGeometry;

/// A point-in-time copy of the overlay state for rendering.
#[derive(Clone, Debug, Default)]
pub struct OverlaySnapshot {
    /// Filtered detections in source-frame pixel space. Projection into
    /// display space happens at render time with fresh geometry.
    pub detections: Vec<Detection>,
    /// Native geometry the detections were produced against.
    pub native: Option<SourceGeometry>,
    /// Whether the session is currently streaming/detecting.
    pub recording: bool,
    /// Sequence number of the last applied batch.
    pub last_seq: u64,
    /// Model id reported with the last applied batch.
    pub model: Option<String>,
}

impl OverlaySnapshot {
    /// Derived projection: the "current detections" statistic.
    pub fn detection_count(&self) -> usize {
        self.detections.len()
    }

    /// Derived projection: the "active status" statistic.
    pub fn is_active(&self) -> bool {
        self.recording
    }
}

/// Shared overlay cell. Responses are applied latest-tick-wins: a batch is
/// accepted only if its capture-time sequence number is newer than the last
/// applied one, so a slow early request can never overwrite fresher results.
pub struct OverlayCell {
    inner: Mutex<OverlaySnapshot>,
}

impl OverlayCell {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(OverlaySnapshot::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, OverlaySnapshot> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Apply a filtered batch captured at sequence `seq`.
    ///
    /// Returns `false` (and changes nothing) when the batch is stale.
    pub fn apply(
        &self,
        seq: u64,
        detections: Vec<Detection>,
        native: SourceGeometry,
        model: String,
    ) -> bool {
        let mut state = self.state();
        if seq <= state.last_seq {
            return false;
        }
        state.detections = detections;
        state.native = Some(native);
        state.last_seq = seq;
        state.model = Some(model);
        true
    }

    pub fn set_recording(&self, recording: bool) {
        self.state().recording = recording;
    }

    pub fn snapshot(&self) -> OverlaySnapshot {
        self.state().clone()
    }
}

impl Default for OverlayCell {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE: SourceGeometry = SourceGeometry {
        width: 1280,
        height: 720,
    };

    fn det(cls: &str, conf: f32) -> Detection {
        Detection {
            cls: cls.to_string(),
            conf,
            bbox_xywh: [0.0, 0.0, 10.0, 10.0],
        }
    }

    #[test]
    fn batches_replace_wholesale() {
        let cell = OverlayCell::new();
        assert!(cell.apply(1, vec![det("bolt", 0.9), det("wrench", 0.8)], NATIVE, "m".into()));
        assert!(cell.apply(2, vec![det("nut", 0.95)], NATIVE, "m".into()));
        let snap = cell.snapshot();
        assert_eq!(snap.detection_count(), 1);
        assert_eq!(snap.detections[0].cls, "nut");
        assert_eq!(snap.last_seq, 2);
    }

    #[test]
    fn stale_sequence_is_discarded() {
        let cell = OverlayCell::new();
        assert!(cell.apply(5, vec![det("bolt", 0.9)], NATIVE, "m".into()));
        // A slower, earlier request resolving late.
        assert!(!cell.apply(3, vec![det("ghost", 0.99)], NATIVE, "m".into()));
        let snap = cell.snapshot();
        assert_eq!(snap.detections[0].cls, "bolt");
        assert_eq!(snap.last_seq, 5);
    }

    #[test]
    fn equal_sequence_is_discarded() {
        let cell = OverlayCell::new();
        assert!(cell.apply(1, vec![], NATIVE, "m".into()));
        assert!(!cell.apply(1, vec![det("dup", 0.9)], NATIVE, "m".into()));
    }

    #[test]
    fn stats_derive_from_state() {
        let cell = OverlayCell::new();
        cell.set_recording(true);
        cell.apply(1, vec![det("bolt", 0.9)], NATIVE, "m".into());
        let snap = cell.snapshot();
        assert_eq!(snap.detection_count(), 1);
        assert!(snap.is_active());

        cell.set_recording(false);
        // Detections are stale-but-valid after stop; only the status flips.
        let snap = cell.snapshot();
        assert_eq!(snap.detection_count(), 1);
        assert!(!snap.is_active());
    }
}
