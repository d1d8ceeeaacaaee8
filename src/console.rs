//! Text rendering of the overlay and sidebar.
//!
//! Every render reads the overlay snapshot and the current display geometry
//! fresh, so detections follow the viewport when it is resized between
//! frames. Boxes that cannot be projected (geometry not yet known, or a
//! degenerate viewport) are skipped for that render and come back on the
//! next one.

use crate::detect::{Detection, Severity};
use crate::overlay::geometry::{self, DisplayGeometry};
use crate::overlay::state::OverlaySnapshot;

fn severity_tag(conf: f32) -> &'static str {
    match Severity::for_confidence(conf) {
        Severity::Critical => "CRIT",
        Severity::Elevated => "ELEV",
        Severity::Low => "low ",
    }
}

/// Overlay boxes projected into the display viewport, one line per box.
pub fn render_overlay(snapshot: &OverlaySnapshot, rendered: DisplayGeometry) -> String {
    let Some(native) = snapshot.native else {
        return String::new();
    };
    let mut out = String::new();
    for det in &snapshot.detections {
        let Some(rb) = geometry::project(det.bbox_xywh, native, rendered) else {
            continue;
        };
        out.push_str(&format!(
            "[{}] {} {:.0}% box ({:.1}, {:.1}) {:.1}x{:.1}\n",
            severity_tag(det.conf),
            det.cls,
            det.conf * 100.0,
            rb.left,
            rb.top,
            rb.width,
            rb.height,
        ));
    }
    out
}

/// Sidebar listing: class, confidence percent, and raw source-frame box.
pub fn render_sidebar(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return "no objects above threshold\n".to_string();
    }
    let mut out = String::new();
    for (idx, det) in detections.iter().enumerate() {
        let [x, y, w, h] = det.bbox_xywh;
        out.push_str(&format!(
            "{:>2}. {:<16} {:>5.1}%  [{:.0}, {:.0}, {:.0}, {:.0}]\n",
            idx + 1,
            det.cls,
            det.conf * 100.0,
            x,
            y,
            w,
            h,
        ));
    }
    out
}

/// One-line status: object count plus whether detection is active.
pub fn render_stats(snapshot: &OverlaySnapshot) -> String {
    let activity = if snapshot.is_active() {
        "Detecting"
    } else {
        "Inactive"
    };
    let model = snapshot.model.as_deref().unwrap_or("-");
    format!(
        "objects: {}  status: {}  model: {}",
        snapshot.detection_count(),
        activity,
        model,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::geometry::SourceGeometry;
    use crate::overlay::state::OverlayCell;

    fn detection(cls: &str, conf: f32, bbox: [f32; 4]) -> Detection {
        Detection {
            cls: cls.to_string(),
            conf,
            bbox_xywh: bbox,
        }
    }

    fn snapshot_with(detections: Vec<Detection>, native: SourceGeometry) -> OverlaySnapshot {
        let cell = OverlayCell::new();
        cell.apply(1, detections, native, "best.pt".to_string());
        cell.set_recording(true);
        cell.snapshot()
    }

    #[test]
    fn overlay_projects_into_display_space() {
        let snap = snapshot_with(
            vec![detection("bolt", 0.92, [100.0, 100.0, 50.0, 50.0])],
            SourceGeometry {
                width: 1280,
                height: 720,
            },
        );
        let out = render_overlay(
            &snap,
            DisplayGeometry {
                width: 640.0,
                height: 360.0,
            },
        );
        assert!(out.contains("bolt"), "{out}");
        assert!(out.contains("(50.0, 50.0) 25.0x25.0"), "{out}");
        assert!(out.contains("[CRIT]"), "{out}");
    }

    #[test]
    fn unusable_geometry_skips_boxes_for_this_render() {
        let snap = snapshot_with(
            vec![detection("bolt", 0.8, [10.0, 10.0, 5.0, 5.0])],
            SourceGeometry {
                width: 1280,
                height: 720,
            },
        );
        let out = render_overlay(
            &snap,
            DisplayGeometry {
                width: 0.0,
                height: 0.0,
            },
        );
        assert!(out.is_empty());
    }

    #[test]
    fn sidebar_shows_raw_source_coordinates() {
        let out = render_sidebar(&[
            detection("bolt", 0.92, [100.0, 100.0, 50.0, 50.0]),
            detection("metal_fragment", 0.78, [10.0, 20.0, 30.0, 40.0]),
        ]);
        assert!(out.contains("bolt"));
        assert!(out.contains("92.0%"));
        assert!(out.contains("[100, 100, 50, 50]"));
        assert!(out.contains("metal_fragment"));
    }

    #[test]
    fn empty_sidebar_has_placeholder() {
        assert_eq!(render_sidebar(&[]), "no objects above threshold\n");
    }

    #[test]
    fn stats_reflect_recording_state() {
        let snap = snapshot_with(
            vec![detection("bolt", 0.9, [1.0, 1.0, 1.0, 1.0])],
            SourceGeometry {
                width: 640,
                height: 480,
            },
        );
        let line = render_stats(&snap);
        assert!(line.contains("objects: 1"));
        assert!(line.contains("Detecting"));
        assert!(line.contains("best.pt"));

        let idle = OverlayCell::new().snapshot();
        assert!(render_stats(&idle).contains("Inactive"));
        assert!(render_stats(&idle).contains("objects: 0"));
    }

    #[test]
    fn severity_tiers() {
        assert_eq!(severity_tag(0.95), "CRIT");
        assert_eq!(severity_tag(0.90), "CRIT");
        assert_eq!(severity_tag(0.80), "ELEV");
        assert_eq!(severity_tag(0.75), "ELEV");
        assert_eq!(severity_tag(0.60), "low ");
    }
}
