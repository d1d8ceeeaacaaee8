//! Source-frame to display-space coordinate mapping.
//!
//! Detections arrive in the native pixel space of the captured frame; the
//! console draws them on a surface rendered at some other size. The mapping
//! is recomputed on every render because the rendered size changes with
//! layout, never cached.

/// Native resolution of the capture source, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceGeometry {
    pub width: u32,
    pub height: u32,
}

/// Rendered size of the display surface, in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayGeometry {
    pub width: f32,
    pub height: f32,
}

/// A bounding box positioned in rendered display space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderedBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Project a source-frame `[x, y, w, h]` box into rendered display space.
///
/// Returns `None` when either geometry is unusable (zero or negative
/// dimensions); the caller skips drawing that detection for this render.
pub fn project(
    bbox_xywh: [f32; 4],
    native: SourceGeometry,
    rendered: DisplayGeometry,
) -> Option<RenderedBox> {
    if native.width == 0 || native.height == 0 {
        return None;
    }
    if rendered.width <= 0.0 || rendered.height <= 0.0 {
        return None;
    }
    let scale_x = native.width as f32 / rendered.width;
    let scale_y = native.height as f32 / rendered.height;
    let [x, y, w, h] = bbox_xywh;
    Some(RenderedBox {
        left: x / scale_x,
        top: y / scale_y,
        width: w / scale_x,
        height: h / scale_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NATIVE: SourceGeometry = SourceGeometry {
        width: 1280,
        height: 720,
    };

    #[test]
    fn half_scale_projection() {
        let rendered = DisplayGeometry {
            width: 640.0,
            height: 360.0,
        };
        let out = project([100.0, 100.0, 50.0, 50.0], NATIVE, rendered).unwrap();
        assert_eq!(out.left, 50.0);
        assert_eq!(out.top, 50.0);
        assert_eq!(out.width, 25.0);
        assert_eq!(out.height, 25.0);
    }

    #[test]
    fn identity_when_rendered_matches_native() {
        let rendered = DisplayGeometry {
            width: 1280.0,
            height: 720.0,
        };
        let out = project([12.0, 34.0, 56.0, 78.0], NATIVE, rendered).unwrap();
        assert_eq!(out.left, 12.0);
        assert_eq!(out.top, 34.0);
    }

    #[test]
    fn projection_is_pure() {
        let rendered = DisplayGeometry {
            width: 640.0,
            height: 360.0,
        };
        let a = project([100.0, 100.0, 50.0, 50.0], NATIVE, rendered);
        let b = project([100.0, 100.0, 50.0, 50.0], NATIVE, rendered);
        assert_eq!(a, b);
    }

    #[test]
    fn unusable_geometry_is_skipped() {
        let rendered = DisplayGeometry {
            width: 640.0,
            height: 360.0,
        };
        let no_native = SourceGeometry {
            width: 0,
            height: 720,
        };
        assert!(project([1.0, 1.0, 1.0, 1.0], no_native, rendered).is_none());

        let no_rendered = DisplayGeometry {
            width: 0.0,
            height: 360.0,
        };
        assert!(project([1.0, 1.0, 1.0, 1.0], NATIVE, no_rendered).is_none());
    }
}
