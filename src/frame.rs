//! Captured frames and the shared video surface.
//!
//! `VideoSurface` is the hand-off point between the capture loop and the
//! frame sampler. The capture loop publishes decoded frames as fast as the
//! source produces them; the sampler reads the most recent frame on its own
//! fixed cadence. The two sides never wait on each other.

use anyhow::{anyhow, Context, Result};
use std::sync::Mutex;

use crate::overlay::geometry::{DisplayGeometry, SourceGeometry};

/// One decoded video frame in native capture resolution, RGB8.
#[derive(Clone)]
pub struct CapturedFrame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl CapturedFrame {
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(anyhow!(
                "frame buffer size {} does not match {}x{} rgb8",
                pixels.len(),
                width,
                height
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// Decode a JPEG (or any format the build supports) into a frame.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes).context("decode frame image")?;
        let rgb = decoded.into_rgb8();
        let (width, height) = rgb.dimensions();
        Self::new(rgb.into_raw(), width, height)
    }

    /// Encode as JPEG at the given quality (1-100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(
                &self.pixels,
                self.width,
                self.height,
                image::ExtendedColorType::Rgb8,
            )
            .context("encode frame as jpeg")?;
        Ok(out)
    }

    pub fn geometry(&self) -> SourceGeometry {
        SourceGeometry {
            width: self.width,
            height: self.height,
        }
    }
}

/// An encoded still image sampled from the surface, tagged with the native
/// geometry it was captured at.
pub struct EncodedSample {
    pub jpeg: Vec<u8>,
    pub native: SourceGeometry,
}

/// The live video surface: latest frame plus the rendered display geometry.
///
/// Single-writer on the frame side (the capture loop); the rendered geometry
/// is owned by whoever lays out the display and may change at any time, so
/// readers always fetch it fresh.
pub struct VideoSurface {
    inner: Mutex<SurfaceState>,
}

#[derive(Default)]
struct SurfaceState {
    latest: Option<CapturedFrame>,
    rendered: Option<DisplayGeometry>,
}

impl VideoSurface {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SurfaceState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SurfaceState> {
        // A poisoned lock only means a panicking thread died mid-update;
        // the frame cell itself is always in a usable state.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Publish the most recent frame. Replaces the previous one.
    pub fn publish(&self, frame: CapturedFrame) {
        self.state().latest = Some(frame);
    }

    /// Drop the current frame, e.g. when the stream is released.
    pub fn clear(&self) {
        let mut state = self.state();
        state.latest = None;
    }

    pub fn set_rendered(&self, geometry: DisplayGeometry) {
        self.state().rendered = Some(geometry);
    }

    pub fn rendered(&self) -> Option<DisplayGeometry> {
        self.state().rendered
    }

    /// Native geometry of the current frame, if one is present.
    pub fn native(&self) -> Option<SourceGeometry> {
        self.state().latest.as_ref().map(|f| f.geometry())
    }

    /// Sample the current frame as an encoded JPEG.
    ///
    /// Returns `Ok(None)` when there is no frame yet or the frame has zero
    /// dimensions (surface not ready) - callers skip that tick silently.
    pub fn sample_jpeg(&self, quality: u8) -> Result<Option<EncodedSample>> {
        let frame = {
            let state = self.state();
            match &state.latest {
                Some(frame) if frame.width > 0 && frame.height > 0 => frame.clone(),
                _ => return Ok(None),
            }
        };
        let native = frame.geometry();
        let jpeg = frame.encode_jpeg(quality)?;
        Ok(Some(EncodedSample { jpeg, native }))
    }
}

impl Default for VideoSurface {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32) -> CapturedFrame {
        let pixels = vec![128u8; (width * height * 3) as usize];
        CapturedFrame::new(pixels, width, height).unwrap()
    }

    #[test]
    fn rejects_mismatched_buffer() {
        assert!(CapturedFrame::new(vec![0u8; 10], 4, 4).is_err());
    }

    #[test]
    fn jpeg_roundtrip_preserves_dimensions() {
        let frame = solid_frame(64, 48);
        let jpeg = frame.encode_jpeg(70).unwrap();
        let decoded = CapturedFrame::from_encoded(&jpeg).unwrap();
        assert_eq!(decoded.width, 64);
        assert_eq!(decoded.height, 48);
    }

    #[test]
    fn empty_surface_yields_no_sample() {
        let surface = VideoSurface::new();
        assert!(surface.sample_jpeg(70).unwrap().is_none());
    }

    #[test]
    fn publish_then_sample() {
        let surface = VideoSurface::new();
        surface.publish(solid_frame(32, 32));
        let sample = surface.sample_jpeg(70).unwrap().expect("sample");
        assert_eq!(sample.native.width, 32);
        assert!(!sample.jpeg.is_empty());
    }

    #[test]
    fn clear_removes_frame() {
        let surface = VideoSurface::new();
        surface.publish(solid_frame(32, 32));
        surface.clear();
        assert!(surface.sample_jpeg(70).unwrap().is_none());
        assert!(surface.native().is_none());
    }
}
