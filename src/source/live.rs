//! Live camera source.
//!
//! Supports HTTP cameras that stream MJPEG or serve single JPEG snapshots,
//! plus a `stub://` synthetic camera. The source decimates to its target
//! frame rate; the capture loop above it just pulls frames as they come.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use url::Url;

use crate::frame::CapturedFrame;
use crate::session::StreamConstraints;
use crate::source::SourceError;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

/// Configuration for the live camera feed.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Camera URL. Supported schemes: http(s):// for MJPEG/JPEG, stub:// for
    /// a synthetic feed.
    pub url: String,
    /// Operator-facing camera identifier (e.g. "RWY-01L-CAM-01").
    pub camera_id: String,
    /// Target frame rate; the source decimates to this.
    pub target_fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "stub://rwy-01l-cam-01".to_string(),
            camera_id: "RWY-01L-CAM-01".to_string(),
            target_fps: 10,
        }
    }
}

/// Live camera frame source.
pub struct LiveSource {
    backend: LiveBackend,
}

impl std::fmt::Debug for LiveSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            LiveBackend::Http(_) => "Http",
            LiveBackend::Stub(_) => "Stub",
        };
        f.debug_struct("LiveSource").field("backend", &backend).finish()
    }
}

enum LiveBackend {
    Http(HttpCameraSource),
    Stub(StubCameraSource),
}

impl LiveSource {
    pub fn new(config: CameraConfig, constraints: &StreamConstraints) -> Result<Self, SourceError> {
        if config.url.starts_with("stub://") {
            return Ok(Self {
                backend: LiveBackend::Stub(StubCameraSource::new(config, constraints)),
            });
        }
        let url = Url::parse(&config.url)
            .map_err(|e| SourceError::DeviceUnavailable(format!("bad camera url: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(Self {
                backend: LiveBackend::Http(HttpCameraSource::new(config)),
            }),
            other => Err(SourceError::DeviceUnavailable(format!(
                "unsupported camera scheme '{other}'; expected http(s) or stub"
            ))),
        }
    }

    /// Open the stream. Maps refusals to the acquisition error taxonomy.
    pub fn connect(&mut self) -> Result<(), SourceError> {
        match &mut self.backend {
            LiveBackend::Http(source) => source.connect(),
            LiveBackend::Stub(source) => source.connect(),
        }
    }

    /// Capture the next frame. Blocks until one is available.
    pub fn next_frame(&mut self) -> Result<CapturedFrame> {
        match &mut self.backend {
            LiveBackend::Http(source) => source.next_frame(),
            LiveBackend::Stub(source) => source.next_frame(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        match &self.backend {
            LiveBackend::Http(source) => source.is_healthy(),
            LiveBackend::Stub(_) => true,
        }
    }

    pub fn stats(&self) -> LiveStats {
        match &self.backend {
            LiveBackend::Http(source) => source.stats(),
            LiveBackend::Stub(source) => source.stats(),
        }
    }
}

/// Statistics for a live source.
#[derive(Clone, Debug)]
pub struct LiveStats {
    pub frames_captured: u64,
    pub url: String,
}

// ----------------------------------------------------------------------------
// HTTP camera (MJPEG stream or single-JPEG snapshot)
// ----------------------------------------------------------------------------

struct HttpCameraSource {
    config: CameraConfig,
    agent: ureq::Agent,
    stream: Option<HttpStream>,
    last_frame_at: Option<Instant>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    SingleJpeg,
}

impl HttpCameraSource {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            agent: ureq::AgentBuilder::new()
                .timeout_connect(Duration::from_secs(5))
                .build(),
            stream: None,
            last_frame_at: None,
            connected_at: None,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        let response = self
            .agent
            .get(&self.config.url)
            .call()
            .map_err(classify_acquire_error)?;
        let content_type = response.header("Content-Type").unwrap_or("");
        if content_type.to_lowercase().contains("multipart") {
            let reader = response.into_reader();
            self.stream = Some(HttpStream::Mjpeg(MjpegStream::new(reader)));
        } else {
            self.stream = Some(HttpStream::SingleJpeg);
        }
        self.connected_at = Some(Instant::now());
        log::info!(
            "camera {} connected ({})",
            self.config.camera_id,
            self.config.url
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("camera source not connected; call connect() first"))?;
        let min_interval = frame_interval(self.config.target_fps);
        loop {
            let jpeg_bytes = match stream {
                HttpStream::Mjpeg(stream) => stream.read_next_jpeg(),
                HttpStream::SingleJpeg => fetch_single_jpeg(&self.agent, &self.config.url),
            }?;

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }

            let frame = CapturedFrame::from_encoded(&jpeg_bytes)?;
            self.frame_count += 1;
            self.last_frame_at = Some(now);
            return Ok(frame);
        }
    }

    fn is_healthy(&self) -> bool {
        let Some(connected_at) = self.connected_at else {
            return false;
        };
        let Some(last_frame_at) = self.last_frame_at else {
            return connected_at.elapsed() <= Duration::from_secs(5);
        };
        last_frame_at.elapsed() <= health_grace(self.config.target_fps)
    }

    fn stats(&self) -> LiveStats {
        LiveStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn classify_acquire_error(err: ureq::Error) -> SourceError {
    match err {
        ureq::Error::Status(401, _) | ureq::Error::Status(403, _) => {
            SourceError::PermissionDenied("camera stream rejected credentials".to_string())
        }
        ureq::Error::Status(code, _) => {
            SourceError::DeviceUnavailable(format!("camera stream returned status {code}"))
        }
        ureq::Error::Transport(transport) => {
            SourceError::DeviceUnavailable(transport.to_string())
        }
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = find_jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            if self.buffer.len() > MAX_JPEG_BYTES * 2 {
                let keep = 2.min(self.buffer.len());
                let drain_len = self.buffer.len() - keep;
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn fetch_single_jpeg(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
    let response = agent
        .get(url)
        .call()
        .with_context(|| format!("fetch jpeg snapshot from {url}"))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read jpeg snapshot")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty jpeg snapshot"));
    }
    Ok(bytes)
}

fn find_jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer
        .windows(2)
        .position(|w| w == [0xFF, 0xD8])?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == [0xFF, 0xD9])
        .map(|i| start + 2 + i + 2)?;
    Some((start, end))
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct StubCameraSource {
    config: CameraConfig,
    width: u32,
    height: u32,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

impl StubCameraSource {
    fn new(config: CameraConfig, constraints: &StreamConstraints) -> Self {
        Self {
            config,
            width: constraints.ideal_width,
            height: constraints.ideal_height,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    fn connect(&mut self) -> Result<(), SourceError> {
        log::info!(
            "camera {} connected ({}, synthetic {}x{})",
            self.config.camera_id,
            self.config.url,
            self.width,
            self.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<CapturedFrame> {
        // Pace to the target rate so the capture loop behaves like a real
        // camera would.
        let min_interval = frame_interval(self.config.target_fps);
        if let Some(last) = self.last_frame_at {
            let elapsed = last.elapsed();
            if elapsed < min_interval {
                std::thread::sleep(min_interval - elapsed);
            }
        }
        self.last_frame_at = Some(Instant::now());
        self.frame_count += 1;

        let mut pixels = vec![32u8; (self.width * self.height * 3) as usize];
        // A bright square drifting across the frame, so consecutive frames
        // differ and demos show moving overlay boxes.
        let size = (self.width / 16).max(1);
        let x0 = (self.frame_count * 7) as u32 % self.width.saturating_sub(size).max(1);
        let y0 = (self.frame_count * 3) as u32 % self.height.saturating_sub(size).max(1);
        for y in y0..(y0 + size).min(self.height) {
            for x in x0..(x0 + size).min(self.width) {
                let idx = ((y * self.width + x) * 3) as usize;
                pixels[idx] = 220;
                pixels[idx + 1] = 220;
                pixels[idx + 2] = 80;
            }
        }
        CapturedFrame::new(pixels, self.width, self.height)
    }

    fn stats(&self) -> LiveStats {
        LiveStats {
            frames_captured: self.frame_count,
            url: self.config.url.clone(),
        }
    }
}

fn frame_interval(target_fps: u32) -> Duration {
    if target_fps == 0 {
        Duration::from_millis(0)
    } else {
        Duration::from_millis((1000 / target_fps).max(1) as u64)
    }
}

fn health_grace(target_fps: u32) -> Duration {
    let base_ms = if target_fps == 0 {
        2_000
    } else {
        (1000 / target_fps).saturating_mul(6)
    };
    Duration::from_millis(base_ms.max(2_000) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraints() -> StreamConstraints {
        StreamConstraints {
            ideal_width: 64,
            ideal_height: 48,
            audio: false,
        }
    }

    #[test]
    fn stub_camera_produces_frames_at_ideal_size() {
        let config = CameraConfig {
            url: "stub://cam".to_string(),
            target_fps: 0,
            ..CameraConfig::default()
        };
        let mut source = LiveSource::new(config, &constraints()).unwrap();
        source.connect().unwrap();
        let frame = source.next_frame().unwrap();
        assert_eq!(frame.width, 64);
        assert_eq!(frame.height, 48);
        assert_eq!(source.stats().frames_captured, 1);
    }

    #[test]
    fn rejects_unsupported_scheme() {
        let config = CameraConfig {
            url: "rtsp://cam".to_string(),
            ..CameraConfig::default()
        };
        let err = LiveSource::new(config, &constraints()).unwrap_err();
        assert!(matches!(err, SourceError::DeviceUnavailable(_)));
    }

    #[test]
    fn finds_jpeg_bounds_in_stream_buffer() {
        let mut buffer = vec![0x00, 0x11];
        buffer.extend_from_slice(&[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
        buffer.extend_from_slice(&[0x22]);
        let (start, end) = find_jpeg_bounds(&buffer).unwrap();
        assert_eq!(&buffer[start..end], &[0xFF, 0xD8, 0xAA, 0xBB, 0xFF, 0xD9]);
    }

    #[test]
    fn incomplete_jpeg_has_no_bounds() {
        assert!(find_jpeg_bounds(&[0xFF, 0xD8, 0xAA]).is_none());
    }
}
