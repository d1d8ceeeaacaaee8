//! Media stream lifecycle.
//!
//! `MediaSession` owns the one live capture handle a session may hold. It
//! acquires the device when (and only when) the input mode is live and the
//! operator is streaming, and guarantees release on every exit path: stop,
//! mode change, explicit release, or drop. Leaving a camera handle open
//! after the console goes away silently blocks other consumers of the
//! device, so the acquire/release pairing is the primary invariant here.

use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::anyhow;

use crate::frame::VideoSurface;
use crate::source::{CameraConfig, LiveSource, SourceError};

/// Which input the operator selected on the input page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Image,
    Video,
    Live,
}

impl FromStr for InputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(InputMode::Image),
            "video" => Ok(InputMode::Video),
            "live" => Ok(InputMode::Live),
            other => Err(anyhow!(
                "unknown input mode '{other}'; expected image, video, or live"
            )),
        }
    }
}

/// Whether the operator has detection running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecordingState {
    Stopped,
    Streaming,
}

/// Requested capture capabilities for the live device.
#[derive(Clone, Copy, Debug)]
pub struct StreamConstraints {
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub audio: bool,
}

impl Default for StreamConstraints {
    fn default() -> Self {
        Self {
            ideal_width: 1280,
            ideal_height: 720,
            audio: false,
        }
    }
}

/// Lifecycle of the capture handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamPhase {
    Idle,
    Acquiring,
    Streaming,
    Released,
}

/// A running capture loop bound to the video surface.
///
/// The loop pulls frames from the source at the source's own pace and
/// publishes each onto the surface. Stopping is edge-triggered through an
/// atomic flag; `release` joins the thread so the device handle is closed
/// by the time it returns.
struct LiveStream {
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl LiveStream {
    fn spawn(mut source: LiveSource, surface: Arc<VideoSurface>) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let join = std::thread::spawn(move || {
            while !stop_thread.load(Ordering::SeqCst) {
                match source.next_frame() {
                    Ok(frame) => surface.publish(frame),
                    Err(err) => {
                        if stop_thread.load(Ordering::SeqCst) {
                            break;
                        }
                        log::warn!("capture loop: {err}");
                        std::thread::sleep(Duration::from_millis(500));
                    }
                }
            }
            log::debug!(
                "capture loop stopped after {} frames",
                source.stats().frames_captured
            );
        });
        Self {
            stop,
            join: Some(join),
        }
    }

    fn release(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("capture loop thread panicked");
            }
        }
    }
}

impl Drop for LiveStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns acquisition and release of the live capture device for one session.
pub struct MediaSession {
    camera: CameraConfig,
    constraints: StreamConstraints,
    surface: Arc<VideoSurface>,
    stream: Option<LiveStream>,
    phase: StreamPhase,
    feed_error: Option<String>,
    acquires: u64,
    releases: u64,
}

impl MediaSession {
    pub fn new(
        camera: CameraConfig,
        constraints: StreamConstraints,
        surface: Arc<VideoSurface>,
    ) -> Self {
        Self {
            camera,
            constraints,
            surface,
            stream: None,
            phase: StreamPhase::Idle,
            feed_error: None,
            acquires: 0,
            releases: 0,
        }
    }

    /// Reconcile the capture handle with the operator's mode and recording
    /// state. Acquires when live + streaming, releases otherwise. Idempotent.
    ///
    /// An acquisition failure is remembered and not retried; the feed stays
    /// unavailable until `reset_feed` is called.
    pub fn sync(&mut self, mode: InputMode, recording: RecordingState) -> Result<(), SourceError> {
        let want_stream = mode == InputMode::Live && recording == RecordingState::Streaming;
        match (want_stream, self.stream.is_some()) {
            (true, true) | (false, false) => Ok(()),
            (false, true) => {
                self.release_stream();
                Ok(())
            }
            (true, false) => {
                if self.feed_error.is_some() {
                    log::debug!("feed unavailable; not retrying acquisition");
                    return Ok(());
                }
                self.acquire()
            }
        }
    }

    fn acquire(&mut self) -> Result<(), SourceError> {
        self.phase = StreamPhase::Acquiring;
        let result = LiveSource::new(self.camera.clone(), &self.constraints)
            .and_then(|mut source| source.connect().map(|()| source));
        match result {
            Ok(source) => {
                self.stream = Some(LiveStream::spawn(source, self.surface.clone()));
                self.acquires += 1;
                self.phase = StreamPhase::Streaming;
                Ok(())
            }
            Err(err) => {
                self.phase = StreamPhase::Idle;
                self.feed_error = Some(err.to_string());
                log::error!("feed unavailable: {err}");
                Err(err)
            }
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.release();
            self.releases += 1;
            self.phase = StreamPhase::Released;
            self.surface.clear();
        }
    }

    /// Release the device handle unconditionally (console teardown path).
    pub fn release(&mut self) {
        self.release_stream();
    }

    /// Clear a remembered acquisition failure so the next sync may retry.
    pub fn reset_feed(&mut self) {
        self.feed_error = None;
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn feed_error(&self) -> Option<&str> {
        self.feed_error.as_deref()
    }

    /// (acquires, releases) over the session lifetime. Balanced whenever no
    /// stream is held.
    pub fn handle_stats(&self) -> (u64, u64) {
        (self.acquires, self.releases)
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.release_stream();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_session() -> MediaSession {
        let camera = CameraConfig {
            url: "stub://test-cam".to_string(),
            camera_id: "TEST-CAM".to_string(),
            target_fps: 0,
        };
        let constraints = StreamConstraints {
            ideal_width: 32,
            ideal_height: 24,
            audio: false,
        };
        MediaSession::new(camera, constraints, Arc::new(VideoSurface::new()))
    }

    #[test]
    fn acquires_only_for_live_streaming() {
        let mut session = stub_session();
        session
            .sync(InputMode::Image, RecordingState::Streaming)
            .unwrap();
        session
            .sync(InputMode::Live, RecordingState::Stopped)
            .unwrap();
        assert_eq!(session.handle_stats(), (0, 0));
        assert_eq!(session.phase(), StreamPhase::Idle);

        session
            .sync(InputMode::Live, RecordingState::Streaming)
            .unwrap();
        assert_eq!(session.phase(), StreamPhase::Streaming);
        assert_eq!(session.handle_stats(), (1, 0));
    }

    #[test]
    fn every_acquire_pairs_with_one_release() {
        let mut session = stub_session();
        for _ in 0..3 {
            session
                .sync(InputMode::Live, RecordingState::Streaming)
                .unwrap();
            // Repeated syncs while streaming must not re-acquire.
            session
                .sync(InputMode::Live, RecordingState::Streaming)
                .unwrap();
            session
                .sync(InputMode::Live, RecordingState::Stopped)
                .unwrap();
            // Repeated stops must not double-release.
            session
                .sync(InputMode::Live, RecordingState::Stopped)
                .unwrap();
        }
        assert_eq!(session.handle_stats(), (3, 3));
        assert_eq!(session.phase(), StreamPhase::Released);
    }

    #[test]
    fn mode_change_releases_the_handle() {
        let mut session = stub_session();
        session
            .sync(InputMode::Live, RecordingState::Streaming)
            .unwrap();
        session
            .sync(InputMode::Video, RecordingState::Streaming)
            .unwrap();
        assert_eq!(session.handle_stats(), (1, 1));
        assert!(!session.is_streaming());
    }

    #[test]
    fn drop_releases_the_handle() {
        let mut session = stub_session();
        session
            .sync(InputMode::Live, RecordingState::Streaming)
            .unwrap();
        assert!(session.is_streaming());
        drop(session);
        // Nothing to assert directly; the capture thread joining without a
        // hang is the property under test.
    }

    #[test]
    fn acquisition_failure_is_sticky() {
        let camera = CameraConfig {
            url: "gopher://nowhere".to_string(),
            camera_id: "BAD-CAM".to_string(),
            target_fps: 10,
        };
        let mut session = MediaSession::new(
            camera,
            StreamConstraints::default(),
            Arc::new(VideoSurface::new()),
        );
        let err = session
            .sync(InputMode::Live, RecordingState::Streaming)
            .unwrap_err();
        assert!(matches!(err, SourceError::DeviceUnavailable(_)));
        assert!(session.feed_error().is_some());

        // No automatic retry.
        session
            .sync(InputMode::Live, RecordingState::Streaming)
            .unwrap();
        assert_eq!(session.handle_stats(), (0, 0));

        session.reset_feed();
        assert!(session.feed_error().is_none());
    }

    #[test]
    fn input_mode_parses() {
        assert_eq!("live".parse::<InputMode>().unwrap(), InputMode::Live);
        assert_eq!("Image".parse::<InputMode>().unwrap(), InputMode::Image);
        assert!("webcam".parse::<InputMode>().is_err());
    }
}
