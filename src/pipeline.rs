//! The frame-sampling detection pipeline.
//!
//! A sampler thread wakes on a fixed period, encodes the surface's current
//! frame, tags it with a capture-time sequence number, and hands it to a
//! small pool of dispatch workers over a bounded channel. Workers submit
//! frames to the inference endpoint, filter the result by the operator
//! threshold, and apply it to the overlay cell.
//!
//! The sampler never waits for a dispatch to finish, so several submissions
//! can be in flight at once. Two guards keep that safe:
//! - the bounded channel caps in-flight submissions; a tick that finds it
//!   full drops that sample instead of queueing without bound
//! - responses apply latest-tick-wins through the overlay cell's sequence
//!   check, so a slow early response cannot clobber a fresher one
//!
//! Disarming flips the armed flag and joins the sampler, which closes the
//! channel; workers drain whatever is in flight and exit, and the armed
//! check discards any batch that completes after disarm.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::detect::client::InferenceClient;
use crate::detect::filter;
use crate::frame::VideoSurface;
use crate::overlay::geometry::SourceGeometry;
use crate::overlay::state::OverlayCell;

/// Tuning for the sampling loop.
#[derive(Clone, Copy, Debug)]
pub struct PipelineConfig {
    /// Fixed sampling period. Operator-invisible.
    pub sample_period: Duration,
    /// JPEG quality for the encoded sample (1-100).
    pub jpeg_quality: u8,
    /// Maximum concurrent submissions; also the dispatch pool size.
    pub max_in_flight: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_millis(100),
            jpeg_quality: 70,
            max_in_flight: 2,
        }
    }
}

/// Operator-adjustable confidence threshold, percent in [0, 100].
///
/// Read at filter time for every batch; changing it affects the next batch
/// only, never detections already on screen.
#[derive(Clone)]
pub struct ThresholdControl(Arc<AtomicU32>);

impl ThresholdControl {
    pub fn new(pct: u8) -> Self {
        Self(Arc::new(AtomicU32::new(u32::from(pct.min(100)))))
    }

    pub fn set(&self, pct: u8) {
        self.0.store(u32::from(pct.min(100)), Ordering::SeqCst);
    }

    pub fn get(&self) -> u8 {
        self.0.load(Ordering::SeqCst) as u8
    }
}

/// Pipeline counters, readable while armed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Samples handed to the dispatch pool.
    pub sampled: u64,
    /// Samples dropped because the in-flight cap was reached.
    pub dropped_full: u64,
    /// Batches applied to the overlay.
    pub applied: u64,
    /// Batches discarded as stale (older than the last applied tick).
    pub stale: u64,
    /// Submissions that failed (network, server, malformed).
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    sampled: AtomicU64,
    dropped_full: AtomicU64,
    applied: AtomicU64,
    stale: AtomicU64,
    failed: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            sampled: self.sampled.load(Ordering::SeqCst),
            dropped_full: self.dropped_full.load(Ordering::SeqCst),
            applied: self.applied.load(Ordering::SeqCst),
            stale: self.stale.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }
}

struct Sample {
    seq: u64,
    jpeg: Vec<u8>,
    native: SourceGeometry,
}

/// Handle to an armed pipeline.
pub struct SamplerHandle {
    armed: Arc<AtomicBool>,
    counters: Arc<Counters>,
    sampler: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

/// Arm the pipeline: start the sampler and the dispatch pool.
pub fn arm(
    surface: Arc<VideoSurface>,
    overlay: Arc<OverlayCell>,
    client: Arc<dyn InferenceClient>,
    threshold: ThresholdControl,
    config: PipelineConfig,
) -> SamplerHandle {
    let armed = Arc::new(AtomicBool::new(true));
    let counters = Arc::new(Counters::default());
    let pool_size = config.max_in_flight.max(1);

    let (tx, rx) = sync_channel::<Sample>(pool_size);
    let rx = Arc::new(Mutex::new(rx));

    let mut workers = Vec::with_capacity(pool_size);
    for _ in 0..pool_size {
        let rx = rx.clone();
        let client = client.clone();
        let overlay = overlay.clone();
        let threshold = threshold.clone();
        let armed = armed.clone();
        let counters = counters.clone();
        workers.push(std::thread::spawn(move || {
            run_worker(rx, client, overlay, threshold, armed, counters)
        }));
    }

    let sampler = {
        let armed = armed.clone();
        let counters = counters.clone();
        std::thread::spawn(move || {
            let mut seq = 0u64;
            while armed.load(Ordering::SeqCst) {
                match surface.sample_jpeg(config.jpeg_quality) {
                    Ok(Some(sample)) => {
                        seq += 1;
                        let sample = Sample {
                            seq,
                            jpeg: sample.jpeg,
                            native: sample.native,
                        };
                        match tx.try_send(sample) {
                            Ok(()) => {
                                counters.sampled.fetch_add(1, Ordering::SeqCst);
                            }
                            Err(TrySendError::Full(_)) => {
                                counters.dropped_full.fetch_add(1, Ordering::SeqCst);
                                log::debug!("dispatch pool full; dropping tick {seq}");
                            }
                            Err(TrySendError::Disconnected(_)) => break,
                        }
                    }
                    // Surface not ready (no frame or zero dimensions): skip
                    // this tick silently.
                    Ok(None) => {}
                    Err(err) => log::warn!("frame encode failed: {err}"),
                }
                std::thread::sleep(config.sample_period);
            }
            // tx drops here, closing the channel; workers drain and exit.
        })
    };

    SamplerHandle {
        armed,
        counters,
        sampler: Some(sampler),
        workers,
    }
}

fn run_worker(
    rx: Arc<Mutex<Receiver<Sample>>>,
    client: Arc<dyn InferenceClient>,
    overlay: Arc<OverlayCell>,
    threshold: ThresholdControl,
    armed: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    loop {
        let sample = {
            let Ok(guard) = rx.lock() else {
                break;
            };
            guard.recv()
        };
        let Ok(sample) = sample else {
            break;
        };

        match client.submit(&sample.jpeg) {
            Ok(batch) => {
                if !armed.load(Ordering::SeqCst) {
                    log::debug!("tick {} resolved after disarm; discarded", sample.seq);
                    continue;
                }
                let model = batch.model.clone();
                let kept = filter::apply(batch, threshold.get());
                if overlay.apply(sample.seq, kept, sample.native, model) {
                    counters.applied.fetch_add(1, Ordering::SeqCst);
                } else {
                    counters.stale.fetch_add(1, Ordering::SeqCst);
                    log::debug!("tick {} resolved out of order; discarded", sample.seq);
                }
            }
            Err(err) => {
                // Drop the frame; the next tick is the retry.
                counters.failed.fetch_add(1, Ordering::SeqCst);
                log::warn!("inference submit failed (tick {}): {err}", sample.seq);
            }
        }
    }
}

impl SamplerHandle {
    /// Stop sampling. Joins the sampler thread, so no tick can fire once
    /// this returns. In-flight dispatches are left to drain in the worker
    /// pool; their results are discarded by the armed check.
    pub fn disarm(&mut self) {
        self.armed.store(false, Ordering::SeqCst);
        if let Some(join) = self.sampler.take() {
            if join.join().is_err() {
                log::error!("sampler thread panicked");
            }
        }
        self.workers.clear();
    }

    pub fn is_armed(&self) -> bool {
        self.sampler.is_some()
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::client::DispatchError;
    use crate::detect::result::{Detection, DetectionBatch};
    use crate::frame::CapturedFrame;
    use std::sync::mpsc;

    fn ready_surface() -> Arc<VideoSurface> {
        let surface = Arc::new(VideoSurface::new());
        let pixels = vec![100u8; 32 * 24 * 3];
        surface.publish(CapturedFrame::new(pixels, 32, 24).unwrap());
        surface
    }

    fn batch(cls: &str, conf: f32) -> DetectionBatch {
        DetectionBatch {
            ts: "t".to_string(),
            model: "best.pt".to_string(),
            fps: 10.0,
            detections: vec![Detection {
                cls: cls.to_string(),
                conf,
                bbox_xywh: [1.0, 2.0, 3.0, 4.0],
            }],
        }
    }

    fn fast_config() -> PipelineConfig {
        PipelineConfig {
            sample_period: Duration::from_millis(10),
            jpeg_quality: 70,
            max_in_flight: 2,
        }
    }

    /// Always answers immediately with one detection.
    struct InstantClient;

    impl InferenceClient for InstantClient {
        fn submit(&self, _jpeg: &[u8]) -> Result<DetectionBatch, DispatchError> {
            Ok(batch("bolt", 0.9))
        }
    }

    /// Blocks every submit until the test releases the gate; returns an
    /// error once the gate is dropped.
    struct GatedClient {
        gate: Mutex<mpsc::Receiver<DetectionBatch>>,
        calls: AtomicU64,
    }

    impl GatedClient {
        fn new() -> (Arc<Self>, mpsc::Sender<DetectionBatch>) {
            let (tx, rx) = mpsc::channel();
            (
                Arc::new(Self {
                    gate: Mutex::new(rx),
                    calls: AtomicU64::new(0),
                }),
                tx,
            )
        }
    }

    impl InferenceClient for GatedClient {
        fn submit(&self, _jpeg: &[u8]) -> Result<DetectionBatch, DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let gate = self.gate.lock().unwrap();
            gate.recv()
                .map_err(|_| DispatchError::Network("gate closed".to_string()))
        }
    }

    /// Always fails.
    struct FailingClient;

    impl InferenceClient for FailingClient {
        fn submit(&self, _jpeg: &[u8]) -> Result<DetectionBatch, DispatchError> {
            Err(DispatchError::Network("connection refused".to_string()))
        }
    }

    fn wait_for(mut ready: impl FnMut() -> bool) {
        for _ in 0..200 {
            if ready() {
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("condition not reached within 2s");
    }

    #[test]
    fn armed_pipeline_populates_overlay() {
        let overlay = Arc::new(OverlayCell::new());
        let mut handle = arm(
            ready_surface(),
            overlay.clone(),
            Arc::new(InstantClient),
            ThresholdControl::new(75),
            fast_config(),
        );
        wait_for(|| overlay.snapshot().detection_count() > 0);
        handle.disarm();

        let snap = overlay.snapshot();
        assert_eq!(snap.detections[0].cls, "bolt");
        assert_eq!(snap.native.unwrap().width, 32);
        assert!(handle.stats().applied > 0);
    }

    #[test]
    fn no_tick_fires_after_disarm() {
        let mut handle = arm(
            ready_surface(),
            Arc::new(OverlayCell::new()),
            Arc::new(InstantClient),
            ThresholdControl::new(75),
            fast_config(),
        );
        wait_for(|| handle.stats().sampled >= 2);
        handle.disarm();
        assert!(!handle.is_armed());

        let after_disarm = handle.stats().sampled;
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(handle.stats().sampled, after_disarm);
    }

    #[test]
    fn late_response_cannot_repopulate_after_disarm() {
        let overlay = Arc::new(OverlayCell::new());
        let (client, gate) = GatedClient::new();
        let mut handle = arm(
            ready_surface(),
            overlay.clone(),
            client.clone(),
            ThresholdControl::new(75),
            fast_config(),
        );
        wait_for(|| client.calls.load(Ordering::SeqCst) >= 1);
        handle.disarm();

        // Release the in-flight submission after disarm.
        let before = overlay.snapshot();
        let _ = gate.send(batch("ghost", 0.99));
        drop(gate);
        std::thread::sleep(Duration::from_millis(100));

        let after = overlay.snapshot();
        assert_eq!(after.detection_count(), before.detection_count());
        assert_eq!(after.last_seq, before.last_seq);
        assert_eq!(after.detection_count(), 0);
    }

    #[test]
    fn in_flight_submissions_are_bounded() {
        let (client, gate) = GatedClient::new();
        let mut handle = arm(
            ready_surface(),
            Arc::new(OverlayCell::new()),
            client.clone(),
            ThresholdControl::new(75),
            fast_config(),
        );
        // With both workers blocked the sampler must start dropping.
        wait_for(|| handle.stats().dropped_full >= 3);
        assert!(client.calls.load(Ordering::SeqCst) <= 2);

        handle.disarm();
        drop(gate);
    }

    #[test]
    fn failed_submission_leaves_overlay_unchanged() {
        let overlay = Arc::new(OverlayCell::new());
        let mut handle = arm(
            ready_surface(),
            overlay.clone(),
            Arc::new(FailingClient),
            ThresholdControl::new(75),
            fast_config(),
        );
        wait_for(|| handle.stats().failed >= 2);
        handle.disarm();

        let snap = overlay.snapshot();
        assert_eq!(snap.detection_count(), 0);
        assert_eq!(snap.last_seq, 0);
    }

    #[test]
    fn threshold_is_read_per_batch() {
        let threshold = ThresholdControl::new(95);
        let overlay = Arc::new(OverlayCell::new());
        let mut handle = arm(
            ready_surface(),
            overlay.clone(),
            Arc::new(InstantClient),
            threshold.clone(),
            fast_config(),
        );
        // 0.9 < 0.95: batches apply but hold no detections.
        wait_for(|| handle.stats().applied >= 1);
        assert_eq!(overlay.snapshot().detection_count(), 0);

        // Lowering the threshold takes effect on the next batch.
        threshold.set(75);
        wait_for(|| overlay.snapshot().detection_count() > 0);
        handle.disarm();
    }

    #[test]
    fn empty_surface_skips_ticks_silently() {
        let surface = Arc::new(VideoSurface::new());
        let mut handle = arm(
            surface,
            Arc::new(OverlayCell::new()),
            Arc::new(InstantClient),
            ThresholdControl::new(75),
            fast_config(),
        );
        std::thread::sleep(Duration::from_millis(100));
        handle.disarm();
        assert_eq!(handle.stats().sampled, 0);
    }

    #[test]
    fn threshold_control_clamps() {
        let threshold = ThresholdControl::new(200);
        assert_eq!(threshold.get(), 100);
        threshold.set(42);
        assert_eq!(threshold.get(), 42);
    }
}
