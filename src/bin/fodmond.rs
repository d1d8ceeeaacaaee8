//! fodmond - FOD detection console daemon
//!
//! This daemon:
//! 1. Acquires the configured input (live camera feed or a still image)
//! 2. Samples frames on a fixed period and submits them for inference
//! 3. Filters detections by the operator confidence threshold
//! 4. Keeps the overlay current with latest-tick-wins ordering
//! 5. Renders overlay, sidebar, and status lines to the terminal
//! 6. Optionally reports detections to the service's event log

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fod_console::{
    console, events, ConsoleApi, ConsoleConfig, DisplayGeometry, HttpInferenceClient,
    InferenceClient, InputMode, MediaSession, OverlayCell, PipelineConfig, RecordingState,
    SitePlacement, StillSource, StreamConstraints, ThresholdControl, VideoSurface,
};
use fod_console::detect::filter;
use fod_console::source::CameraConfig;

#[derive(Parser, Debug)]
#[command(name = "fodmond", about = "FOD detection console daemon")]
struct Args {
    /// Input mode: image, video, or live.
    #[arg(long, default_value = "live")]
    mode: String,

    /// Input file for image or video mode.
    #[arg(long)]
    file: Option<String>,

    /// Report each detection batch to the service event log.
    #[arg(long)]
    ingest_alerts: bool,

    /// Confidence threshold percent; overrides the configured value.
    #[arg(long, env = "FOD_THRESHOLD")]
    threshold: Option<u8>,

    /// Display viewport width for overlay rendering.
    #[arg(long, default_value_t = 960.0)]
    view_width: f32,

    /// Display viewport height for overlay rendering.
    #[arg(long, default_value_t = 540.0)]
    view_height: f32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ConsoleConfig::load()?;
    let mode: InputMode = args.mode.parse()?;
    let threshold_pct = match args.threshold {
        Some(pct) if pct > 100 => return Err(anyhow!("--threshold must be in 0..=100")),
        Some(pct) => pct,
        None => cfg.pipeline.threshold_pct,
    };

    let api = ConsoleApi::new(&cfg.api_base);
    match api.health() {
        Ok(()) => log::info!("service reachable at {}", cfg.api_base),
        Err(err) => log::warn!("service health probe failed: {err}"),
    }

    let placement = SitePlacement {
        camera_id: cfg.camera.camera_id.clone(),
        latitude: cfg.site.latitude,
        longitude: cfg.site.longitude,
        yaw: cfg.site.yaw,
    };

    match mode {
        InputMode::Image => run_image(&args, &cfg, &api, &placement, threshold_pct),
        InputMode::Video => {
            let file = args
                .file
                .as_deref()
                .ok_or_else(|| anyhow!("--file is required in video mode"))?;
            log::info!("video input {file}: preview only, detection is not run on video files");
            Ok(())
        }
        InputMode::Live => run_live(&args, &cfg, &api, &placement, threshold_pct),
    }
}

/// One detection pass over a still image.
fn run_image(
    args: &Args,
    cfg: &ConsoleConfig,
    api: &ConsoleApi,
    placement: &SitePlacement,
    threshold_pct: u8,
) -> Result<()> {
    let file = args
        .file
        .as_deref()
        .ok_or_else(|| anyhow!("--file is required in image mode"))?;
    let source = StillSource::new(file)?;
    let frame = source.load()?;
    let native = frame.geometry();
    let jpeg = frame.encode_jpeg(cfg.pipeline.jpeg_quality)?;

    let client = HttpInferenceClient::new(&cfg.api_base);
    let batch = client
        .submit(&jpeg)
        .with_context(|| format!("detect {file}"))?;
    let model = batch.model.clone();
    let kept = filter::apply(batch, threshold_pct);

    let cell = OverlayCell::new();
    cell.apply(1, kept.clone(), native, model);
    let snapshot = cell.snapshot();
    print!(
        "{}",
        console::render_overlay(
            &snapshot,
            DisplayGeometry {
                width: args.view_width,
                height: args.view_height,
            },
        )
    );
    print!("{}", console::render_sidebar(&snapshot.detections));
    println!("{}", console::render_stats(&snapshot));

    if args.ingest_alerts {
        report_detections(api, &kept, placement, snapshot.model.as_deref());
    }
    Ok(())
}

/// Continuous detection over the live feed until interrupted.
fn run_live(
    args: &Args,
    cfg: &ConsoleConfig,
    api: &ConsoleApi,
    placement: &SitePlacement,
    threshold_pct: u8,
) -> Result<()> {
    let surface = Arc::new(VideoSurface::new());
    let overlay = Arc::new(OverlayCell::new());
    let threshold = ThresholdControl::new(threshold_pct);

    let camera = CameraConfig {
        url: cfg.camera.url.clone(),
        camera_id: cfg.camera.camera_id.clone(),
        target_fps: cfg.camera.target_fps,
    };
    let constraints = StreamConstraints {
        ideal_width: cfg.stream.width,
        ideal_height: cfg.stream.height,
        audio: false,
    };
    let mut session = MediaSession::new(camera, constraints, surface.clone());
    session.sync(InputMode::Live, RecordingState::Streaming)?;
    overlay.set_recording(true);

    let client = Arc::new(HttpInferenceClient::new(&cfg.api_base));
    let mut handle = fod_console::pipeline::arm(
        surface,
        overlay.clone(),
        client,
        threshold,
        PipelineConfig {
            sample_period: cfg.pipeline.sample_period,
            jpeg_quality: cfg.pipeline.jpeg_quality,
            max_in_flight: cfg.pipeline.max_in_flight,
        },
    );
    log::info!(
        "detection armed: camera={} period={:?} threshold={}%",
        cfg.camera.camera_id,
        cfg.pipeline.sample_period,
        threshold_pct
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_handler = running.clone();
    ctrlc::set_handler(move || {
        running_handler.store(false, Ordering::SeqCst);
    })
    .context("install shutdown handler")?;

    let view = DisplayGeometry {
        width: args.view_width,
        height: args.view_height,
    };
    let mut last_reported_seq = 0u64;
    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_secs(1));

        let snapshot = overlay.snapshot();
        print!("{}", console::render_overlay(&snapshot, view));
        println!("{}", console::render_stats(&snapshot));

        if args.ingest_alerts && snapshot.last_seq > last_reported_seq {
            last_reported_seq = snapshot.last_seq;
            report_detections(api, &snapshot.detections, placement, snapshot.model.as_deref());
        }
    }

    log::info!("shutting down");
    handle.disarm();
    overlay.set_recording(false);
    session.release();

    let stats = handle.stats();
    let (acquires, releases) = session.handle_stats();
    log::info!(
        "pipeline: sampled={} applied={} stale={} dropped={} failed={}",
        stats.sampled,
        stats.applied,
        stats.stale,
        stats.dropped_full,
        stats.failed
    );
    log::info!("capture handle: acquires={acquires} releases={releases}");
    Ok(())
}

fn report_detections(
    api: &ConsoleApi,
    detections: &[fod_console::Detection],
    placement: &SitePlacement,
    model: Option<&str>,
) {
    for detection in detections {
        let event = events::event_for_detection(detection, placement, model);
        match api.ingest_event(&event) {
            Ok(receipt) => log::info!(
                "reported {} conf={:.2} as event {}",
                detection.cls,
                detection.conf,
                receipt.event_id
            ),
            Err(err) => log::warn!("event ingest failed: {err}"),
        }
    }
}
