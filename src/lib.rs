//! FOD detection operator console.
//!
//! This crate drives the live detection view of a Foreign Object Debris
//! service: it acquires a camera feed, samples frames on a fixed period,
//! submits them to the service's inference endpoint, and keeps an overlay
//! of the detections currently on screen.
//!
//! # Pipeline
//!
//! ```text
//! source (live camera / still image)
//!   -> VideoSurface (latest frame)
//!   -> sampler (fixed period, JPEG encode, sequence number)
//!   -> dispatch workers (bounded in-flight, HTTP multipart)
//!   -> confidence filter (operator threshold)
//!   -> OverlayCell (latest-tick-wins)
//!   -> console render (projected into display space per render)
//! ```
//!
//! Invariants the pipeline holds by construction:
//!
//! - a response only lands on the overlay if its capture sequence is newer
//!   than the last applied one
//! - at most `max_in_flight` submissions are outstanding; ticks beyond that
//!   drop their sample rather than queue
//! - disarming joins the sampler before returning, and late responses are
//!   discarded by an armed check, so a stopped console never repaints
//! - the capture device is released on every session exit path
//!
//! # Module Structure
//!
//! - `source`: frame acquisition (HTTP camera, stub camera, still files)
//! - `session`: capture handle lifecycle tied to operator mode
//! - `frame`: frame buffers, the shared video surface, JPEG sampling
//! - `pipeline`: sampler and dispatch workers
//! - `detect`: wire types, inference client, confidence filter
//! - `overlay`: coordinate projection and overlay state
//! - `events`: event ingestion, dashboard summary, health probe
//! - `console`: text rendering of overlay, sidebar, and status

pub mod config;
pub mod console;
pub mod detect;
pub mod events;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod source;

pub use config::ConsoleConfig;
pub use detect::{Detection, DetectionBatch, DispatchError, HttpInferenceClient, InferenceClient, Severity};
pub use events::{ConsoleApi, DashboardSummary, EventIngest, SitePlacement};
pub use frame::{CapturedFrame, VideoSurface};
pub use overlay::{DisplayGeometry, OverlayCell, OverlaySnapshot, RenderedBox, SourceGeometry};
pub use pipeline::{PipelineConfig, PipelineStats, SamplerHandle, ThresholdControl};
pub use session::{InputMode, MediaSession, RecordingState, StreamConstraints, StreamPhase};
pub use source::{CameraConfig, LiveSource, SourceError, StillSource};
