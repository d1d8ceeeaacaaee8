//! Console-side client for the FOD service API.
//!
//! Covers the non-inference endpoints: event ingestion, the dashboard
//! summary, and the health probe. Inference submission lives in
//! `detect::client` because it is on the hot sampling path and has its own
//! error taxonomy; everything here is operator-paced and reports plain
//! `anyhow` errors.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One detection event reported to the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIngest {
    /// Event timestamp, RFC 3339.
    pub ts: String,
    /// Detected FOD class, e.g. "bolt" or "metal_fragment".
    pub object_class: String,
    /// How many objects of this class were seen, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_count: Option<i32>,
    /// Detection confidence in [0, 1].
    pub confidence: f64,
    /// Site latitude in decimal degrees.
    pub latitude: f64,
    /// Site longitude in decimal degrees.
    pub longitude: f64,
    /// Originating subsystem, e.g. "console".
    pub source: String,
    /// Camera or sensor identifier within the source.
    pub source_ref: String,
    /// Bounding box in source-frame pixels, when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<serde_json::Value>,
    /// Free-form extras (model name, frame rate, yaw, ...).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Service acknowledgement for an ingested event.
#[derive(Debug, Deserialize)]
pub struct IngestReceipt {
    /// Identifier assigned by the service.
    #[serde(rename = "eventId")]
    pub event_id: String,
}

/// Rolling dashboard figures for the last day.
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardSummary {
    /// Events ingested in the last 24 hours.
    pub total_24h: i64,
    /// Mean confidence over those events.
    pub avg_conf: f64,
    /// Most frequent FOD class, absent when no events exist.
    #[serde(default)]
    pub top_fod: Option<String>,
}

/// Site placement recorded with every reported event.
#[derive(Debug, Clone)]
pub struct SitePlacement {
    pub camera_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Camera heading in degrees, stored in event meta.
    pub yaw: f64,
}

/// HTTP client for the service's console endpoints.
pub struct ConsoleApi {
    base: String,
    agent: ureq::Agent,
}

impl ConsoleApi {
    pub fn new(api_base: &str) -> Self {
        Self {
            base: api_base.trim_end_matches('/').to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(5))
                .build(),
        }
    }

    /// POST one event to `/events/ingest`.
    pub fn ingest_event(&self, event: &EventIngest) -> Result<IngestReceipt> {
        let url = format!("{}/events/ingest", self.base);
        let response = self
            .agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&serde_json::to_string(event)?)
            .map_err(|err| anyhow!("ingest request failed: {err}"))?;
        response
            .into_json()
            .context("ingest response was not valid JSON")
    }

    /// GET `/dashboard/summary`.
    pub fn dashboard_summary(&self) -> Result<DashboardSummary> {
        let url = format!("{}/dashboard/summary", self.base);
        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|err| anyhow!("summary request failed: {err}"))?;
        response
            .into_json()
            .context("summary response was not valid JSON")
    }

    /// GET `/health`. Ok when the service answers 200.
    pub fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.base);
        self.agent
            .get(&url)
            .call()
            .map(|_| ())
            .map_err(|err| anyhow!("health probe failed: {err}"))
    }
}

/// Build an ingest payload from a detection and the site placement.
pub fn event_for_detection(
    detection: &crate::detect::Detection,
    placement: &SitePlacement,
    model: Option<&str>,
) -> EventIngest {
    let [x, y, w, h] = detection.bbox_xywh;
    EventIngest {
        ts: chrono::Utc::now().to_rfc3339(),
        object_class: detection.cls.clone(),
        object_count: Some(1),
        confidence: f64::from(detection.conf),
        latitude: placement.latitude,
        longitude: placement.longitude,
        source: "console".to_string(),
        source_ref: placement.camera_id.clone(),
        bbox: Some(serde_json::json!({ "x": x, "y": y, "w": w, "h": h })),
        meta: Some(serde_json::json!({
            "model": model,
            "yaw": placement.yaw,
        })),
    }
}
