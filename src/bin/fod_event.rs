//! fod_event - send a test detection event or read the dashboard summary
//!
//! Operator utility for checking service connectivity without running the
//! full console.

use anyhow::Result;
use clap::Parser;

use fod_console::{ConsoleApi, ConsoleConfig, EventIngest};

#[derive(Parser, Debug)]
#[command(name = "fod_event", about = "FOD service event utility")]
struct Args {
    /// Print the dashboard summary instead of sending an event.
    #[arg(long)]
    summary: bool,

    /// Object class for the test event.
    #[arg(long, default_value = "test_object")]
    class: String,

    /// Confidence for the test event, in [0, 1].
    #[arg(long, default_value_t = 0.9)]
    confidence: f64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = ConsoleConfig::load()?;
    let api = ConsoleApi::new(&cfg.api_base);

    if args.summary {
        let summary = api.dashboard_summary()?;
        println!(
            "last 24h: {} events, avg confidence {:.2}, top class {}",
            summary.total_24h,
            summary.avg_conf,
            summary.top_fod.as_deref().unwrap_or("-")
        );
        return Ok(());
    }

    let event = EventIngest {
        ts: chrono::Utc::now().to_rfc3339(),
        object_class: args.class,
        object_count: Some(1),
        confidence: args.confidence,
        latitude: cfg.site.latitude,
        longitude: cfg.site.longitude,
        source: "console".to_string(),
        source_ref: cfg.camera.camera_id.clone(),
        bbox: None,
        meta: Some(serde_json::json!({ "test": true })),
    };
    let receipt = api.ingest_event(&event)?;
    println!("event accepted: {}", receipt.event_id);
    Ok(())
}
