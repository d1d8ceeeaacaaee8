use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000";
const DEFAULT_CAMERA_URL: &str = "stub://rwy-01l-cam-01";
const DEFAULT_CAMERA_ID: &str = "RWY-01L-CAM-01";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_STREAM_WIDTH: u32 = 1280;
const DEFAULT_STREAM_HEIGHT: u32 = 720;
const DEFAULT_SAMPLE_PERIOD_MS: u64 = 100;
const DEFAULT_JPEG_QUALITY: u8 = 70;
const DEFAULT_MAX_IN_FLIGHT: usize = 2;
const DEFAULT_THRESHOLD_PCT: u8 = 75;
const DEFAULT_LATITUDE: f64 = 0.0;
const DEFAULT_LONGITUDE: f64 = 0.0;
const DEFAULT_YAW: f64 = 0.0;

#[derive(Debug, Deserialize, Default)]
struct ConsoleConfigFile {
    api_base: Option<String>,
    camera: Option<CameraConfigFile>,
    stream: Option<StreamConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    site: Option<SiteConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    camera_id: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct StreamConfigFile {
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    sample_period_ms: Option<u64>,
    jpeg_quality: Option<u8>,
    max_in_flight: Option<usize>,
    threshold_pct: Option<u8>,
}

#[derive(Debug, Deserialize, Default)]
struct SiteConfigFile {
    latitude: Option<f64>,
    longitude: Option<f64>,
    yaw: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub api_base: String,
    pub camera: CameraSettings,
    pub stream: StreamSettings,
    pub pipeline: PipelineSettings,
    pub site: SiteSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub camera_id: String,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub sample_period: Duration,
    pub jpeg_quality: u8,
    pub max_in_flight: usize,
    pub threshold_pct: u8,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub latitude: f64,
    pub longitude: f64,
    pub yaw: f64,
}

impl ConsoleConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FOD_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConsoleConfigFile) -> Self {
        let api_base = file
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            camera_id: file
                .camera
                .as_ref()
                .and_then(|camera| camera.camera_id.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_ID.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
        };
        let stream = StreamSettings {
            width: file
                .stream
                .as_ref()
                .and_then(|stream| stream.width)
                .unwrap_or(DEFAULT_STREAM_WIDTH),
            height: file
                .stream
                .as_ref()
                .and_then(|stream| stream.height)
                .unwrap_or(DEFAULT_STREAM_HEIGHT),
        };
        let pipeline = PipelineSettings {
            sample_period: Duration::from_millis(
                file.pipeline
                    .as_ref()
                    .and_then(|pipeline| pipeline.sample_period_ms)
                    .unwrap_or(DEFAULT_SAMPLE_PERIOD_MS),
            ),
            jpeg_quality: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.jpeg_quality)
                .unwrap_or(DEFAULT_JPEG_QUALITY),
            max_in_flight: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.max_in_flight)
                .unwrap_or(DEFAULT_MAX_IN_FLIGHT),
            threshold_pct: file
                .pipeline
                .as_ref()
                .and_then(|pipeline| pipeline.threshold_pct)
                .unwrap_or(DEFAULT_THRESHOLD_PCT),
        };
        let site = SiteSettings {
            latitude: file
                .site
                .as_ref()
                .and_then(|site| site.latitude)
                .unwrap_or(DEFAULT_LATITUDE),
            longitude: file
                .site
                .as_ref()
                .and_then(|site| site.longitude)
                .unwrap_or(DEFAULT_LONGITUDE),
            yaw: file
                .site
                .as_ref()
                .and_then(|site| site.yaw)
                .unwrap_or(DEFAULT_YAW),
        };
        Self {
            api_base,
            camera,
            stream,
            pipeline,
            site,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(base) = std::env::var("FOD_API_BASE") {
            if !base.trim().is_empty() {
                self.api_base = base;
            }
        }
        if let Ok(url) = std::env::var("FOD_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(id) = std::env::var("FOD_CAMERA_ID") {
            if !id.trim().is_empty() {
                self.camera.camera_id = id;
            }
        }
        if let Ok(threshold) = std::env::var("FOD_THRESHOLD") {
            let pct: u8 = threshold
                .parse()
                .map_err(|_| anyhow!("FOD_THRESHOLD must be an integer percent (0-100)"))?;
            self.pipeline.threshold_pct = pct;
        }
        if let Ok(period) = std::env::var("FOD_SAMPLE_PERIOD_MS") {
            let ms: u64 = period
                .parse()
                .map_err(|_| anyhow!("FOD_SAMPLE_PERIOD_MS must be an integer millisecond count"))?;
            self.pipeline.sample_period = Duration::from_millis(ms);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.api_base.trim().is_empty() {
            return Err(anyhow!("api_base must not be empty"));
        }
        if self.pipeline.threshold_pct > 100 {
            return Err(anyhow!("threshold_pct must be in 0..=100"));
        }
        if self.pipeline.jpeg_quality == 0 || self.pipeline.jpeg_quality > 100 {
            return Err(anyhow!("jpeg_quality must be in 1..=100"));
        }
        if self.pipeline.sample_period.is_zero() {
            return Err(anyhow!("sample_period_ms must be greater than zero"));
        }
        if self.pipeline.max_in_flight == 0 {
            return Err(anyhow!("max_in_flight must be at least 1"));
        }
        if self.stream.width == 0 || self.stream.height == 0 {
            return Err(anyhow!("stream dimensions must be non-zero"));
        }
        if !(-90.0..=90.0).contains(&self.site.latitude) {
            return Err(anyhow!("site latitude must be in -90..=90"));
        }
        if !(-180.0..=180.0).contains(&self.site.longitude) {
            return Err(anyhow!("site longitude must be in -180..=180"));
        }
        if !(0.0..360.0).contains(&self.site.yaw) {
            return Err(anyhow!("site yaw must be in 0..360 degrees"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ConsoleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
