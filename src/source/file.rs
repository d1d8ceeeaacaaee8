//! Local file input.
//!
//! The image input mode runs one detection pass over a still picture. Only
//! local paths are accepted; fetching remote media is the camera sources'
//! job.

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::frame::CapturedFrame;

/// A still image selected as the detection input.
pub struct StillSource {
    path: PathBuf,
}

impl StillSource {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let display = path.display().to_string();
        if display.contains("://") {
            return Err(anyhow!(
                "file input only supports local paths (no URL schemes)"
            ));
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read and decode the image.
    pub fn load(&self) -> Result<CapturedFrame> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read input image {}", self.path.display()))?;
        CapturedFrame::from_encoded(&bytes)
            .with_context(|| format!("decode input image {}", self.path.display()))
    }
}
