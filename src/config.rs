// SPDX-License-Identifier: GPL-3.0-only

use crate::backends::SampleDepth;
use crate::constants::{defaults, limits, logging};
use crate::errors::{CaptureError, CaptureResult};
use crate::pipelines::capture::{Compression, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Capture pipeline configuration
///
/// Fixed for the lifetime of a pipeline. Missing fields take their defaults
/// when loaded from JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Root directory for captured frames
    pub output_dir: PathBuf,
    /// Directory below `output_dir` that receives the files (may be empty)
    pub sub_directory: String,
    /// File name prefix, e.g. `img` for `img_000042.png`
    pub file_prefix: String,
    /// Zero-padded width of the frame number
    pub num_digits: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    pub image_format: ImageFormat,
    /// Capture 16-bit float instead of 8-bit pixels
    pub float_capture: bool,
    pub compression: Compression,
    /// Display gamma pushed to the render target before every capture
    pub target_gamma: Option<f32>,
    /// Log every written file at info level
    pub verbose: bool,
    /// Upper bound on concurrently running encode+write jobs
    pub worker_threads: usize,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            sub_directory: defaults::SUB_DIRECTORY.to_string(),
            file_prefix: defaults::FILE_PREFIX.to_string(),
            num_digits: defaults::NUM_DIGITS,
            frame_width: defaults::FRAME_WIDTH,
            frame_height: defaults::FRAME_HEIGHT,
            image_format: ImageFormat::default(),
            float_capture: false,
            compression: Compression::default(),
            target_gamma: None,
            verbose: false,
            worker_threads: defaults::WORKER_THREADS,
        }
    }
}

impl CaptureConfig {
    /// Sample depth family the pipeline captures in
    ///
    /// Channel order is taken from the render target.
    pub fn capture_depth(&self) -> SampleDepth {
        if self.float_capture {
            SampleDepth::F16
        } else {
            SampleDepth::U8
        }
    }

    /// Default tracing filter for this configuration
    ///
    /// `verbose` raises the crate to `info` so every written file is echoed.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            logging::VERBOSE_FILTER
        } else {
            logging::DEFAULT_FILTER
        }
    }

    /// Check the configuration for values no pipeline can run with
    pub fn validate(&self) -> CaptureResult<()> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(CaptureError::Configuration(format!(
                "Frame size must be non-zero, got {}x{}",
                self.frame_width, self.frame_height
            )));
        }
        if self.frame_width > limits::MAX_FRAME_DIMENSION
            || self.frame_height > limits::MAX_FRAME_DIMENSION
        {
            return Err(CaptureError::Configuration(format!(
                "Frame size {}x{} exceeds {} pixels per edge",
                self.frame_width,
                self.frame_height,
                limits::MAX_FRAME_DIMENSION
            )));
        }
        if self.num_digits == 0 || self.num_digits > limits::MAX_DIGITS {
            return Err(CaptureError::Configuration(format!(
                "Digit count must be 1-{}, got {}",
                limits::MAX_DIGITS,
                self.num_digits
            )));
        }
        if self.file_prefix.contains(['/', '\\']) {
            return Err(CaptureError::Configuration(format!(
                "File prefix must not contain path separators: {:?}",
                self.file_prefix
            )));
        }
        if self.worker_threads == 0 || self.worker_threads > limits::MAX_WORKER_THREADS {
            return Err(CaptureError::Configuration(format!(
                "Worker threads must be 1-{}, got {}",
                limits::MAX_WORKER_THREADS,
                self.worker_threads
            )));
        }
        if let Some(gamma) = self.target_gamma
            && !(gamma.is_finite() && gamma > 0.0)
        {
            return Err(CaptureError::Configuration(format!(
                "Target gamma must be a positive number, got {}",
                gamma
            )));
        }

        // 8-bit formats cannot carry float captures and EXR is written as half float
        if self.capture_depth() != self.image_format.sample_depth() {
            return Err(CaptureError::Configuration(format!(
                "{} output requires float_capture = {}",
                self.image_format,
                !self.float_capture
            )));
        }

        self.compression
            .validate_for(self.image_format)
            .map_err(CaptureError::Configuration)
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> CaptureResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CaptureError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            CaptureError::Configuration(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save(&self, path: &Path) -> CaptureResult<()> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| CaptureError::Configuration(e.to_string()))?;
        crate::storage::write_bytes(text.as_bytes(), path)
    }
}

/// Default output directory (~/Pictures/FrameCapture)
pub fn default_output_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(defaults::OUTPUT_FOLDER)
}

/// Default config file location (~/.config/frame-capture.json)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(defaults::CONFIG_FILE))
}
