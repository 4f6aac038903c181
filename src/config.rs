use crate::error::{PipelineError, Result};
use crate::matching::MatchWeights;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Top-level reader configuration, passed explicitly into the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    pub camera: CameraConfig,
    pub preprocess: PreprocessConfig,
    pub extract: ExtractConfig,
    pub matching: MatchConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Capture device index.
    pub index: u32,
    /// Requested frame size; the driver picks the closest mode it supports.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: 640,
            height: 480,
            fps: 30,
        }
    }
}

/// How the blurred intensity image is split into foreground and background.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Pick the level per frame with Otsu's method.
    Otsu,
    /// Use a fixed intensity level.
    Fixed(u8),
}

/// Which side of the threshold counts as finger contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Bright,
    Dark,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Odd Gaussian kernel size; 1 disables smoothing.
    pub blur_kernel: u32,
    pub threshold: ThresholdMode,
    pub foreground: Polarity,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            threshold: ThresholdMode::Otsu,
            foreground: Polarity::Bright,
        }
    }
}

impl PreprocessConfig {
    /// Gaussian sigma implied by the kernel size, or `None` when smoothing is off.
    pub fn blur_sigma(&self) -> Option<f32> {
        if self.blur_kernel <= 1 {
            return None;
        }
        let k = self.blur_kernel as f32;
        Some(0.3 * ((k - 1.0) * 0.5 - 1.0) + 0.8)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Contours enclosing this many square pixels or fewer are treated as noise.
    pub min_contour_area: f64,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            min_contour_area: 50.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Minimum similarity for an accepted match, in `[0, 1]`.
    pub threshold: f64,
    pub weights: MatchWeights,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            threshold: 0.7,
            weights: MatchWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A capture session with no operator signal for this long is cancelled.
    pub capture_timeout_secs: u64,
    /// How long each operator poll waits between frames.
    pub poll_interval_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_timeout_secs: 60,
            poll_interval_ms: 30,
        }
    }
}

impl SessionConfig {
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl ReaderConfig {
    /// Load a JSON config file; missing keys fall back to defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            PipelineError::Config(format!("cannot open {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_reader(file).map_err(|e| {
            PipelineError::Config(format!("cannot parse {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let kernel = self.preprocess.blur_kernel;
        if kernel == 0 || kernel % 2 == 0 {
            return Err(PipelineError::Config(format!(
                "blur_kernel must be odd and positive, got {kernel}"
            )));
        }

        let threshold = self.matching.threshold;
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(PipelineError::Config(format!(
                "match threshold must lie in [0, 1], got {threshold}"
            )));
        }
        self.matching.weights.validate()?;

        let min_area = self.extract.min_contour_area;
        if !min_area.is_finite() || min_area < 0.0 {
            return Err(PipelineError::Config(format!(
                "min_contour_area must be non-negative, got {min_area}"
            )));
        }

        let camera = &self.camera;
        if camera.width == 0 || camera.height == 0 || camera.fps == 0 {
            return Err(PipelineError::Config(format!(
                "camera mode must be positive, got {}x{} @ {} fps",
                camera.width, camera.height, camera.fps
            )));
        }

        if self.session.poll_interval_ms == 0 {
            return Err(PipelineError::Config(
                "poll_interval_ms must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
