//! Run configuration, loaded once from JSON and passed by reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::align::aligner::AlignParams;
use crate::align::estimate::MIN_POINTS;
use crate::align::homography::Homography;
use crate::compose::tree::{CompositionTree, MAX_INPUTS};
use crate::foundation::core::{Fps, Resolution};
use crate::foundation::error::{StitchError, StitchResult};

/// Top-level configuration of a stitching run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StitchConfig {
    /// Input sources, in stitching order (left to right / clockwise).
    pub sources: Vec<SourceDescriptor>,
    /// Output size and rate shared by every sink.
    #[serde(default)]
    pub output: OutputConfig,
    /// Preview surface.
    #[serde(default)]
    pub preview: PreviewConfig,
    /// File recorder; disabled when absent.
    #[serde(default)]
    pub record: Option<RecordConfig>,
    /// Live encoder pipe; disabled when absent.
    #[serde(default)]
    pub stream: Option<StreamConfig>,
    /// Alignment tuning and aligner selection.
    pub align: AlignConfig,
    /// Per-frame lens correction; disabled when absent.
    #[serde(default)]
    pub correction: Option<CorrectionConfig>,
    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One input source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceDescriptor {
    /// A capture device read through an ffmpeg input format (`v4l2`, `avfoundation`, ...).
    LiveDevice {
        /// Device path or name, as understood by the input format.
        device: String,
        /// ffmpeg input format.
        #[serde(default = "default_input_format")]
        input_format: String,
        /// Capture width.
        width: u32,
        /// Capture height.
        height: u32,
        /// Capture rate.
        #[serde(default = "default_device_fps")]
        fps: u32,
        /// Resize every frame to this width on acquisition.
        #[serde(default)]
        scale_width: Option<u32>,
    },
    /// A video file, decoded front to back once.
    File {
        /// Path to the video.
        path: PathBuf,
        /// Resize every frame to this width on acquisition.
        #[serde(default)]
        scale_width: Option<u32>,
    },
}

impl SourceDescriptor {
    /// Acquisition-time scale width, if any.
    pub fn scale_width(&self) -> Option<u32> {
        match self {
            Self::LiveDevice { scale_width, .. } | Self::File { scale_width, .. } => *scale_width,
        }
    }
}

fn default_input_format() -> String {
    "v4l2".to_string()
}

fn default_device_fps() -> u32 {
    30
}

/// Output geometry and rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output width; inferred from the first composite when unset.
    #[serde(default)]
    pub width: Option<u32>,
    /// Output height; inferred from the first composite when unset.
    #[serde(default)]
    pub height: Option<u32>,
    /// Frame rate announced to the recorder and encoder.
    #[serde(default = "default_output_fps")]
    pub fps: Fps,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            fps: default_output_fps(),
        }
    }
}

impl OutputConfig {
    /// Configured resolution, or `None` when it should be inferred.
    pub fn resolution(&self) -> StitchResult<Option<Resolution>> {
        match (self.width, self.height) {
            (None, None) => Ok(None),
            (Some(w), Some(h)) => Resolution::new(w, h)
                .map(Some)
                .map_err(|_| StitchError::config("output width/height must be non-zero")),
            _ => Err(StitchError::config(
                "output width and height must be set together",
            )),
        }
    }
}

fn default_output_fps() -> Fps {
    Fps { num: 20, den: 1 }
}

/// Snapshot preview settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Whether the preview is shown at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// PNG the latest composite is written to. `<path>.quit` acts as the quit key.
    #[serde(default = "default_preview_path")]
    pub path: PathBuf,
    /// Refresh the snapshot every this many composites.
    #[serde(default = "default_preview_every")]
    pub every_n_frames: u32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_preview_path(),
            every_n_frames: default_preview_every(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_preview_path() -> PathBuf {
    PathBuf::from("stitchline-preview.png")
}

fn default_preview_every() -> u32 {
    10
}

/// File recorder settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordConfig {
    /// Output video path.
    pub path: PathBuf,
    /// Replace an existing file.
    #[serde(default = "default_true")]
    pub overwrite: bool,
}

/// Live encoder settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Output address handed to the encoder (for example an `rtmp://` URL).
    pub address: String,
    /// Output container format.
    #[serde(default = "default_stream_format")]
    pub format: String,
    /// Encoder executable.
    #[serde(default = "default_stream_program")]
    pub program: String,
    /// Encoder arguments placed between the raw input and the output.
    #[serde(default = "default_stream_args")]
    pub extra_args: Vec<String>,
}

fn default_stream_format() -> String {
    "flv".to_string()
}

fn default_stream_program() -> String {
    "ffmpeg".to_string()
}

fn default_stream_args() -> Vec<String> {
    [
        "-c:v",
        "libx264",
        "-preset",
        "veryfast",
        "-tune",
        "zerolatency",
        "-pix_fmt",
        "yuv420p",
    ]
    .map(String::from)
    .to_vec()
}

/// Alignment tuning plus the aligner to use.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlignConfig {
    /// Matching thresholds.
    #[serde(flatten)]
    pub params: AlignParams,
    /// Which aligner feeds the merge nodes.
    pub aligner: AlignerConfig,
}

/// Aligner selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AlignerConfig {
    /// Calibrated rig: one row-major homography per merge node.
    Fixed {
        /// Homographies in node order.
        homographies: Vec<[f64; 9]>,
    },
    /// Feature matching through a caller-supplied keypoint matcher (library use only).
    Correspondence,
}

/// Radial lens distortion parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CorrectionConfig {
    /// Focal length along x, in pixels.
    pub fx: f64,
    /// Focal length along y, in pixels.
    pub fy: f64,
    /// Principal point x.
    pub cx: f64,
    /// Principal point y.
    pub cy: f64,
    /// Second-order radial coefficient.
    pub k1: f64,
    /// Fourth-order radial coefficient.
    #[serde(default)]
    pub k2: f64,
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive (`"info"`, `"stitchline=debug,warn"`). `RUST_LOG` wins when set.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit structured JSON lines.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl StitchConfig {
    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: &Path) -> StitchResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StitchError::config(format!("failed to read config '{}': {e}", path.display()))
        })?;
        let cfg: Self = serde_json::from_str(&text).map_err(|e| {
            StitchError::config(format!("invalid config '{}': {e}", path.display()))
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_str(text: &str) -> StitchResult<Self> {
        let cfg: Self = serde_json::from_str(text)
            .map_err(|e| StitchError::config(format!("invalid config json: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check cross-field constraints. Every failure is a [`StitchError::Config`].
    pub fn validate(&self) -> StitchResult<()> {
        let n = self.sources.len();
        if !(1..=MAX_INPUTS).contains(&n) {
            return Err(StitchError::config(format!(
                "expected 1..={MAX_INPUTS} sources, got {n}"
            )));
        }
        for (idx, src) in self.sources.iter().enumerate() {
            validate_source(idx, src)?;
        }

        let output = self.output.resolution()?;
        if let Some(res) = output
            && res.even() != res
        {
            return Err(StitchError::config(format!(
                "output size {res} must have even dimensions"
            )));
        }
        if self.output.fps.num == 0 || self.output.fps.den == 0 {
            return Err(StitchError::config("output fps must be non-zero"));
        }

        if self.preview.enabled && self.preview.every_n_frames == 0 {
            return Err(StitchError::config("preview.every_n_frames must be > 0"));
        }
        if let Some(record) = &self.record
            && record.path.as_os_str().is_empty()
        {
            return Err(StitchError::config("record.path must not be empty"));
        }
        if let Some(stream) = &self.stream {
            if stream.address.trim().is_empty() {
                return Err(StitchError::config("stream.address must not be empty"));
            }
            if stream.program.trim().is_empty() || stream.format.trim().is_empty() {
                return Err(StitchError::config(
                    "stream.program and stream.format must not be empty",
                ));
            }
            if output.is_none() {
                return Err(StitchError::config(
                    "streaming requires output.width and output.height",
                ));
            }
        }

        self.validate_align()?;

        if let Some(c) = &self.correction {
            let finite = [c.fx, c.fy, c.cx, c.cy, c.k1, c.k2]
                .iter()
                .all(|v| v.is_finite());
            if !finite || c.fx <= 0.0 || c.fy <= 0.0 {
                return Err(StitchError::config(
                    "correction needs finite parameters and positive focal lengths",
                ));
            }
        }
        Ok(())
    }

    fn validate_align(&self) -> StitchResult<()> {
        let p = &self.align.params;
        if !(p.ratio > 0.0 && p.ratio <= 1.0) {
            return Err(StitchError::config("align.ratio must be in (0, 1]"));
        }
        if p.min_good_matches < MIN_POINTS {
            return Err(StitchError::config(format!(
                "align.min_good_matches must be >= {MIN_POINTS}"
            )));
        }
        if !(p.reproj_threshold.is_finite() && p.reproj_threshold > 0.0) {
            return Err(StitchError::config("align.reproj_threshold must be > 0"));
        }
        if p.max_canvas_pixels == 0 {
            return Err(StitchError::config("align.max_canvas_pixels must be > 0"));
        }
        if let AlignerConfig::Fixed { homographies } = &self.align.aligner {
            let nodes = CompositionTree::node_count(self.sources.len());
            if homographies.len() != nodes {
                return Err(StitchError::config(format!(
                    "{} sources need {nodes} homographies, got {}",
                    self.sources.len(),
                    homographies.len()
                )));
            }
            for (node, h) in homographies.iter().enumerate() {
                Homography::from_row_major(*h).map_err(|e| {
                    StitchError::config(format!("homography for node {node}: {e}"))
                })?;
            }
        }
        Ok(())
    }
}

fn validate_source(idx: usize, src: &SourceDescriptor) -> StitchResult<()> {
    if src.scale_width() == Some(0) {
        return Err(StitchError::config(format!(
            "source {idx}: scale_width must be > 0"
        )));
    }
    match src {
        SourceDescriptor::LiveDevice {
            device,
            input_format,
            width,
            height,
            fps,
            ..
        } => {
            if device.trim().is_empty() || input_format.trim().is_empty() {
                return Err(StitchError::config(format!(
                    "source {idx}: device and input_format must not be empty"
                )));
            }
            if *width == 0 || *height == 0 || *fps == 0 {
                return Err(StitchError::config(format!(
                    "source {idx}: width, height and fps must be > 0"
                )));
            }
        }
        SourceDescriptor::File { path, .. } => {
            if path.as_os_str().is_empty() {
                return Err(StitchError::config(format!(
                    "source {idx}: path must not be empty"
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
