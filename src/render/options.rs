use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::foundation::core::Viewport;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::plan::FrameRange;
use crate::render::sink::FrameBufferSink;

const DEFAULT_FRAME_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_JPEG_QUALITY: u8 = 80;
const MAX_SCALE: f64 = 16.0;

/// Dimensions and timing of the visual program being rendered.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CompositionSpec {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frames per second.
    pub fps: f64,
    /// Total addressable frames.
    pub duration_in_frames: u64,
}

impl CompositionSpec {
    pub fn validate(&self) -> FramecastResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(FramecastError::configuration(format!(
                "composition dimensions must be > 0 (got {}x{})",
                self.width, self.height
            )));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return Err(FramecastError::configuration(format!(
                "composition fps must be finite and > 0 (got {})",
                self.fps
            )));
        }
        if self.duration_in_frames == 0 {
            return Err(FramecastError::configuration(
                "composition duration_in_frames must be >= 1",
            ));
        }
        Ok(())
    }
}

/// Capture encoding requested from workers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
    Webp,
    /// Drive frames for their side-channel assets only; nothing is captured.
    None,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::None => "none",
        }
    }

    pub fn captures(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Requested render parallelism, resolved against the host CPU count.
///
/// Deserializes from an integer (`4`), a percentage string (`"50%"`), or `"auto"`.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "ConcurrencyRepr", into = "ConcurrencyRepr")]
pub enum Concurrency {
    /// Half of the available CPUs, at least one.
    #[default]
    Auto,
    /// Exact worker count.
    Threads(usize),
    /// Share of available CPUs, in `(0, 100]`.
    Percent(f64),
}

#[derive(Clone, serde::Serialize, serde::Deserialize)]
#[serde(untagged)]
enum ConcurrencyRepr {
    Count(usize),
    Text(String),
}

impl TryFrom<ConcurrencyRepr> for Concurrency {
    type Error = String;

    fn try_from(value: ConcurrencyRepr) -> Result<Self, Self::Error> {
        match value {
            ConcurrencyRepr::Count(n) => Ok(Self::Threads(n)),
            ConcurrencyRepr::Text(s) => s.parse(),
        }
    }
}

impl From<Concurrency> for ConcurrencyRepr {
    fn from(value: Concurrency) -> Self {
        match value {
            Concurrency::Auto => Self::Text("auto".to_string()),
            Concurrency::Threads(n) => Self::Count(n),
            Concurrency::Percent(p) => Self::Text(format!("{p}%")),
        }
    }
}

impl std::str::FromStr for Concurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("auto") {
            return Ok(Self::Auto);
        }
        if let Some(pct) = s.strip_suffix('%') {
            let p: f64 = pct
                .trim()
                .parse()
                .map_err(|_| format!("invalid concurrency percentage '{s}'"))?;
            return Ok(Self::Percent(p));
        }
        s.parse::<usize>()
            .map(Self::Threads)
            .map_err(|_| format!("invalid concurrency '{s}' (expected integer, 'N%' or 'auto')"))
    }
}

impl Concurrency {
    /// Resolve to a worker count for a machine with `cpus` logical CPUs.
    pub fn resolve(self, cpus: usize) -> FramecastResult<usize> {
        let cpus = cpus.max(1);
        match self {
            Self::Auto => Ok((cpus / 2).max(1)),
            Self::Threads(n) => {
                if n == 0 || n > cpus {
                    return Err(FramecastError::configuration(format!(
                        "concurrency must be between 1 and {cpus} (got {n})"
                    )));
                }
                Ok(n)
            }
            Self::Percent(p) => {
                if !p.is_finite() || p <= 0.0 || p > 100.0 {
                    return Err(FramecastError::configuration(format!(
                        "concurrency percentage must be in (0, 100] (got {p})"
                    )));
                }
                Ok(((cpus as f64 * p / 100.0).round() as usize).max(1))
            }
        }
    }

    /// Resolve against [`std::thread::available_parallelism`].
    pub fn resolve_for_host(self) -> FramecastResult<usize> {
        let cpus = std::thread::available_parallelism().map_or(1, |n| n.get());
        self.resolve(cpus)
    }
}

/// Engine knobs for one rendering run.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Timeline slice to render; the whole composition when absent.
    pub frame_range: Option<FrameRange>,
    /// Render every Nth frame of the range.
    pub every_nth_frame: u32,
    pub concurrency: Concurrency,
    /// Logical CPUs `concurrency` is resolved against; the host's count when absent.
    pub cpu_budget: Option<usize>,
    pub image_format: ImageFormat,
    /// JPEG quality 0..=100. Only valid with [`ImageFormat::Jpeg`].
    pub jpeg_quality: Option<u8>,
    /// Device scale factor.
    pub scale: f64,
    /// Crash retries per frame.
    pub max_retries: u32,
    /// Budget for one seek + capture attempt.
    pub frame_timeout_ms: u64,
    /// Where resolved assets are materialized.
    pub cache_dir: PathBuf,
    /// Parameters injected into every worker session.
    pub input_props: serde_json::Value,
    /// Environment injected into every worker session.
    pub env: BTreeMap<String, String>,
    /// Re-emit worker diagnostic logs through `tracing`.
    pub forward_diagnostics: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            frame_range: None,
            every_nth_frame: 1,
            concurrency: Concurrency::Auto,
            cpu_budget: None,
            image_format: ImageFormat::Png,
            jpeg_quality: None,
            scale: 1.0,
            max_retries: 1,
            frame_timeout_ms: DEFAULT_FRAME_TIMEOUT_MS,
            cache_dir: std::env::temp_dir().join("framecast-assets"),
            input_props: serde_json::Value::Object(Default::default()),
            env: BTreeMap::new(),
            forward_diagnostics: false,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> FramecastResult<()> {
        if self.every_nth_frame == 0 {
            return Err(FramecastError::configuration(
                "every_nth_frame must be >= 1",
            ));
        }
        if let Some(q) = self.jpeg_quality {
            if self.image_format != ImageFormat::Jpeg {
                return Err(FramecastError::configuration(
                    "jpeg_quality is only valid with image_format 'jpeg'",
                ));
            }
            if q > 100 {
                return Err(FramecastError::configuration(format!(
                    "jpeg_quality must be in 0..=100 (got {q})"
                )));
            }
        }
        if !self.scale.is_finite() || self.scale <= 0.0 || self.scale > MAX_SCALE {
            return Err(FramecastError::configuration(format!(
                "scale must be in (0, {MAX_SCALE}] (got {})",
                self.scale
            )));
        }
        if self.cpu_budget == Some(0) {
            return Err(FramecastError::configuration("cpu_budget must be >= 1"));
        }
        if self.frame_timeout_ms == 0 {
            return Err(FramecastError::configuration(
                "frame_timeout_ms must be > 0",
            ));
        }
        Ok(())
    }

    /// Worker count before clamping to the plan size.
    pub fn resolve_concurrency(&self) -> FramecastResult<usize> {
        match self.cpu_budget {
            Some(cpus) => self.concurrency.resolve(cpus),
            None => self.concurrency.resolve_for_host(),
        }
    }

    /// Quality to pass to JPEG captures.
    pub fn effective_jpeg_quality(&self) -> u8 {
        self.jpeg_quality.unwrap_or(DEFAULT_JPEG_QUALITY)
    }

    pub fn viewport(&self, comp: &CompositionSpec) -> FramecastResult<Viewport> {
        Viewport::new(comp.width, comp.height, self.scale)
    }

    pub fn frame_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.frame_timeout_ms)
    }
}

/// Where captured frames go, as requested by the caller.
///
/// At most one of the two may be set; see [`OutputTargets::resolve`].
#[derive(Clone, Default)]
pub struct OutputTargets {
    pub directory: Option<PathBuf>,
    pub buffer_sink: Option<Arc<dyn FrameBufferSink>>,
}

impl std::fmt::Debug for OutputTargets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputTargets")
            .field("directory", &self.directory)
            .field("buffer_sink", &self.buffer_sink.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

impl OutputTargets {
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            directory: Some(dir.into()),
            buffer_sink: None,
        }
    }

    pub fn buffer(sink: Arc<dyn FrameBufferSink>) -> Self {
        Self {
            directory: None,
            buffer_sink: Some(sink),
        }
    }

    /// Validate against the capture format and collapse into one [`OutputMode`].
    pub fn resolve(self, format: ImageFormat) -> FramecastResult<OutputMode> {
        match (self.directory, self.buffer_sink) {
            (Some(_), Some(_)) => Err(FramecastError::configuration(
                "output directory and frame buffer sink are mutually exclusive",
            )),
            (Some(_), None) | (None, Some(_)) if !format.captures() => {
                Err(FramecastError::configuration(
                    "image_format 'none' does not produce frames; remove the output target",
                ))
            }
            (Some(dir), None) => Ok(OutputMode::Directory(dir)),
            (None, Some(sink)) => Ok(OutputMode::Buffer(sink)),
            (None, None) if format.captures() => Err(FramecastError::configuration(
                "an output directory or a frame buffer sink is required when capturing frames",
            )),
            (None, None) => Ok(OutputMode::Discard),
        }
    }
}

/// Validated output mode.
#[derive(Clone)]
pub enum OutputMode {
    /// Each worker writes its capture to a file in this directory.
    Directory(PathBuf),
    /// Captures come back as bytes and are handed to the sink.
    Buffer(Arc<dyn FrameBufferSink>),
    /// Nothing is captured (`image_format = none`).
    Discard,
}

impl std::fmt::Debug for OutputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(dir) => f.debug_tuple("Directory").field(dir).finish(),
            Self::Buffer(_) => f.write_str("Buffer(<sink>)"),
            Self::Discard => f.write_str("Discard"),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/options.rs"]
mod tests;
