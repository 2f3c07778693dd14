//! Capability contract of the rendering workers the engine drives.
//!
//! A [`WorkerProvider`] launches a [`Host`]; a host opens [`Worker`] sessions. The engine never
//! looks inside a worker: it only configures it, seeks it to exact frames, captures, and asks which
//! side-channel assets the frame referenced. When a host dies every session it opened dies with it,
//! which workers report as [`WorkerError::HostCrashed`].

pub mod local;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::assets::AssetDescriptor;
use crate::foundation::core::{FrameIndex, Viewport};
use crate::foundation::error::FramecastError;
use crate::render::options::ImageFormat;

/// Failure reported by a worker collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    #[error("host unreachable: {0}")]
    HostCrashed(String),

    #[error("worker operation timed out: {0}")]
    Timeout(String),

    #[error("worker operation failed: {0}")]
    Failed(String),
}

impl WorkerError {
    pub fn host_crashed(msg: impl Into<String>) -> Self {
        Self::HostCrashed(msg.into())
    }

    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    pub fn is_crash(&self) -> bool {
        matches!(self, Self::HostCrashed(_))
    }
}

impl From<WorkerError> for FramecastError {
    fn from(value: WorkerError) -> Self {
        match value {
            WorkerError::HostCrashed(msg) => FramecastError::crash(msg),
            other => FramecastError::fatal(other.to_string()),
        }
    }
}

/// Parameters and environment injected into every session.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SessionInputs {
    pub input_props: serde_json::Value,
    pub env: BTreeMap<String, String>,
}

/// Where a capture should land.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CaptureTarget {
    /// Worker writes the encoded image to this path.
    File(PathBuf),
    /// Worker returns the encoded bytes.
    Memory,
}

/// One capture call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureRequest {
    pub target: CaptureTarget,
    pub format: ImageFormat,
    /// Only consulted for [`ImageFormat::Jpeg`].
    pub jpeg_quality: u8,
}

/// Severity of a worker diagnostic line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line from a worker's diagnostic-log stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
}

pub type DiagnosticCallback = Arc<dyn Fn(Diagnostic) + Send + Sync>;
pub type CrashCallback = Arc<dyn Fn() + Send + Sync>;

/// Launches worker hosts.
#[async_trait]
pub trait WorkerProvider: Send + Sync {
    async fn create_host(&self) -> Result<Arc<dyn Host>, WorkerError>;
}

/// A process or service hosting worker sessions.
#[async_trait]
pub trait Host: Send + Sync {
    /// Open a fresh, unconfigured session.
    async fn new_session(&self) -> Result<Arc<dyn Worker>, WorkerError>;

    /// Register `callback` to run when the host is lost.
    fn on_crash(&self, callback: CrashCallback);

    async fn close(&self) -> Result<(), WorkerError>;
}

/// One reusable rendering session.
///
/// Methods take `&self`; the pool guarantees a single driver at a time.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Set the output surface size and device scale factor.
    async fn configure(&self, viewport: Viewport) -> Result<(), WorkerError>;

    /// Inject input parameters and environment.
    async fn inject(&self, inputs: &SessionInputs) -> Result<(), WorkerError>;

    /// Put the session into the exact state of `frame`. Never relative playback.
    async fn seek(&self, frame: FrameIndex) -> Result<(), WorkerError>;

    /// Capture the current frame. Returns the bytes for [`CaptureTarget::Memory`], `None` for
    /// [`CaptureTarget::File`].
    async fn capture(&self, request: &CaptureRequest) -> Result<Option<Vec<u8>>, WorkerError>;

    /// Side-channel assets referenced by the frame last sought to.
    async fn collect_assets(&self, frame: FrameIndex) -> Result<Vec<AssetDescriptor>, WorkerError>;

    /// Subscribe to the session's diagnostic-log stream.
    fn on_diagnostic(&self, callback: DiagnosticCallback);

    async fn close(&self) -> Result<(), WorkerError>;
}
