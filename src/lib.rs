//! Framecast drives a parametrized visual program frame by frame through a small pool of
//! expensive, crash-prone rendering workers and hands the encoder an ordered manifest.
//!
//! - Describe the timeline with a [`CompositionSpec`] and tune the run with [`RenderOptions`]
//! - Supply a [`WorkerProvider`] (or the in-process [`LocalProvider`]) and an [`AssetResolver`]
//! - Call [`render_frames`] and consume the [`RenderManifest`]
#![forbid(unsafe_code)]

mod foundation;

pub mod assets;
/// Cooperative run cancellation.
pub mod cancel;
pub mod plan;
/// Pool, recovery, scheduling, and aggregation.
pub mod render;
pub mod worker;

pub use crate::foundation::core::{FrameIndex, Viewport};
pub use crate::foundation::error::{FramecastError, FramecastResult};

pub use crate::assets::pipeline::AssetPipeline;
pub use crate::assets::resolver::{AssetResolver, FsAssetResolver};
pub use crate::assets::{
    AssetDescriptor, AssetFingerprint, AssetKind, AssetRecord, ResolvedAsset,
};
pub use crate::cancel::CancelSignal;
pub use crate::plan::{FRAME_FILE_PREFIX, FrameRange, NumberingMode, RenderPlan};
pub use crate::render::manifest::{RenderManifest, RunStats};
pub use crate::render::options::{
    CompositionSpec, Concurrency, ImageFormat, OutputMode, OutputTargets, RenderOptions,
};
pub use crate::render::pool::{PoolLease, WorkerHandle, WorkerPool, WorkerPoolStats};
pub use crate::render::progress::{NoProgress, ProgressObserver};
pub use crate::render::run::{RenderRequest, render_frames};
pub use crate::render::sink::{FrameBuffer, FrameBufferSink, InMemorySink};
pub use crate::worker::local::{FrameProgram, LocalHost, LocalProvider};
pub use crate::worker::{
    CaptureRequest, CaptureTarget, CrashCallback, Diagnostic, DiagnosticCallback,
    DiagnosticLevel, Host, SessionInputs, Worker, WorkerError, WorkerProvider,
};
