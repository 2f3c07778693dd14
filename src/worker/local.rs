//! In-process worker provider.
//!
//! Frames are produced by a [`FrameProgram`] on the blocking thread pool and encoded with the
//! `image` crate. A [`LocalHost`] can be crashed on demand, after which every session it opened
//! fails with [`WorkerError::HostCrashed`].

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::assets::AssetDescriptor;
use crate::foundation::core::{FrameIndex, Viewport};
use crate::render::options::ImageFormat;
use crate::worker::{
    CaptureRequest, CaptureTarget, CrashCallback, Diagnostic, DiagnosticCallback,
    DiagnosticLevel, Host, SessionInputs, Worker, WorkerError, WorkerProvider,
};

/// Deterministic frame source driven by [`LocalProvider`].
pub trait FrameProgram: Send + Sync + 'static {
    /// Draw `frame` at `width x height` pixels.
    fn render(&self, frame: FrameIndex, inputs: &SessionInputs, width: u32, height: u32)
    -> RgbaImage;

    /// Assets referenced while drawing `frame`.
    fn assets(&self, _frame: FrameIndex, _inputs: &SessionInputs) -> Vec<AssetDescriptor> {
        Vec::new()
    }
}

/// Provider whose hosts live in the current process.
pub struct LocalProvider {
    program: Arc<dyn FrameProgram>,
    hosts_launched: AtomicU64,
    current: Mutex<Option<Arc<LocalHost>>>,
}

impl LocalProvider {
    pub fn new(program: Arc<dyn FrameProgram>) -> Self {
        Self {
            program,
            hosts_launched: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Number of hosts created so far.
    pub fn hosts_launched(&self) -> u64 {
        self.hosts_launched.load(Ordering::SeqCst)
    }

    /// Most recently launched host.
    pub fn current_host(&self) -> Option<Arc<LocalHost>> {
        self.current.lock().ok().and_then(|g| g.clone())
    }
}

#[async_trait]
impl WorkerProvider for LocalProvider {
    async fn create_host(&self) -> Result<Arc<dyn Host>, WorkerError> {
        let generation = self.hosts_launched.fetch_add(1, Ordering::SeqCst);
        let host = Arc::new(LocalHost {
            generation,
            program: self.program.clone(),
            state: Arc::new(HostState::default()),
        });
        if let Ok(mut current) = self.current.lock() {
            *current = Some(host.clone());
        }
        tracing::debug!(generation, "local host launched");
        Ok(host)
    }
}

#[derive(Default)]
struct HostState {
    crashed: AtomicBool,
    closed: AtomicBool,
    crash_callbacks: Mutex<Vec<CrashCallback>>,
}

impl HostState {
    fn ensure_alive(&self) -> Result<(), WorkerError> {
        if self.crashed.load(Ordering::SeqCst) {
            return Err(WorkerError::host_crashed("local host crashed"));
        }
        if self.closed.load(Ordering::SeqCst) {
            return Err(WorkerError::host_crashed("local host closed"));
        }
        Ok(())
    }
}

/// In-process host.
pub struct LocalHost {
    generation: u64,
    program: Arc<dyn FrameProgram>,
    state: Arc<HostState>,
}

impl LocalHost {
    /// Launch order of this host, starting at 0.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Simulate losing the host: fire crash callbacks and fail every session from now on.
    pub fn crash(&self) {
        if self.state.crashed.swap(true, Ordering::SeqCst) {
            return;
        }
        let callbacks = self
            .state
            .crash_callbacks
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default();
        for cb in callbacks {
            cb();
        }
    }
}

#[async_trait]
impl Host for LocalHost {
    async fn new_session(&self) -> Result<Arc<dyn Worker>, WorkerError> {
        self.state.ensure_alive()?;
        Ok(Arc::new(LocalWorker {
            program: self.program.clone(),
            host: self.state.clone(),
            session: Mutex::new(SessionState::default()),
            diagnostics: Mutex::new(Vec::new()),
        }))
    }

    fn on_crash(&self, callback: CrashCallback) {
        if let Ok(mut cbs) = self.state.crash_callbacks.lock() {
            cbs.push(callback);
        }
    }

    async fn close(&self) -> Result<(), WorkerError> {
        self.state.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct SessionState {
    viewport: Option<Viewport>,
    inputs: SessionInputs,
    frame: Option<FrameIndex>,
    closed: bool,
}

struct LocalWorker {
    program: Arc<dyn FrameProgram>,
    host: Arc<HostState>,
    session: Mutex<SessionState>,
    diagnostics: Mutex<Vec<DiagnosticCallback>>,
}

impl LocalWorker {
    fn with_session<T>(
        &self,
        f: impl FnOnce(&mut SessionState) -> Result<T, WorkerError>,
    ) -> Result<T, WorkerError> {
        self.host.ensure_alive()?;
        let mut session = self
            .session
            .lock()
            .map_err(|_| WorkerError::failed("session state poisoned"))?;
        if session.closed {
            return Err(WorkerError::failed("session closed"));
        }
        f(&mut session)
    }

    fn emit(&self, level: DiagnosticLevel, message: String) {
        let callbacks = self
            .diagnostics
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default();
        for cb in callbacks {
            cb(Diagnostic {
                level,
                message: message.clone(),
            });
        }
    }
}

#[async_trait]
impl Worker for LocalWorker {
    async fn configure(&self, viewport: Viewport) -> Result<(), WorkerError> {
        self.with_session(|s| {
            s.viewport = Some(viewport);
            Ok(())
        })
    }

    async fn inject(&self, inputs: &SessionInputs) -> Result<(), WorkerError> {
        self.with_session(|s| {
            s.inputs = inputs.clone();
            Ok(())
        })
    }

    async fn seek(&self, frame: FrameIndex) -> Result<(), WorkerError> {
        self.with_session(|s| {
            s.frame = Some(frame);
            Ok(())
        })?;
        self.emit(DiagnosticLevel::Debug, format!("seeked to frame {frame}"));
        Ok(())
    }

    async fn capture(&self, request: &CaptureRequest) -> Result<Option<Vec<u8>>, WorkerError> {
        let (frame, viewport, inputs) = self.with_session(|s| {
            let frame = s
                .frame
                .ok_or_else(|| WorkerError::failed("capture before seek"))?;
            let viewport = s
                .viewport
                .ok_or_else(|| WorkerError::failed("capture before configure"))?;
            Ok((frame, viewport, s.inputs.clone()))
        })?;
        if !request.format.captures() {
            return Ok(None);
        }

        let program = self.program.clone();
        let format = request.format;
        let quality = request.jpeg_quality;
        let bytes = tokio::task::spawn_blocking(move || {
            let (w, h) = viewport.scaled_size();
            let img = program.render(frame, &inputs, w, h);
            encode_image(&img, format, quality)
        })
        .await
        .map_err(|e| WorkerError::failed(format!("render task panicked: {e}")))??;

        // A crash while the frame was drawing invalidates the capture.
        self.host.ensure_alive()?;

        match &request.target {
            CaptureTarget::Memory => Ok(Some(bytes)),
            CaptureTarget::File(path) => {
                tokio::fs::write(path, &bytes).await.map_err(|e| {
                    WorkerError::failed(format!("write '{}': {e}", path.display()))
                })?;
                Ok(None)
            }
        }
    }

    async fn collect_assets(&self, frame: FrameIndex) -> Result<Vec<AssetDescriptor>, WorkerError> {
        let inputs = self.with_session(|s| Ok(s.inputs.clone()))?;
        Ok(self.program.assets(frame, &inputs))
    }

    fn on_diagnostic(&self, callback: DiagnosticCallback) {
        if let Ok(mut cbs) = self.diagnostics.lock() {
            cbs.push(callback);
        }
    }

    async fn close(&self) -> Result<(), WorkerError> {
        if let Ok(mut s) = self.session.lock() {
            s.closed = true;
        }
        Ok(())
    }
}

fn encode_image(img: &RgbaImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>, WorkerError> {
    let mut out = Cursor::new(Vec::new());
    let (w, h) = img.dimensions();
    let res = match format {
        ImageFormat::Png => image::codecs::png::PngEncoder::new(&mut out).write_image(
            img.as_raw(),
            w,
            h,
            ExtendedColorType::Rgba8,
        ),
        ImageFormat::Jpeg => {
            let rgb = image::DynamicImage::ImageRgba8(img.clone()).to_rgb8();
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.clamp(1, 100))
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
        }
        ImageFormat::Webp => image::codecs::webp::WebPEncoder::new_lossless(&mut out)
            .write_image(img.as_raw(), w, h, ExtendedColorType::Rgba8),
        ImageFormat::None => return Ok(Vec::new()),
    };
    res.map_err(|e| WorkerError::failed(format!("encode {}: {e}", format.extension())))?;
    Ok(out.into_inner())
}

#[cfg(test)]
#[path = "../../tests/unit/worker/local.rs"]
mod tests;
