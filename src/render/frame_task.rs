//! Per-frame unit of work and its retry policy.
//!
//! `Pending -> Acquiring -> Rendering -> (Success | Retrying | Failed | Cancelled)`. Only a
//! crash-class failure loops back through `Retrying`, after the host has been replaced.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::assets::{AssetDescriptor, DiscoveredAssets};
use crate::foundation::core::FrameIndex;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::render::options::OutputMode;
use crate::render::run::RunContext;
use crate::render::sink::FrameBuffer;
use crate::worker::{CaptureRequest, CaptureTarget, Worker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TaskState {
    Pending,
    Acquiring,
    Rendering,
    Success,
    Retrying,
    Failed,
    Cancelled,
}

/// One planned frame on its way through the pool.
#[derive(Clone, Debug)]
pub(crate) struct FrameTask {
    pub(crate) position: usize,
    pub(crate) frame: FrameIndex,
    pub(crate) output_index: u64,
    pub(crate) attempt: u32,
    pub(crate) retries_remaining: u32,
    state: TaskState,
}

impl FrameTask {
    pub(crate) fn new(ctx: &RunContext, position: usize) -> Self {
        Self {
            position,
            frame: ctx.plan.frames()[position],
            output_index: ctx.plan.output_index(position),
            attempt: 0,
            retries_remaining: ctx.options.max_retries,
            state: TaskState::Pending,
        }
    }

    fn enter(&mut self, state: TaskState) {
        tracing::trace!(frame = self.frame.0, from = ?self.state, to = ?state, "frame task state");
        self.state = state;
    }
}

struct Captured {
    bytes: Option<Vec<u8>>,
    assets: Vec<AssetDescriptor>,
}

/// Drive one planned frame to a terminal state.
#[tracing::instrument(name = "frame", skip(ctx), fields(frame))]
pub(crate) async fn run_frame_task(ctx: Arc<RunContext>, position: usize) -> FramecastResult<()> {
    let mut task = FrameTask::new(&ctx, position);
    tracing::Span::current().record("frame", task.frame.0);

    let res = drive(&ctx, &mut task).await;
    match &res {
        Ok(()) => task.enter(TaskState::Success),
        Err(FramecastError::Cancelled) => task.enter(TaskState::Cancelled),
        Err(_) => task.enter(TaskState::Failed),
    }
    res
}

async fn drive(ctx: &RunContext, task: &mut FrameTask) -> FramecastResult<()> {
    loop {
        ctx.cancel.check()?;
        ctx.assets.check()?;

        task.attempt += 1;
        task.enter(TaskState::Acquiring);
        let lease = ctx.cancel.race(ctx.coordinator.pool().acquire()).await?;
        let epoch = lease.handle().epoch();

        task.enter(TaskState::Rendering);
        tracing::debug!(
            attempt = task.attempt,
            slot = lease.handle().slot(),
            epoch,
            "rendering frame"
        );
        let started = Instant::now();
        let outcome = ctx
            .cancel
            .race(capture_with_timeout(ctx, task, lease.worker()))
            .await;
        drop(lease);

        let err = match outcome {
            Ok(captured) => return finish(ctx, task, captured, started),
            Err(err) => err,
        };
        if err.is_cancelled() {
            return Err(err);
        }
        if !(err.is_crash() || ctx.coordinator.host_lost(epoch)) {
            return Err(err);
        }
        if task.retries_remaining == 0 {
            return Err(FramecastError::fatal(format!(
                "frame {} failed after {} attempt(s): {err}",
                task.frame, task.attempt
            )));
        }

        task.retries_remaining -= 1;
        ctx.retries.fetch_add(1, Ordering::SeqCst);
        task.enter(TaskState::Retrying);
        tracing::warn!(
            attempt = task.attempt,
            retries_remaining = task.retries_remaining,
            error = %err,
            "worker host lost while rendering, retrying"
        );
        ctx.progress.on_retry(task.frame, task.attempt + 1);
        ctx.coordinator.recover(epoch).await?;
    }
}

async fn capture_with_timeout(
    ctx: &RunContext,
    task: &FrameTask,
    worker: &Arc<dyn Worker>,
) -> FramecastResult<Captured> {
    let budget = ctx.options.frame_timeout();
    match tokio::time::timeout(budget, capture(ctx, task, worker)).await {
        Ok(res) => res,
        Err(_) => Err(FramecastError::fatal(format!(
            "frame {} timed out after {} ms",
            task.frame,
            budget.as_millis()
        ))),
    }
}

async fn capture(
    ctx: &RunContext,
    task: &FrameTask,
    worker: &Arc<dyn Worker>,
) -> FramecastResult<Captured> {
    worker.seek(task.frame).await?;

    let target = match &ctx.output {
        OutputMode::Directory(dir) => Some(CaptureTarget::File(
            dir.join(ctx.plan.file_name(task.output_index, ctx.options.image_format)),
        )),
        OutputMode::Buffer(_) => Some(CaptureTarget::Memory),
        OutputMode::Discard => None,
    };
    let bytes = match target {
        Some(target) => {
            let memory = target == CaptureTarget::Memory;
            let bytes = worker
                .capture(&CaptureRequest {
                    target,
                    format: ctx.options.image_format,
                    jpeg_quality: ctx.options.effective_jpeg_quality(),
                })
                .await?;
            if memory && bytes.is_none() {
                return Err(FramecastError::fatal(format!(
                    "worker returned no bytes for in-memory capture of frame {}",
                    task.frame
                )));
            }
            bytes
        }
        None => None,
    };

    let assets = worker.collect_assets(task.frame).await?;
    Ok(Captured { bytes, assets })
}

fn finish(
    ctx: &RunContext,
    task: &FrameTask,
    captured: Captured,
    started: Instant,
) -> FramecastResult<()> {
    if let (OutputMode::Buffer(sink), Some(bytes)) = (&ctx.output, captured.bytes) {
        sink.on_frame(FrameBuffer {
            frame: task.frame,
            output_index: task.output_index,
            bytes,
        })?;
    }

    let assets = ctx.assets.submit(captured.assets);
    ctx.slots[task.position]
        .set(DiscoveredAssets {
            output_index: task.output_index,
            frame: task.frame,
            assets,
        })
        .map_err(|_| {
            FramecastError::fatal(format!(
                "asset slot for output index {} written twice",
                task.output_index
            ))
        })?;

    let rendered = ctx.rendered.fetch_add(1, Ordering::SeqCst) + 1;
    ctx.progress
        .on_frame_rendered(rendered, task.frame, started.elapsed());
    tracing::debug!(attempt = task.attempt, rendered, "frame rendered");
    Ok(())
}
