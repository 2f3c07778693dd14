//! Run orchestration: plan, pool, bounded frame scheduling, aggregation.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tokio::task::JoinSet;

use crate::assets::pipeline::AssetPipeline;
use crate::assets::resolver::AssetResolver;
use crate::assets::DiscoveredAssets;
use crate::cancel::CancelSignal;
use crate::foundation::error::{FramecastError, FramecastResult};
use crate::plan::RenderPlan;
use crate::render::frame_task::run_frame_task;
use crate::render::manifest::{RenderManifest, RunStats, assemble};
use crate::render::options::{CompositionSpec, OutputMode, OutputTargets, RenderOptions};
use crate::render::progress::{NoProgress, ProgressObserver};
use crate::render::recovery::RecoveryCoordinator;
use crate::render::session_init::SessionSetup;
use crate::worker::{SessionInputs, WorkerProvider};

/// One rendering run as requested by a caller.
#[derive(Clone)]
pub struct RenderRequest {
    pub composition: CompositionSpec,
    pub options: RenderOptions,
    pub output: OutputTargets,
    pub cancel: CancelSignal,
    pub progress: Arc<dyn ProgressObserver>,
}

impl RenderRequest {
    pub fn new(composition: CompositionSpec, options: RenderOptions, output: OutputTargets) -> Self {
        Self {
            composition,
            options,
            output,
            cancel: CancelSignal::new(),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }
}

impl std::fmt::Debug for RenderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderRequest")
            .field("composition", &self.composition)
            .field("options", &self.options)
            .field("output", &self.output)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// State shared by every frame task of one run.
pub(crate) struct RunContext {
    pub(crate) plan: RenderPlan,
    pub(crate) options: RenderOptions,
    pub(crate) output: OutputMode,
    pub(crate) coordinator: Arc<RecoveryCoordinator>,
    pub(crate) assets: Arc<AssetPipeline>,
    /// One per planned frame, filled by the task that owns the position.
    pub(crate) slots: Vec<OnceLock<DiscoveredAssets>>,
    pub(crate) cancel: CancelSignal,
    pub(crate) progress: Arc<dyn ProgressObserver>,
    pub(crate) rendered: AtomicUsize,
    pub(crate) retries: AtomicU32,
}

/// Render every planned frame of `request` and return the ordered manifest.
///
/// Resolves only if every planned frame was rendered and every discovered asset resolved.
/// Otherwise the first failure wins; a fired cancel signal surfaces as
/// [`FramecastError::Cancelled`]. Worker sessions and hosts are closed on every path.
#[tracing::instrument(name = "render", skip_all)]
pub async fn render_frames(
    request: RenderRequest,
    provider: Arc<dyn WorkerProvider>,
    resolver: Arc<dyn AssetResolver>,
) -> FramecastResult<RenderManifest> {
    let RenderRequest {
        composition,
        options,
        output,
        cancel,
        progress,
    } = request;

    options.validate()?;
    let plan = RenderPlan::build(&composition, options.frame_range, options.every_nth_frame)?;
    let output = output.resolve(options.image_format)?;
    let viewport = options.viewport(&composition)?;
    let concurrency = options.resolve_concurrency()?.min(plan.len()).max(1);
    cancel.check()?;

    if let OutputMode::Directory(dir) = &output {
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            FramecastError::configuration(format!(
                "create output directory '{}': {e}",
                dir.display()
            ))
        })?;
    }

    tracing::info!(
        frames = plan.len(),
        concurrency,
        mode = ?plan.numbering_mode(),
        format = ?options.image_format,
        "starting render"
    );

    let setup = Arc::new(SessionSetup {
        viewport,
        inputs: SessionInputs {
            input_props: options.input_props.clone(),
            env: options.env.clone(),
        },
        start_frame: plan.frames()[0],
        forward_diagnostics: options.forward_diagnostics,
        timeout: options.frame_timeout(),
    });
    let coordinator =
        match RecoveryCoordinator::start(provider, concurrency, setup, cancel.clone()).await {
            Ok(c) => c,
            Err(err) if err.is_cancelled() => return Err(err),
            Err(err) => {
                return Err(FramecastError::fatal(format!(
                    "worker pool initialization failed: {err}"
                )));
            }
        };

    let assets = AssetPipeline::new(resolver, options.cache_dir.clone());
    let slots = (0..plan.len()).map(|_| OnceLock::new()).collect();
    let ctx = Arc::new(RunContext {
        plan,
        options,
        output,
        coordinator,
        assets,
        slots,
        cancel,
        progress,
        rendered: AtomicUsize::new(0),
        retries: AtomicU32::new(0),
    });

    ctx.progress.on_start(ctx.plan.len(), concurrency);
    let frames = schedule(&ctx, concurrency).await;
    let resolved = match frames {
        Ok(()) => {
            let barrier = ctx.cancel.race(ctx.assets.finish()).await;
            if barrier.is_err() {
                ctx.assets.abort();
            }
            barrier
        }
        Err(err) => {
            ctx.assets.abort();
            Err(err)
        }
    };
    let pool_stats = ctx.coordinator.pool().stats();
    ctx.coordinator.shutdown().await;

    let resolved = match resolved {
        Ok(r) => r,
        Err(err) => {
            if err.is_cancelled() {
                tracing::info!("render cancelled");
            } else {
                tracing::error!(error = %err, "render failed");
            }
            return Err(err);
        }
    };

    let mut stats = RunStats::from_pool(pool_stats, concurrency);
    stats.frames_rendered = ctx.rendered.load(Ordering::SeqCst);
    stats.retries = ctx.retries.load(Ordering::SeqCst);
    stats.distinct_assets = resolved.len();

    let manifest = assemble(
        &ctx.plan,
        ctx.options.image_format,
        &ctx.slots,
        &resolved,
        stats,
    )?;
    tracing::info!(
        frames = manifest.frame_count,
        assets = stats.distinct_assets,
        retries = stats.retries,
        host_replacements = stats.host_replacements,
        "render finished"
    );
    Ok(manifest)
}

/// Keep at most `concurrency` frame tasks in flight until the plan is exhausted or one fails.
async fn schedule(ctx: &Arc<RunContext>, concurrency: usize) -> FramecastResult<()> {
    let total = ctx.plan.len();
    let mut set = JoinSet::new();
    let mut next = 0usize;
    while next < total && set.len() < concurrency {
        set.spawn(run_frame_task(ctx.clone(), next));
        next += 1;
    }

    while let Some(joined) = set.join_next().await {
        let res = match joined {
            Ok(res) => res,
            Err(e) => Err(FramecastError::fatal(format!("frame task failed to join: {e}"))),
        };
        if let Err(err) = res {
            set.abort_all();
            while set.join_next().await.is_some() {}
            return Err(err);
        }
        if next < total {
            set.spawn(run_frame_task(ctx.clone(), next));
            next += 1;
        }
    }
    Ok(())
}
