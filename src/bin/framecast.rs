use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use framecast::{
    AssetDescriptor, CompositionSpec, FrameIndex, FrameProgram, FsAssetResolver, LocalProvider,
    OutputTargets, ProgressObserver, RenderOptions, RenderPlan, RenderRequest, SessionInputs,
};
use image::{Rgba, RgbaImage};

#[derive(Parser, Debug)]
#[command(name = "framecast", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the frame plan of a job as JSON.
    Plan(PlanArgs),
    /// Render a job's test pattern into a directory of frames plus `manifest.json`.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Render job JSON.
    #[arg(long)]
    config: PathBuf,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Render job JSON.
    #[arg(long)]
    config: PathBuf,

    /// Output directory for frames and the manifest.
    #[arg(long)]
    out: PathBuf,

    /// Log per-frame progress.
    #[arg(long, short = 'v', default_value_t = false)]
    verbose: bool,
}

/// On-disk render job.
#[derive(Debug, serde::Deserialize)]
struct Job {
    composition: CompositionSpec,
    #[serde(default)]
    options: RenderOptions,
    /// Audio files audible over frame spans, reported as side-channel assets.
    #[serde(default)]
    audio: Vec<AudioCue>,
}

#[derive(Clone, Debug, serde::Deserialize)]
struct AudioCue {
    id: String,
    src: String,
    #[serde(default)]
    from: u64,
    /// Inclusive last frame; open-ended when absent.
    to: Option<u64>,
    #[serde(default = "unit_volume")]
    volume: f64,
}

fn unit_volume() -> f64 {
    1.0
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Plan(args) => cmd_plan(args),
        Command::Render(args) => cmd_render(args),
    }
}

fn read_job(path: &Path) -> anyhow::Result<Job> {
    let f = std::fs::File::open(path)
        .with_context(|| format!("open render job '{}'", path.display()))?;
    let job: Job = serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("parse render job '{}'", path.display()))?;
    Ok(job)
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let job = read_job(&args.config)?;
    job.options.validate()?;
    let plan = RenderPlan::build(
        &job.composition,
        job.options.frame_range,
        job.options.every_nth_frame,
    )?;

    let out = serde_json::json!({
        "frames": plan.frames(),
        "numberingMode": plan.numbering_mode(),
        "padWidth": plan.pad_width(),
        "firstOutputIndex": plan.first_output_index(),
        "namingTemplate": plan.naming_template(job.options.image_format),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let level = if args.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let job = read_job(&args.config)?;
    let base_dir = args
        .config
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    let program = Arc::new(TestPattern { audio: job.audio });
    let provider = Arc::new(LocalProvider::new(program));
    let resolver = Arc::new(FsAssetResolver::new(base_dir));
    let request = RenderRequest::new(
        job.composition,
        job.options,
        OutputTargets::directory(&args.out),
    )
    .with_progress(Arc::new(LogProgress));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let manifest = runtime.block_on(framecast::render_frames(request, provider, resolver))?;

    let manifest_path = args.out.join("manifest.json");
    let json = serde_json::to_vec_pretty(&manifest).context("serialize manifest")?;
    std::fs::write(&manifest_path, json)
        .with_context(|| format!("write manifest '{}'", manifest_path.display()))?;

    eprintln!(
        "wrote {} frames to {}",
        manifest.frame_count,
        args.out.display()
    );
    Ok(())
}

/// Built-in program: a moving diagonal gradient plus a frame-indexed progress bar.
struct TestPattern {
    audio: Vec<AudioCue>,
}

impl FrameProgram for TestPattern {
    fn render(
        &self,
        frame: FrameIndex,
        _inputs: &SessionInputs,
        width: u32,
        height: u32,
    ) -> RgbaImage {
        let shift = (frame.0 % 256) as u32;
        let bar = (frame.0 as u32).wrapping_mul(7) % width.max(1);
        RgbaImage::from_fn(width, height, |x, y| {
            if y >= height.saturating_sub(height / 16 + 1) && x <= bar {
                return Rgba([240, 240, 240, 255]);
            }
            let r = ((x * 255 / width.max(1)) + shift) % 256;
            let g = ((y * 255 / height.max(1)) + shift / 2) % 256;
            Rgba([r as u8, g as u8, 128, 255])
        })
    }

    fn assets(&self, frame: FrameIndex, _inputs: &SessionInputs) -> Vec<AssetDescriptor> {
        self.audio
            .iter()
            .filter(|cue| frame.0 >= cue.from && cue.to.is_none_or(|to| frame.0 <= to))
            .map(|cue| {
                let mut d = AssetDescriptor::audio(&cue.id, &cue.src, frame);
                d.volume = cue.volume;
                d.media_frame = frame.0 - cue.from;
                d
            })
            .collect()
    }
}

struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_start(&self, frame_count: usize, concurrency: usize) {
        tracing::info!(frame_count, concurrency, "rendering");
    }

    fn on_frame_rendered(&self, rendered: usize, frame: FrameIndex, elapsed: Duration) {
        tracing::debug!(
            rendered,
            frame = frame.0,
            elapsed_ms = elapsed.as_millis() as u64,
            "frame done"
        );
    }

    fn on_retry(&self, frame: FrameIndex, attempt: u32) {
        tracing::warn!(frame = frame.0, attempt, "retrying frame");
    }
}
