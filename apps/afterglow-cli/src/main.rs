mod demo;

use afterglow_common::Viewport;
use afterglow_render::{
    BloomParameters, CpuBackend, FrameImage, FrameOrchestrator, FrameOutcome, RenderBackend,
    TagStore,
};
use afterglow_render_wgpu::{GpuContext, WgpuBackend};
use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "afterglow-cli", about = "Headless driver for the selective bloom compositor")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print crate versions
    Info,
    /// Render the demo scene and write the last presented frame as PNG
    Render(RenderArgs),
    /// Load and validate a bloom parameters file
    CheckConfig {
        /// YAML or JSON parameters file
        path: PathBuf,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum BackendKind {
    Cpu,
    Wgpu,
}

/// A resize applied before the given tick (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ResizeEvent {
    frame: u64,
    viewport: Viewport,
}

fn parse_resize(s: &str) -> Result<ResizeEvent, String> {
    let (frame, size) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FRAME=WxH, got '{s}'"))?;
    let (width, height) = size
        .split_once('x')
        .ok_or_else(|| format!("expected WxH after '=', got '{size}'"))?;
    Ok(ResizeEvent {
        frame: parse_number(frame)?,
        viewport: Viewport::new(parse_number(width)?, parse_number(height)?),
    })
}

fn parse_number<T>(v: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    v.trim().parse().map_err(|e| format!("'{v}': {e}"))
}

#[derive(Args)]
struct RenderArgs {
    #[arg(long, default_value_t = 320)]
    width: u32,
    #[arg(long, default_value_t = 240)]
    height: u32,
    /// Number of ticks to run
    #[arg(short, long, default_value_t = 1)]
    frames: u64,
    /// Bloom parameters file (YAML or JSON); defaults when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Where to write the last presented frame
    #[arg(short, long, default_value = "afterglow.png")]
    output: PathBuf,
    #[arg(long, value_enum, default_value_t = BackendKind::Cpu)]
    backend: BackendKind,
    /// Resize before a tick, e.g. `--resize-at 3=640x480`
    #[arg(long = "resize-at", value_parser = parse_resize)]
    resize_at: Vec<ResizeEvent>,
}

#[derive(Debug, Default, PartialEq, Eq)]
struct RunSummary {
    presented: u64,
    skipped: u64,
    dropped: u64,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            println!("afterglow-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("scene: {}", afterglow_scene::crate_info());
            println!("render: {}", afterglow_render::crate_info());
            println!("render-wgpu: {}", afterglow_render_wgpu::crate_info());
        }
        Commands::Render(args) => render(&args)?,
        Commands::CheckConfig { path } => {
            let params = load_params(Some(&path))?;
            println!("{}: ok", path.display());
            print_params(&params);
        }
    }

    Ok(())
}

fn load_params(path: Option<&Path>) -> anyhow::Result<BloomParameters> {
    match path {
        Some(path) => BloomParameters::load(path)
            .with_context(|| format!("failed to load bloom parameters from {}", path.display())),
        None => Ok(BloomParameters::default()),
    }
}

fn print_params(params: &BloomParameters) {
    println!("  threshold: {}", params.threshold());
    println!("  strength:  {}", params.strength());
    println!("  radius:    {}", params.radius());
    println!("  exposure:  {}", params.exposure());
}

fn render(args: &RenderArgs) -> anyhow::Result<()> {
    let params = load_params(args.config.as_deref())?;
    let viewport = Viewport::new(args.width, args.height);

    let (summary, image) = match args.backend {
        BackendKind::Cpu => {
            let orch = FrameOrchestrator::new(CpuBackend::new(), params, TagStore::default(), viewport);
            drive(orch, args, |backend| Ok(backend.presented().cloned()))?
        }
        BackendKind::Wgpu => {
            let ctx = pollster::block_on(GpuContext::headless()).context("failed to initialize GPU")?;
            tracing::info!(adapter = %ctx.adapter_info.name, "using wgpu backend");
            let backend = WgpuBackend::new(ctx.device, ctx.queue);
            let orch = FrameOrchestrator::new(backend, params, TagStore::default(), viewport);
            drive(orch, args, |backend| {
                if backend.presented_count() == 0 {
                    return Ok(None);
                }
                backend
                    .read_presented()
                    .map(Some)
                    .context("failed to read back presented frame")
            })?
        }
    };

    println!(
        "frames: {} presented, {} skipped, {} dropped",
        summary.presented, summary.skipped, summary.dropped
    );
    let image = image.context("no frame was presented; nothing to write")?;
    write_png(&image, &args.output)?;
    println!("wrote {}x{} frame to {}", image.width, image.height, args.output.display());
    Ok(())
}

/// Run every tick, then extract the presented image with `read`.
fn drive<B, F>(
    mut orch: FrameOrchestrator<B>,
    args: &RenderArgs,
    read: F,
) -> anyhow::Result<(RunSummary, Option<FrameImage>)>
where
    B: RenderBackend,
    F: FnOnce(&B) -> anyhow::Result<Option<FrameImage>>,
{
    let mut scene = demo::build_scene().context("failed to build demo scene")?;
    let mut camera = demo::camera();
    camera.set_viewport(Viewport::new(args.width, args.height));

    let summary = run_ticks(&mut orch, &mut scene, &mut camera, args.frames, &args.resize_at)?;
    let image = read(orch.backend())?;
    Ok((summary, image))
}

fn run_ticks<B: RenderBackend>(
    orch: &mut FrameOrchestrator<B>,
    scene: &mut afterglow_scene::Scene,
    camera: &mut afterglow_scene::Camera,
    frames: u64,
    resizes: &[ResizeEvent],
) -> anyhow::Result<RunSummary> {
    let mut summary = RunSummary::default();
    for tick in 1..=frames {
        for event in resizes.iter().filter(|e| e.frame == tick) {
            orch.resize(event.viewport.width, event.viewport.height);
            camera.set_viewport(event.viewport);
        }
        let outcome = orch
            .frame(scene, camera)
            .with_context(|| format!("frame {tick} violated a material invariant"))?;
        match outcome {
            FrameOutcome::Presented(stats) => {
                summary.presented += 1;
                tracing::info!(
                    tick,
                    suppressed = stats.suppressed,
                    glowing = stats.glowing,
                    elapsed_ms = stats.elapsed.as_secs_f64() * 1e3,
                    "presented"
                );
            }
            FrameOutcome::Skipped(err) => {
                summary.skipped += 1;
                println!("frame {tick}: skipped ({err})");
            }
            FrameOutcome::Dropped(err) => {
                summary.dropped += 1;
                println!("frame {tick}: dropped ({err})");
            }
        }
    }
    Ok(summary)
}

fn write_png(frame: &FrameImage, path: &Path) -> anyhow::Result<()> {
    let image = frame
        .to_rgba_image()
        .context("presented frame has inconsistent dimensions")?;
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}
