use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;

use glyphfield::coordinator::FrameStats;
use glyphfield::frame_text::FrameText;
use glyphfield::scene::{load_and_validate_scene, Scene};
use glyphfield::surface::write_png;
use glyphfield::{compute_region, logging, BackendKind, PatternRegistry, RenderCoordinator};

#[derive(Debug, Parser)]
#[command(name = "glyphfield")]
#[command(about = "Procedural character-grid renderer")]
struct Cli {
    /// Raise log level to debug (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a scene to numbered PNG frames.
    Render {
        scene: PathBuf,
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
        /// Override the scene's frame count.
        #[arg(long)]
        frames: Option<u32>,
        #[arg(long, value_enum)]
        backend: Option<BackendArg>,
        /// Print a JSON summary instead of a sentence.
        #[arg(long)]
        json: bool,
    },
    /// Print frames as text grids.
    Preview {
        scene: PathBuf,
        #[arg(long)]
        frames: Option<u32>,
    },
    /// Validate a scene file.
    Check { scene: PathBuf },
    /// List available patterns.
    Patterns,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Software,
    Accelerated,
    Headless,
}

impl From<BackendArg> for BackendKind {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Software => Self::Software,
            BackendArg::Accelerated => Self::Accelerated,
            BackendArg::Headless => Self::Headless,
        }
    }
}

#[derive(Debug, Serialize)]
struct RenderSummary {
    scene: String,
    output: String,
    pattern: &'static str,
    backend: &'static str,
    fallback_reason: Option<String>,
    width: u32,
    height: u32,
    columns: u32,
    rows: u32,
    frames_written: usize,
    stats: FrameStats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Render {
            scene,
            output,
            frames,
            backend,
            json,
        } => run_render(&scene, &output, frames, backend.map(BackendKind::from), json),
        Commands::Preview { scene, frames } => run_preview(&scene, frames),
        Commands::Check { scene } => run_check(&scene),
        Commands::Patterns => run_patterns(),
    }
}

fn load_scene(path: &Path, frames: Option<u32>) -> Result<Scene> {
    let mut scene = load_and_validate_scene(path)?;
    if let Some(frames) = frames {
        scene.frames = frames.max(1);
    }
    Ok(scene)
}

fn run_render(
    scene_path: &Path,
    output_dir: &Path,
    frames: Option<u32>,
    backend: Option<BackendKind>,
    json: bool,
) -> Result<()> {
    let mut scene = load_scene(scene_path, frames)?;
    if let Some(backend) = backend {
        scene.renderer.backend = backend;
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let mut coordinator = scene.build_coordinator()?;
    let control = coordinator.control_handle();
    let mut frames_written = 0_usize;
    for frame_index in 0..scene.frames {
        for event in scene.events_at(frame_index) {
            control.set_options(event.set.clone());
        }
        coordinator.tick(scene.frame_timestamp_ms(frame_index))?;

        if let Some(rgba) = coordinator.read_rgba()? {
            let size = coordinator.surface_size();
            let path = output_dir.join(format!("frame_{frame_index:05}.png"));
            write_png(&path, size.width, size.height, rgba)?;
            frames_written += 1;
        }
        if frame_index % scene.fps == 0 {
            info!(frame = frame_index + 1, total = scene.frames, "rendered frame");
        }
    }

    let size = coordinator.surface_size();
    let region = *coordinator.region();
    let summary = RenderSummary {
        scene: scene_path.display().to_string(),
        output: output_dir.display().to_string(),
        pattern: coordinator.pattern().id(),
        backend: coordinator.backend().label(),
        fallback_reason: coordinator.backend().fallback_reason().map(str::to_owned),
        width: size.width,
        height: size.height,
        columns: region.columns,
        rows: region.rows,
        frames_written,
        stats: coordinator.stats(),
    };
    coordinator.destroy();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Wrote {} frames to {} ({} rendered, {} skipped, {} backend)",
            summary.frames_written,
            summary.output,
            summary.stats.renders,
            summary.stats.skipped,
            summary.backend
        );
        if let Some(reason) = &summary.fallback_reason {
            println!("Fallback: {reason}");
        }
    }
    Ok(())
}

fn run_preview(scene_path: &Path, frames: Option<u32>) -> Result<()> {
    let mut scene = load_scene(scene_path, frames)?;
    scene.renderer.backend = BackendKind::Headless;

    let mut coordinator: RenderCoordinator = scene.build_coordinator()?;
    let control = coordinator.control_handle();
    for frame_index in 0..scene.frames {
        for event in scene.events_at(frame_index) {
            control.set_options(event.set.clone());
        }
        coordinator.tick(scene.frame_timestamp_ms(frame_index))?;
        let text = FrameText::capture(coordinator.last_frame(), coordinator.region());
        println!("--- frame {frame_index} ---");
        print!("{}", text.to_text());
    }
    coordinator.destroy();
    Ok(())
}

fn run_check(scene_path: &Path) -> Result<()> {
    let scene = load_and_validate_scene(scene_path)?;
    let fonts = scene.font_book()?;
    let pattern = scene.pattern();
    let region = compute_region(
        scene.surface,
        scene.renderer.font_size,
        &fonts.face(&scene.renderer.font_family),
        pattern.glyph_set().as_slice(),
        scene.renderer.spacing,
        scene
            .renderer
            .padding
            .unwrap_or_else(|| pattern.recommended_padding()),
    );

    println!(
        "OK: {} ({}x{}, {} fps, {} frames, pattern {})",
        scene_path.display(),
        scene.surface.width,
        scene.surface.height,
        scene.fps,
        scene.frames,
        pattern.id()
    );
    println!(
        "Grid: {} columns x {} rows (spacing {}x{})",
        region.columns, region.rows, region.spacing_x, region.spacing_y
    );
    println!("Timeline events: {}", scene.timeline.len());
    Ok(())
}

fn run_patterns() -> Result<()> {
    for key in PatternRegistry::builtin().keys() {
        println!("{key}");
    }
    Ok(())
}
