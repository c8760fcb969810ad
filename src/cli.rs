use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::clock::FrameClock;
use crate::palette;
use crate::render_job::{run_render_job, RenderJobSpec};
use crate::scene::LogSink;
use crate::scripting::ScriptCompiler;
use crate::viewer::{ViewerConfig, VoxelViewer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Viewer configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a voxel script and print its diagnostics as JSON
    Check {
        /// Script file
        #[arg(long)]
        script: PathBuf,
    },

    /// Render a script to OBJ files
    Render {
        /// Script file
        #[arg(long)]
        script: PathBuf,

        /// Output directory for frames
        #[arg(long)]
        out: PathBuf,

        /// Lattice half-size (overrides config)
        #[arg(long)]
        extent: Option<i32>,

        /// Export every animation frame
        #[arg(long)]
        animate: bool,

        /// Frame count when animating (overrides config)
        #[arg(long)]
        frames: Option<usize>,
    },

    /// Run a render job described by a JSON file
    Job {
        /// Job spec file
        #[arg(long)]
        spec: PathBuf,
    },

    /// Play an animation against the playback clock, logging each frame
    Play {
        /// Script file
        #[arg(long)]
        script: PathBuf,

        /// Lattice half-size (overrides config)
        #[arg(long)]
        extent: Option<i32>,

        /// Number of clock ticks to run
        #[arg(long, default_value_t = 40)]
        ticks: u32,

        /// Tick period in milliseconds (overrides config)
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// List the color palette
    Palette,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Check { script } => check_script(&script, &config),
        Commands::Render {
            script,
            out,
            extent,
            animate,
            frames,
        } => {
            let mut spec = RenderJobSpec::new(script, out);
            spec.extent = extent.unwrap_or(config.extent);
            spec.animate = animate;
            spec.frame_count = frames.unwrap_or(config.frame_count);
            run_job(&spec)
        }
        Commands::Job { spec } => {
            let spec = RenderJobSpec::from_file(&spec).map_err(anyhow::Error::msg)?;
            run_job(&spec)
        }
        Commands::Play {
            script,
            extent,
            ticks,
            interval_ms,
        } => {
            let mut config = config;
            if let Some(extent) = extent {
                config.extent = extent;
            }
            if let Some(ms) = interval_ms {
                config.tick_interval_ms = ms;
            }
            play(&script, config, ticks)
        }
        Commands::Palette => {
            for (code, color) in palette::entries() {
                println!("{:>2}  {:<13} {}", code, color.name, color.hex());
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ViewerConfig> {
    let Some(path) = path else {
        return Ok(ViewerConfig::default());
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse config {:?}", path))
}

fn read_script(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script {:?}", path))
}

fn check_script(path: &Path, config: &ViewerConfig) -> Result<()> {
    let source = read_script(path)?;
    match ScriptCompiler::with_limits(&config.limits).compile(&source) {
        Ok(_) => {
            println!("[]");
            Ok(())
        }
        Err(diag) => {
            println!("{}", serde_json::to_string_pretty(&diag.diagnostics)?);
            anyhow::bail!("{} compile error(s)", diag.diagnostics.len())
        }
    }
}

fn run_job(spec: &RenderJobSpec) -> Result<()> {
    println!("Rendering {:?} to {:?}...", spec.script_path, spec.output_dir);
    let metadata = run_render_job(spec)?;
    for warning in &metadata.warnings {
        println!("Warning: {}", warning);
    }
    println!(
        "\nDone. {} frame(s) in {:.2}s",
        metadata.frame_count, metadata.render_duration_secs
    );
    Ok(())
}

fn play(path: &Path, config: ViewerConfig, ticks: u32) -> Result<()> {
    let source = read_script(path)?;
    let interval = Duration::from_millis(config.tick_interval_ms);

    let mut viewer = VoxelViewer::new(config);
    if !viewer.set_script(source) {
        anyhow::bail!("Script failed to compile:\n{}", viewer.compile_error());
    }
    viewer.set_animation_enabled(true);
    if let Some(err) = viewer.evaluation_error() {
        anyhow::bail!("Animation build failed: {}", err);
    }

    let mut sink = LogSink::default();
    let mut clock = FrameClock::new(interval, Instant::now());
    let mut remaining = ticks;
    while remaining > 0 {
        std::thread::sleep(clock.until_next(Instant::now()));
        let due = clock.poll(Instant::now()).min(remaining);
        for _ in 0..due {
            viewer.tick(&mut sink)?;
        }
        remaining -= due;
    }

    println!("Presented {} frame(s)", sink.presented);
    Ok(())
}
