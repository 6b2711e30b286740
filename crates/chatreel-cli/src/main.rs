mod job;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use chatreel_core::JobConfig;
use chatreel_encode::{EncoderLauncher, FfmpegLauncher, MemoryLauncher};
use chatreel_ir::{Tick, Timeline};
use chatreel_script::required_asset_keys;

use crate::job::{plan_timeline, run_job, JobContext, JobDeps};

#[derive(Parser)]
#[command(
    name = "chatreel",
    version,
    about = "Chatreel — render chat scripts as phone-conversation videos"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a job file to video
    Render {
        /// Path to the job .toml file
        #[arg()]
        job: PathBuf,

        /// Output file path (default: output/<job id>.mp4)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Regular font file (overrides [fonts].regular)
        #[arg(long)]
        font: Option<PathBuf>,

        /// Semibold font file (overrides [fonts].semibold)
        #[arg(long)]
        semibold_font: Option<PathBuf>,

        /// Skip the hardware encoder and use libx264 only
        #[arg(long)]
        no_hardware: bool,

        /// Render every frame but discard the encoded output
        #[arg(long)]
        dry_run: bool,
    },

    /// Parse a script and report what would be rendered
    Check {
        /// Path to the chat script
        #[arg()]
        script: PathBuf,

        /// Ignore widget lines
        #[arg(long)]
        no_widget: bool,

        /// Print the frame runs as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// List the inline images a script needs
    Assets {
        /// Path to the chat script
        #[arg()]
        script: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Render {
            job,
            output,
            font,
            semibold_font,
            no_hardware,
            dry_run,
        } => cmd_render(job, output, font, semibold_font, no_hardware, dry_run).await,
        Commands::Check {
            script,
            no_widget,
            json,
        } => cmd_check(script, no_widget, json),
        Commands::Assets { script } => cmd_assets(script),
    }
}

async fn cmd_render(
    job_file: PathBuf,
    output: Option<PathBuf>,
    font: Option<PathBuf>,
    semibold_font: Option<PathBuf>,
    no_hardware: bool,
    dry_run: bool,
) -> Result<()> {
    let mut config = JobConfig::load_from_file(&job_file)
        .with_context(|| format!("failed to load job file: {}", job_file.display()))?;
    if output.is_some() {
        config.output = output;
    }
    if font.is_some() {
        config.fonts.regular = font;
    }
    if semibold_font.is_some() {
        config.fonts.semibold = semibold_font;
    }
    if no_hardware {
        config.capabilities.hardware_codec = false;
    }

    let launcher: Arc<dyn EncoderLauncher> = if dry_run {
        Arc::new(MemoryLauncher::new())
    } else {
        let ffmpeg = FfmpegLauncher::new();
        if !ffmpeg.is_available().await {
            anyhow::bail!("ffmpeg not found on PATH (use --dry-run to render without encoding)");
        }
        Arc::new(ffmpeg)
    };
    let deps = JobDeps::from_config(&config, launcher).context("failed to prepare renderer (is a font configured? try --font)")?;
    let (ctx, cancel) = JobContext::new(config.work_dir.as_deref())?;
    let job_id = ctx.id;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling job");
            cancel.cancel();
        }
    });

    println!("🎬 Chatreel render");
    println!("   Job:    {}", job_id);
    println!("   Script: {}", config.script.display());

    let outcome = run_job(&config, &deps, ctx)
        .await
        .with_context(|| format!("job {} failed", job_id))?;

    let report = &outcome.report;
    println!();
    if dry_run {
        println!("   ✓ Rendered {} frames (dry run, nothing encoded)", report.frames);
    } else {
        println!("   ✓ Output: {}", report.output.display());
    }
    println!("   Frames: {} ({} unique)", report.frames, report.unique_frames);
    println!(
        "   Codec:  {}{}",
        report.codec,
        if report.fell_back() { " (fallback)" } else { "" }
    );
    if !outcome.keyframes.is_empty() {
        println!("   Stills: {}", outcome.keyframes.len());
    }
    println!("   Time:   {:.1}s", outcome.elapsed.as_secs_f64());
    Ok(())
}

fn cmd_check(script: PathBuf, no_widget: bool, json: bool) -> Result<()> {
    let source = std::fs::read_to_string(&script)
        .with_context(|| format!("failed to read script: {}", script.display()))?;

    let mut config = JobConfig::new(&script);
    config.capabilities.widget = !no_widget;
    let timeline = plan_timeline(&config, &source).context("script check failed")?;
    let render = config.render_config()?;

    if json {
        let runs = frame_runs(&timeline);
        println!("{}", serde_json::to_string_pretty(&runs)?);
        return Ok(());
    }

    println!("🔍 Checking {}", script.display());
    println!("   Messages: {}", timeline.messages().len());
    for (i, message) in timeline.messages().iter().enumerate() {
        println!("   {:>3} {:?} {}", i + 1, message.side, message.text);
    }
    let images = timeline.image_assets();
    println!("   Images:   {}", images.len());
    println!(
        "   Frames:   {} ({:.1}s at {} fps)",
        timeline.frame_count(),
        timeline.duration_seconds(render.fps),
        render.fps
    );
    println!();
    println!("   ✅ Script OK");
    Ok(())
}

/// Consecutive ticks showing the same state, collapsed into one entry.
fn frame_runs(timeline: &Timeline) -> Vec<serde_json::Value> {
    let mut runs: Vec<(Tick, u64)> = Vec::new();
    for tick in timeline {
        match runs.last_mut() {
            Some((first, count)) if first.repeats(&tick) => *count += 1,
            _ => runs.push((tick, 1)),
        }
    }
    runs.into_iter()
        .map(|(tick, frames)| {
            serde_json::json!({
                "start": tick.index,
                "frames": frames,
                "kind": tick.state.kind_name(),
                "keyframe": tick.keyframe,
                "state": &*tick.state,
            })
        })
        .collect()
}

fn cmd_assets(script: PathBuf) -> Result<()> {
    let source = std::fs::read_to_string(&script)
        .with_context(|| format!("failed to read script: {}", script.display()))?;
    for key in required_asset_keys(&source) {
        println!("{}", key);
    }
    Ok(())
}
