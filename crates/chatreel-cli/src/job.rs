//! One render job, from script file to finished video.
//!
//! Everything a job owns lives in its `JobContext`: the scratch directory
//! holding the frame spool and the cancellation signal. The asset cache and
//! encoder launcher are handed in and may be shared between jobs.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::Instrument;
use uuid::Uuid;

use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer, JobConfig};
use chatreel_encode::{CodecPlan, EncodeReport, EncodeSink, EncodeSpec, EncoderLauncher, KeyframeWriter, Platform};
use chatreel_ir::{Tick, Timeline, TimelineBuilder};
use chatreel_render::{AssetCache, Fonts, FrameComposer, LocationProvider};
use chatreel_script::ScriptParser;

/// Signals a running job to stop.
#[derive(Debug, Clone)]
pub struct CancelHandle(Arc<watch::Sender<bool>>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.send_replace(true);
    }
}

/// Job-scoped resources. Dropping the context removes the scratch directory.
pub struct JobContext {
    pub id: Uuid,
    work_dir: tempfile::TempDir,
    cancel: watch::Receiver<bool>,
}

impl JobContext {
    /// Create a context with a fresh scratch directory under `work_root`
    /// (the system temp dir when `None`).
    pub fn new(work_root: Option<&Path>) -> ChatreelResult<(Self, CancelHandle)> {
        let id = Uuid::new_v4();
        let mut builder = tempfile::Builder::new();
        builder.prefix("chatreel-");
        let work_dir = match work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        let (sender, cancel) = watch::channel(false);
        Ok((Self { id, work_dir, cancel }, CancelHandle(Arc::new(sender))))
    }

    pub fn work_dir(&self) -> &Path {
        self.work_dir.path()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Run `fut` unless the job is cancelled first.
    async fn guard<T>(&mut self, fut: impl Future<Output = ChatreelResult<T>>) -> ChatreelResult<T> {
        if self.is_cancelled() {
            return Err(ChatreelError::Cancelled);
        }
        tokio::select! {
            result = fut => result,
            _ = cancelled(&mut self.cancel) => Err(ChatreelError::Cancelled),
        }
    }
}

async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // No handle left, so nothing can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

/// Collaborators a job renders and encodes with.
pub struct JobDeps {
    pub fonts: Fonts,
    pub cache: Arc<AssetCache>,
    pub launcher: Arc<dyn EncoderLauncher>,
    pub platform: Platform,
}

impl JobDeps {
    /// Fonts and asset locations from the job file, encoding with `launcher`.
    pub fn from_config(config: &JobConfig, launcher: Arc<dyn EncoderLauncher>) -> ChatreelResult<Self> {
        let fonts = Fonts::load(&config.fonts)?;
        let provider = Arc::new(LocationProvider::new(config.assets.clone())?);
        Ok(Self {
            fonts,
            cache: Arc::new(AssetCache::new(provider, config.fetch.clone())),
            launcher,
            platform: Platform::current(),
        })
    }
}

#[derive(Debug)]
pub struct JobOutcome {
    pub id: Uuid,
    pub report: EncodeReport,
    pub keyframes: Vec<PathBuf>,
    pub elapsed: Duration,
}

/// Default output path for a job without one.
pub fn default_output(id: &Uuid) -> PathBuf {
    PathBuf::from("output").join(format!("{}.mp4", id))
}

/// Parse the script and lay out the frame sequence.
pub fn plan_timeline(config: &JobConfig, source: &str) -> ChatreelResult<Timeline> {
    let render = config.render_config()?;
    let parsed = ScriptParser::new()
        .with_widgets(config.capabilities.widget)
        .parse(source)?;
    Ok(TimelineBuilder::new(parsed.messages)
        .elements(parsed.elements)
        .story_asset(config.story_image.clone())
        .widgets(config.capabilities.widget)
        .build(&render))
}

/// Render and encode one job.
pub async fn run_job(config: &JobConfig, deps: &JobDeps, ctx: JobContext) -> ChatreelResult<JobOutcome> {
    let span = tracing::info_span!("job", id = %ctx.id);
    run_job_inner(config, deps, ctx).instrument(span).await
}

async fn run_job_inner(config: &JobConfig, deps: &JobDeps, mut ctx: JobContext) -> ChatreelResult<JobOutcome> {
    let start = Instant::now();
    let source = tokio::fs::read_to_string(&config.script).await?;
    let timeline = plan_timeline(config, &source)?;
    let render = config.render_config()?;
    tracing::info!(
        "{} messages, {} frames ({:.1}s)",
        timeline.messages().len(),
        timeline.frame_count(),
        timeline.duration_seconds(render.fps)
    );

    let composer = FrameComposer::new(deps.fonts.clone(), &render).with_widget_style(config.widget.clone());
    let output = config.output.clone().unwrap_or_else(|| default_output(&ctx.id));
    let spec = EncodeSpec::new(&output, render.canvas_width, render.canvas_height, render.fps);
    let plan = CodecPlan::for_platform(deps.platform, config.capabilities.hardware_codec);
    let mut keyframes = config
        .capabilities
        .keyframes
        .then(|| KeyframeWriter::beside(&output));

    let spool_dir = ctx.work_dir().to_path_buf();
    let mut sink = ctx
        .guard(EncodeSink::open(Arc::clone(&deps.launcher), plan, spec, &spool_dir))
        .await?;

    let produced = produce_frames(&timeline, &composer, &deps.cache, &mut sink, keyframes.as_mut(), &mut ctx).await;
    if let Err(e) = produced {
        tracing::warn!("stopping encode: {}", e);
        sink.abort().await;
        return Err(e);
    }

    let report = ctx.guard(sink.finish()).await?;
    let elapsed = start.elapsed();
    tracing::info!(
        "finished {} in {:.1}s ({} asset fetch attempts)",
        report.output.display(),
        elapsed.as_secs_f64(),
        deps.cache.attempt_count()
    );

    Ok(JobOutcome {
        id: ctx.id,
        report,
        keyframes: keyframes.map(|k| k.written().to_vec()).unwrap_or_default(),
        elapsed,
    })
}

/// Render every tick in order and push it into the sink. A tick that repeats
/// the previous state reuses the previous frame.
async fn produce_frames(
    timeline: &Timeline,
    composer: &FrameComposer,
    cache: &AssetCache,
    sink: &mut EncodeSink,
    mut keyframes: Option<&mut KeyframeWriter>,
    ctx: &mut JobContext,
) -> ChatreelResult<()> {
    let mut previous: Option<(Tick, Arc<FrameBuffer>)> = None;
    for tick in timeline {
        let frame = match &previous {
            Some((last, frame)) if last.repeats(&tick) => Arc::clone(frame),
            _ => {
                let keys = composer.required_assets(&tick.state);
                let assets = ctx.guard(async { Ok(cache.get_many(keys).await) }).await?;
                tracing::debug!("rendering frame {} ({})", tick.index, tick.state.kind_name());
                Arc::new(composer.render(&tick.state, &assets))
            }
        };

        if let (Some(label), Some(writer)) = (tick.keyframe.as_deref(), keyframes.as_deref_mut()) {
            writer.write(label, &frame)?;
        }
        ctx.guard(sink.push_frame(Arc::clone(&frame))).await?;
        previous = Some((tick, frame));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreel_core::{Color, RenderSettings};
    use chatreel_encode::{write_png, FailurePoint, MemoryLauncher};

    fn job(dir: &Path, script: &str) -> JobConfig {
        let script_path = dir.join("chat.txt");
        std::fs::write(&script_path, script).unwrap();
        write_png(&dir.join("cat.png"), &FrameBuffer::solid(40, 30, &Color::RED)).unwrap();

        let mut config = JobConfig::new(script_path);
        config.output = Some(dir.join("out/video.mp4"));
        config.render = RenderSettings {
            repeat_window: 2,
            hold_seconds: 1.0,
            fade_frames: 0,
            fps: 30,
        };
        config.fetch.retries = 1;
        config.fetch.backoff_ms = 0;
        config
            .assets
            .insert("cat.png".into(), dir.join("cat.png").to_string_lossy().into_owned());
        config.work_dir = Some(dir.join("work"));
        config
    }

    fn deps(config: &JobConfig, launcher: MemoryLauncher) -> JobDeps {
        let provider = Arc::new(LocationProvider::new(config.assets.clone()).unwrap());
        JobDeps {
            fonts: Fonts::fixed(),
            cache: Arc::new(AssetCache::new(provider, config.fetch.clone())),
            launcher: Arc::new(launcher),
            platform: Platform::Linux,
        }
    }

    #[tokio::test]
    async fn test_end_to_end_frame_count() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path(), "L) Hi\nR) Hello\ncat.png <2s>\n");
        let launcher = MemoryLauncher::new();
        let deps = deps(&config, launcher.clone());
        let (ctx, _cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();
        let work_dir = ctx.work_dir().to_path_buf();

        let outcome = run_job(&config, &deps, ctx).await.unwrap();
        assert_eq!(outcome.report.frames, 90);
        assert_eq!(outcome.report.unique_frames, 3);
        assert_eq!(outcome.report.codec, "h264_nvenc");
        assert!(outcome.keyframes.is_empty());

        let attempts = launcher.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].frames.len(), 90);
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_hardware_failure_replays_same_frames() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path(), "L) Hi\nR) Hello\ncat.png <2s>\n");
        let launcher = MemoryLauncher::new().fail("h264_nvenc", FailurePoint::Frame(45));
        let deps = deps(&config, launcher.clone());
        let (ctx, _cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();

        let outcome = run_job(&config, &deps, ctx).await.unwrap();
        assert_eq!(outcome.report.codec, "libx264");
        assert!(outcome.report.fell_back());

        let attempts = launcher.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[1].frames.len(), 90);
        assert_eq!(attempts[0].frames[..], attempts[1].frames[..45]);
    }

    #[tokio::test]
    async fn test_keyframes_written_beside_output() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = job(dir.path(), "L) Hi\nR) Hello\ncat.png <2s>\n");
        config.capabilities.keyframes = true;
        let deps = deps(&config, MemoryLauncher::new());
        let (ctx, _cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();

        let outcome = run_job(&config, &deps, ctx).await.unwrap();
        let stills = dir.path().join("out/video_keyframes");
        assert_eq!(
            outcome.keyframes,
            vec![
                stills.join("message_1.png"),
                stills.join("message_2.png"),
                stills.join("inline_2.png"),
            ]
        );
        assert!(outcome.keyframes.iter().all(|p| p.exists()));
    }

    #[tokio::test]
    async fn test_empty_script_fails_before_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path(), "\n\ncat.png <1s>\n");
        let launcher = MemoryLauncher::new();
        let deps = deps(&config, launcher.clone());
        let (ctx, _cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();

        let result = run_job(&config, &deps, ctx).await;
        assert!(matches!(result, Err(ChatreelError::EmptyScript)));
        assert!(launcher.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_job_aborts_encoder() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path(), "L) Hi\nR) Hello\n");
        let launcher = MemoryLauncher::new();
        let deps = deps(&config, launcher.clone());
        let (ctx, cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();
        let work_dir = ctx.work_dir().to_path_buf();

        cancel.cancel();
        let result = run_job(&config, &deps, ctx).await;
        assert!(matches!(result, Err(ChatreelError::Cancelled)));
        assert!(launcher.attempts().iter().all(|a| !a.finished));
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_cancel_while_encoder_is_saturated() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path(), "L) Hi\nR) Hello\n");
        let launcher = MemoryLauncher::new().fail("h264_nvenc", FailurePoint::Stall(10));
        let deps = deps(&config, launcher.clone());
        let (ctx, cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();
        let work_dir = ctx.work_dir().to_path_buf();

        let cancel_after_ten = async {
            while launcher.attempts().first().map_or(0, |a| a.frames.len()) < 10 {
                tokio::task::yield_now().await;
            }
            cancel.cancel();
        };
        let (result, ()) = tokio::join!(run_job(&config, &deps, ctx), cancel_after_ten);

        assert!(matches!(result, Err(ChatreelError::Cancelled)));
        let attempts = launcher.attempts();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].frames.len(), 10);
        assert!(attempts[0].aborted);
        assert!(!attempts[0].finished);
        assert!(!work_dir.exists());
    }

    #[tokio::test]
    async fn test_widget_texts_reach_the_composer() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = job(dir.path(), "L) a\n[PLUG_WIDGET]\nR) b\n");
        config.widget.hint_glyph = "🔥".into();
        let cat = dir.path().join("cat.png").to_string_lossy().into_owned();
        config.assets.insert("emoji:1f525".into(), cat);
        let deps = deps(&config, MemoryLauncher::new());
        let (ctx, _cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();

        run_job(&config, &deps, ctx).await.unwrap();
        let hint = deps.cache.cached("emoji:1f525").unwrap();
        assert!(!hint.placeholder);
        assert!(deps.cache.cached("emoji:1f447").is_none());
    }

    #[tokio::test]
    async fn test_missing_asset_uses_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let config = job(dir.path(), "L) Hi\ndog.png <1s>\nR) ok\n");
        let deps = deps(&config, MemoryLauncher::new());
        let (ctx, _cancel) = JobContext::new(config.work_dir.as_deref()).unwrap();

        let outcome = run_job(&config, &deps, ctx).await.unwrap();
        assert_eq!(outcome.report.frames, 90);
        assert!(deps.cache.cached("dog.png").unwrap().placeholder);
    }

    #[test]
    fn test_plan_timeline_respects_widget_flag() {
        let mut config = JobConfig::new("unused.txt");
        config.render.fade_frames = 0;
        config.render.hold_seconds = 1.0;
        let source = "L) a\n[PLUG_WIDGET]\nR) b\n";

        let with_widget = plan_timeline(&config, source).unwrap();
        config.capabilities.widget = false;
        let without_widget = plan_timeline(&config, source).unwrap();
        assert_eq!(with_widget.frame_count(), without_widget.frame_count() + 60);
    }
}
