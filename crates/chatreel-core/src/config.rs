use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ChatreelError, ChatreelResult, Theme, ThemeKind};

/// Output canvas width. The canvas is a fixed portrait frame.
pub const CANVAS_WIDTH: u32 = 1080;
/// Output canvas height.
pub const CANVAS_HEIGHT: u32 = 1920;

/// Timing and history settings as written in a job file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RenderSettings {
    /// How many earlier messages stay visible above the current one.
    pub repeat_window: usize,
    /// Seconds each message stays on screen once settled.
    pub hold_seconds: f64,
    /// Number of fade-in frames before every message after the first.
    pub fade_frames: u32,
    pub fps: u32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            repeat_window: 2,
            hold_seconds: 1.3,
            fade_frames: 8,
            fps: 30,
        }
    }
}

/// Optional pipeline features, toggled per job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Capabilities {
    /// Render `[PLUG_WIDGET]` lines as the suggestion widget overlay.
    pub widget: bool,
    /// Try the platform hardware encoder before the software one.
    pub hardware_codec: bool,
    /// Export one PNG still per message and inline image.
    pub keyframes: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            widget: true,
            hardware_codec: true,
            keyframes: false,
        }
    }
}

/// Texts shown on the suggestion widget.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WidgetStyle {
    pub title: String,
    pub label: String,
    /// Single pictographic character drawn on both sides of the label.
    pub hint_glyph: String,
}

impl Default for WidgetStyle {
    fn default() -> Self {
        Self {
            title: "RIZZ APP".into(),
            label: "AI generated RIZZ".into(),
            hint_glyph: "👇".into(),
        }
    }
}

/// Retry policy for remote image fetches.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Total attempts per key, including the first.
    pub retries: u32,
    pub backoff_ms: u64,
    pub timeout_secs: u64,
}

impl FetchSettings {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retries: 3,
            backoff_ms: 1500,
            timeout_secs: 15,
        }
    }
}

/// Font files used by the renderer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FontPaths {
    pub regular: Option<PathBuf>,
    pub semibold: Option<PathBuf>,
}

/// A complete job description, usually loaded from a TOML file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JobConfig {
    /// Path to the conversation script.
    pub script: PathBuf,
    /// Output video path. Defaults to `output/<job id>.mp4`.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub theme: ThemeKind,
    /// Asset key or location of the story image shown on the first frame.
    #[serde(default)]
    pub story_image: Option<String>,
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub fetch: FetchSettings,
    #[serde(default)]
    pub fonts: FontPaths,
    #[serde(default)]
    pub widget: WidgetStyle,
    /// Inline image keys mapped to URLs or local paths.
    #[serde(default)]
    pub assets: BTreeMap<String, String>,
    /// Root for job-scoped temporary storage. Defaults to the system temp dir.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl JobConfig {
    /// A job with default settings for the given script.
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            script: script.into(),
            output: None,
            theme: ThemeKind::default(),
            story_image: None,
            render: RenderSettings::default(),
            capabilities: Capabilities::default(),
            fetch: FetchSettings::default(),
            fonts: FontPaths::default(),
            widget: WidgetStyle::default(),
            assets: BTreeMap::new(),
            work_dir: None,
        }
    }

    /// Load a job file. Relative paths inside it resolve against its directory.
    pub fn load_from_file(path: &Path) -> ChatreelResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: JobConfig = toml::from_str(&contents)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    fn resolve_relative_to(&mut self, base: &Path) {
        let rebase = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        rebase(&mut self.script);
        if let Some(output) = self.output.as_mut() {
            rebase(output);
        }
        if let Some(regular) = self.fonts.regular.as_mut() {
            rebase(regular);
        }
        if let Some(semibold) = self.fonts.semibold.as_mut() {
            rebase(semibold);
        }
        if let Some(work_dir) = self.work_dir.as_mut() {
            rebase(work_dir);
        }
        for location in self.assets.values_mut() {
            if !is_remote(location) && Path::new(location.as_str()).is_relative() {
                *location = base.join(location.as_str()).to_string_lossy().into_owned();
            }
        }
    }

    /// Validate the timing settings and resolve the theme.
    pub fn render_config(&self) -> ChatreelResult<RenderConfig> {
        RenderConfig::new(self.theme, &self.render)
    }
}

fn is_remote(location: &str) -> bool {
    location.starts_with("http://") || location.starts_with("https://")
}

/// Everything the timeline and composer need to know about one job.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub theme: Theme,
    pub repeat_window: usize,
    pub hold_seconds: f64,
    pub fade_frames: u32,
    pub fps: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
}

impl RenderConfig {
    pub fn new(theme: ThemeKind, settings: &RenderSettings) -> ChatreelResult<Self> {
        if settings.fps == 0 {
            return Err(ChatreelError::Config("fps must be > 0".into()));
        }
        if !settings.hold_seconds.is_finite() || settings.hold_seconds <= 0.0 {
            return Err(ChatreelError::Config("hold_seconds must be > 0".into()));
        }
        let config = Self {
            theme: theme.theme(),
            repeat_window: settings.repeat_window,
            hold_seconds: settings.hold_seconds,
            fade_frames: settings.fade_frames,
            fps: settings.fps,
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
        };
        // Every message needs at least one settled frame to carry its keyframe.
        if config.hold_frames() == 0 {
            return Err(ChatreelError::Config(format!(
                "hold_seconds {} is shorter than one frame at {} fps",
                settings.hold_seconds, settings.fps
            )));
        }
        Ok(config)
    }

    /// Number of identical frames a settled message is held for.
    pub fn hold_frames(&self) -> u64 {
        // Nudge so products like 0.7 * 30 land on 21, not 20.999...
        (self.hold_seconds * self.fps as f64 + 1e-9).floor() as u64
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            theme: Theme::default(),
            repeat_window: settings.repeat_window,
            hold_seconds: settings.hold_seconds,
            fade_frames: settings.fade_frames,
            fps: settings.fps,
            canvas_width: CANVAS_WIDTH,
            canvas_height: CANVAS_HEIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hold_frames_floor() {
        let cfg = RenderConfig::default();
        assert_eq!(cfg.hold_frames(), 39);
        let cfg = RenderConfig::new(
            ThemeKind::IosDark,
            &RenderSettings {
                hold_seconds: 1.0,
                fps: 30,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cfg.hold_frames(), 30);
    }

    #[test]
    fn test_hold_frames_survives_float_error() {
        let cfg = RenderConfig {
            hold_seconds: 0.7,
            fps: 30,
            ..Default::default()
        };
        assert_eq!(cfg.hold_frames(), 21);
    }

    #[test]
    fn test_rejects_zero_fps_and_hold() {
        let zero_fps = RenderSettings {
            fps: 0,
            ..Default::default()
        };
        assert!(RenderConfig::new(ThemeKind::IosDark, &zero_fps).is_err());
        let zero_hold = RenderSettings {
            hold_seconds: 0.0,
            ..Default::default()
        };
        assert!(RenderConfig::new(ThemeKind::IosDark, &zero_hold).is_err());
    }

    #[test]
    fn test_rejects_hold_shorter_than_a_frame() {
        let settings = RenderSettings {
            hold_seconds: 0.02,
            fps: 30,
            ..Default::default()
        };
        assert!(matches!(
            RenderConfig::new(ThemeKind::IosDark, &settings),
            Err(ChatreelError::Config(_))
        ));
        let one_frame = RenderSettings {
            hold_seconds: 1.0 / 30.0,
            fps: 30,
            ..Default::default()
        };
        assert_eq!(RenderConfig::new(ThemeKind::IosDark, &one_frame).unwrap().hold_frames(), 1);
    }

    #[test]
    fn test_load_job_file_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            r#"
script = "chat.txt"
theme = "ios_light"

[render]
repeat_window = 3
hold_seconds = 1.0
fade_frames = 0
fps = 24

[capabilities]
widget = false
hardware_codec = false
keyframes = true

[assets]
"cat.png" = "images/cat.png"
"dog.jpg" = "https://example.com/dog.jpg"
"#,
        )
        .unwrap();

        let cfg = JobConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.script, dir.path().join("chat.txt"));
        assert_eq!(cfg.theme, ThemeKind::IosLight);
        assert_eq!(cfg.render.repeat_window, 3);
        assert!(!cfg.capabilities.widget);
        assert!(cfg.capabilities.keyframes);
        assert_eq!(cfg.fetch.retries, 3);
        assert_eq!(
            cfg.assets["cat.png"],
            dir.path().join("images/cat.png").to_string_lossy()
        );
        assert_eq!(cfg.assets["dog.jpg"], "https://example.com/dog.jpg");

        let render = cfg.render_config().unwrap();
        assert_eq!(render.hold_frames(), 24);
        assert_eq!(render.canvas_width, CANVAS_WIDTH);
    }

    #[test]
    fn test_partial_tables_fill_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(
            &path,
            "script = \"chat.txt\"\n[render]\nfps = 60\n[capabilities]\nkeyframes = true\n[fetch]\nretries = 5\n",
        )
        .unwrap();

        let cfg = JobConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.render.fps, 60);
        assert_eq!(cfg.render.repeat_window, 2);
        assert_eq!(cfg.render.hold_seconds, 1.3);
        assert_eq!(cfg.render.fade_frames, 8);
        assert!(cfg.capabilities.keyframes);
        assert!(cfg.capabilities.widget);
        assert!(cfg.capabilities.hardware_codec);
        assert_eq!(cfg.fetch.retries, 5);
        assert_eq!(cfg.fetch.backoff_ms, 1500);
        assert_eq!(cfg.fetch.timeout_secs, 15);
        assert_eq!(cfg.widget, WidgetStyle::default());
    }

    #[test]
    fn test_widget_texts_from_job_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "script = \"chat.txt\"\n[widget]\ntitle = \"WINGMAN\"\n").unwrap();

        let cfg = JobConfig::load_from_file(&path).unwrap();
        assert_eq!(cfg.widget.title, "WINGMAN");
        assert_eq!(cfg.widget.label, "AI generated RIZZ");
        assert_eq!(cfg.widget.hint_glyph, "👇");
    }

    #[test]
    fn test_unknown_theme_is_toml_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("job.toml");
        std::fs::write(&path, "script = \"a.txt\"\ntheme = \"windows_xp\"\n").unwrap();
        assert!(matches!(
            JobConfig::load_from_file(&path),
            Err(ChatreelError::Toml(_))
        ));
    }
}
