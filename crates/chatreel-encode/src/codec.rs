//! Codec selection.
//!
//! Each platform has one hardware-accelerated primary profile tuned for speed;
//! `libx264` is the conservative software fallback everywhere.

use std::fmt;
use std::path::Path;

use chatreel_core::PixelFormat;

/// Operating system family, for picking the hardware encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Linux,
    Windows,
    MacOs,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }
}

/// One ffmpeg video codec configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecProfile {
    pub codec: &'static str,
    pub options: Vec<&'static str>,
    pub hardware: bool,
}

impl CodecProfile {
    /// Hardware profile for `platform`, if it has one.
    pub fn primary(platform: Platform) -> Option<Self> {
        match platform {
            Platform::Linux | Platform::Windows => Some(Self {
                codec: "h264_nvenc",
                options: vec!["-preset", "p2", "-rc", "vbr", "-cq", "28", "-profile:v", "high"],
                hardware: true,
            }),
            Platform::MacOs => Some(Self {
                codec: "h264_videotoolbox",
                options: vec!["-q:v", "70", "-profile:v", "high", "-level", "4.2"],
                hardware: true,
            }),
            Platform::Other => None,
        }
    }

    pub fn software() -> Self {
        Self {
            codec: "libx264",
            options: vec!["-preset", "fast", "-crf", "18"],
            hardware: false,
        }
    }
}

impl fmt::Display for CodecProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.codec)
    }
}

/// Ordered codec attempts: the first is tried, the second (if any) is the
/// single fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecPlan {
    pub primary: CodecProfile,
    pub fallback: Option<CodecProfile>,
}

impl CodecPlan {
    /// Hardware first with software fallback, or software only.
    pub fn for_platform(platform: Platform, hardware: bool) -> Self {
        match CodecProfile::primary(platform).filter(|_| hardware) {
            Some(primary) => Self {
                primary,
                fallback: Some(CodecProfile::software()),
            },
            None => Self::software_only(),
        }
    }

    pub fn software_only() -> Self {
        Self {
            primary: CodecProfile::software(),
            fallback: None,
        }
    }
}

/// Geometry and destination of one encode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSpec {
    pub output: std::path::PathBuf,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub format: PixelFormat,
}

impl EncodeSpec {
    pub fn new(output: impl Into<std::path::PathBuf>, width: u32, height: u32, fps: u32) -> Self {
        Self {
            output: output.into(),
            width,
            height,
            fps,
            format: PixelFormat::Rgba8,
        }
    }

    /// Bytes in one raw input frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.height as usize * self.format.bytes_per_pixel()
    }
}

/// Full ffmpeg argument list: raw frames on stdin, H.264 MP4 out.
pub fn ffmpeg_args(spec: &EncodeSpec, profile: &CodecProfile) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y",
        "-hide_banner",
        "-loglevel",
        "error",
        "-f",
        "rawvideo",
        "-pixel_format",
        spec.format.ffmpeg_name(),
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    args.push("-video_size".into());
    args.push(format!("{}x{}", spec.width, spec.height));
    args.push("-framerate".into());
    args.push(spec.fps.to_string());
    args.extend(["-i", "-", "-c:v", profile.codec].iter().map(|s| s.to_string()));
    args.extend(profile.options.iter().map(|s| s.to_string()));
    args.extend(["-pix_fmt", "yuv420p", "-movflags", "+faststart"].iter().map(|s| s.to_string()));
    args.push(path_arg(&spec.output));
    args
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
