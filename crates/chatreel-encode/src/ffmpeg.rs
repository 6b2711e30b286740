//! Encoder processes.
//!
//! An `EncoderLauncher` starts one encode attempt and hands back an
//! `EncoderSession` that accepts frames in order. The ffmpeg implementation
//! feeds raw RGBA frames to the child's stdin from a writer task through a
//! bounded channel: `write_frame` waits for a free slot before handing a frame
//! over, so a slow encoder pauses frame production instead of dropping frames.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStderr, ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer};

use crate::codec::{ffmpeg_args, CodecProfile, EncodeSpec};

/// Frames buffered between the producer and the encoder's stdin.
pub const FRAME_QUEUE_DEPTH: usize = 4;

const STDERR_TAIL_CHARS: usize = 500;

/// Starts encode attempts.
#[async_trait]
pub trait EncoderLauncher: Send + Sync {
    async fn launch(&self, spec: &EncodeSpec, profile: &CodecProfile) -> ChatreelResult<Box<dyn EncoderSession>>;
}

/// One running encode attempt.
#[async_trait]
pub trait EncoderSession: Send {
    /// Hand over the next frame, waiting while the encoder is saturated.
    async fn write_frame(&mut self, frame: Arc<FrameBuffer>) -> ChatreelResult<()>;

    /// Close the input and wait for the encoder to finalize the output.
    async fn finish(self: Box<Self>) -> ChatreelResult<()>;

    /// Stop the encoder without finalizing.
    async fn abort(self: Box<Self>);
}

/// Launches the system `ffmpeg`.
#[derive(Debug, Clone)]
pub struct FfmpegLauncher {
    program: PathBuf,
}

impl FfmpegLauncher {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
        }
    }

    /// Use a specific ffmpeg binary.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Check if ffmpeg can be started.
    pub async fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegLauncher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EncoderLauncher for FfmpegLauncher {
    async fn launch(&self, spec: &EncodeSpec, profile: &CodecProfile) -> ChatreelResult<Box<dyn EncoderSession>> {
        if let Some(parent) = spec.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let args = ffmpeg_args(spec, profile);
        tracing::debug!("starting {} {}", self.program.display(), args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ChatreelError::Encode(format!("failed to start ffmpeg ({}): {}", profile, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ChatreelError::Encode("failed to open ffmpeg stdin".into()))?;
        let stderr = child.stderr.take();

        let (sender, receiver) = mpsc::channel::<Arc<FrameBuffer>>(FRAME_QUEUE_DEPTH);
        let writer = tokio::spawn(write_frames(stdin, receiver, spec.frame_bytes()));
        let stderr = tokio::spawn(read_stderr_tail(stderr));

        Ok(Box::new(FfmpegSession {
            codec: profile.codec,
            child,
            sender: Some(sender),
            writer,
            stderr,
        }))
    }
}

struct FfmpegSession {
    codec: &'static str,
    child: Child,
    sender: Option<mpsc::Sender<Arc<FrameBuffer>>>,
    writer: JoinHandle<ChatreelResult<u64>>,
    stderr: JoinHandle<String>,
}

#[async_trait]
impl EncoderSession for FfmpegSession {
    async fn write_frame(&mut self, frame: Arc<FrameBuffer>) -> ChatreelResult<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ChatreelError::Encode("encoder input already closed".into()))?;
        // Ready signal: resolves once the writer has room for another frame.
        let permit = sender
            .reserve()
            .await
            .map_err(|_| ChatreelError::Encode(format!("{} stopped accepting frames", self.codec)))?;
        permit.send(frame);
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> ChatreelResult<()> {
        drop(self.sender.take());

        let written = match (&mut self.writer).await {
            Ok(result) => result,
            Err(e) => Err(ChatreelError::Encode(format!("ffmpeg writer task failed: {}", e))),
        };
        let status = self
            .child
            .wait()
            .await
            .map_err(|e| ChatreelError::Encode(format!("ffmpeg process error: {}", e)))?;
        let stderr_tail = (&mut self.stderr).await.unwrap_or_default();

        if !status.success() {
            return Err(ChatreelError::Encode(format!(
                "{} failed with status {}: {}",
                self.codec, status, stderr_tail
            )));
        }
        let frames = written?;
        tracing::debug!("{} consumed {} frames", self.codec, frames);
        Ok(())
    }

    async fn abort(mut self: Box<Self>) {
        drop(self.sender.take());
        self.writer.abort();
        if let Err(e) = self.child.start_kill() {
            tracing::debug!("ffmpeg already exited: {}", e);
        }
        let _ = self.child.wait().await;
        self.stderr.abort();
    }
}

async fn write_frames(
    mut stdin: ChildStdin,
    mut receiver: mpsc::Receiver<Arc<FrameBuffer>>,
    frame_bytes: usize,
) -> ChatreelResult<u64> {
    let mut written = 0u64;
    while let Some(frame) = receiver.recv().await {
        if frame.data.len() != frame_bytes {
            return Err(ChatreelError::Encode(format!(
                "frame {} has {} bytes, expected {}",
                written,
                frame.data.len(),
                frame_bytes
            )));
        }
        stdin
            .write_all(&frame.data)
            .await
            .map_err(|e| ChatreelError::Encode(format!("failed to write frame {} to ffmpeg: {}", written, e)))?;
        written += 1;
    }
    stdin.flush().await?;
    // Dropping stdin closes the pipe and lets ffmpeg finalize.
    drop(stdin);
    Ok(written)
}

async fn read_stderr_tail(stderr: Option<ChildStderr>) -> String {
    let Some(mut pipe) = stderr else {
        return String::new();
    };
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        tracing::debug!("failed reading ffmpeg stderr: {}", e);
    }
    last_n_chars(&String::from_utf8_lossy(&buf), STDERR_TAIL_CHARS)
}

fn last_n_chars(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    s.chars()
        .skip(count.saturating_sub(max_chars))
        .collect::<String>()
        .trim()
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_n_chars() {
        assert_eq!(last_n_chars("  hello world \n", 7), "world");
        assert_eq!(last_n_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn test_missing_binary_fails_to_launch() {
        let launcher = FfmpegLauncher::with_program("/nonexistent/ffmpeg");
        assert!(!launcher.is_available().await);
        let dir = tempfile::tempdir().unwrap();
        let spec = EncodeSpec::new(dir.path().join("out.mp4"), 4, 4, 30);
        let result = launcher.launch(&spec, &CodecProfile::software()).await;
        assert!(matches!(result, Err(ChatreelError::Encode(_))));
    }
}
