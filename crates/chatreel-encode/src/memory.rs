//! In-memory encoder.
//!
//! Records the content hash of every frame it receives instead of producing a
//! video file. Used for dry runs and as a scriptable stand-in for ffmpeg: a
//! codec can be told to fail at launch, at a given frame, or at finalization,
//! or to stop accepting input after a number of frames.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use chatreel_core::hash::{hash_frame, ContentHash};
use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer};

use crate::codec::{CodecProfile, EncodeSpec};
use crate::ffmpeg::{EncoderLauncher, EncoderSession};

/// Where a scripted codec failure happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Launch,
    /// Reject the frame with this zero-based index.
    Frame(usize),
    Finish,
    /// Never return from the write of the frame with this zero-based index.
    Stall(usize),
}

/// What one encode attempt received.
#[derive(Debug, Clone, Default)]
pub struct RecordedAttempt {
    pub codec: String,
    pub frames: Vec<ContentHash>,
    pub finished: bool,
    pub aborted: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    attempts: Vec<RecordedAttempt>,
    failures: HashMap<String, FailurePoint>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLauncher {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every attempt with `codec` fail at `point`.
    pub fn fail(self, codec: &str, point: FailurePoint) -> Self {
        lock(&self.state).failures.insert(codec.to_string(), point);
        self
    }

    pub fn attempts(&self) -> Vec<RecordedAttempt> {
        lock(&self.state).attempts.clone()
    }
}

fn lock(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl EncoderLauncher for MemoryLauncher {
    async fn launch(&self, _spec: &EncodeSpec, profile: &CodecProfile) -> ChatreelResult<Box<dyn EncoderSession>> {
        let mut state = lock(&self.state);
        let failure = state.failures.get(profile.codec).copied();
        if failure == Some(FailurePoint::Launch) {
            return Err(ChatreelError::Encode(format!("{} is not available", profile.codec)));
        }
        state.attempts.push(RecordedAttempt {
            codec: profile.codec.to_string(),
            ..Default::default()
        });
        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            attempt: state.attempts.len() - 1,
            codec: profile.codec,
            failure,
            received: 0,
        }))
    }
}

struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    attempt: usize,
    codec: &'static str,
    failure: Option<FailurePoint>,
    received: usize,
}

#[async_trait]
impl EncoderSession for MemorySession {
    async fn write_frame(&mut self, frame: Arc<FrameBuffer>) -> ChatreelResult<()> {
        if self.failure == Some(FailurePoint::Frame(self.received)) {
            return Err(ChatreelError::Encode(format!(
                "{} rejected frame {}",
                self.codec, self.received
            )));
        }
        if self.failure == Some(FailurePoint::Stall(self.received)) {
            std::future::pending::<()>().await;
        }
        let hash = hash_frame(&frame);
        lock(&self.state).attempts[self.attempt].frames.push(hash);
        self.received += 1;
        Ok(())
    }

    async fn finish(self: Box<Self>) -> ChatreelResult<()> {
        if self.failure == Some(FailurePoint::Finish) {
            return Err(ChatreelError::Encode(format!("{} failed to finalize", self.codec)));
        }
        lock(&self.state).attempts[self.attempt].finished = true;
        Ok(())
    }

    async fn abort(self: Box<Self>) {
        lock(&self.state).attempts[self.attempt].aborted = true;
    }
}
