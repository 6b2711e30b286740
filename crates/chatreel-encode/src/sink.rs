//! EncodeSink — the ordered frame consumer at the end of the pipeline.
//!
//! Every frame is spooled to temporary storage before it is handed to the
//! encoder. When the active attempt reports a failure the sink aborts it,
//! launches the software fallback and replays the spool from the first frame,
//! so the fallback sees exactly the sequence the primary was given. At most
//! one fallback is made per job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer};

use crate::codec::{CodecPlan, CodecProfile, EncodeSpec};
use crate::ffmpeg::{EncoderLauncher, EncoderSession};
use crate::spool::FrameSpool;

/// Result of one encode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeAttempt {
    pub codec: &'static str,
    pub outcome: AttemptOutcome,
}

/// Summary of a finished encode.
#[derive(Debug, Clone)]
pub struct EncodeReport {
    pub output: PathBuf,
    pub frames: usize,
    /// Distinct frames stored in the spool.
    pub unique_frames: usize,
    /// Codec that produced the output.
    pub codec: &'static str,
    pub attempts: Vec<EncodeAttempt>,
}

impl EncodeReport {
    pub fn fell_back(&self) -> bool {
        self.attempts.len() > 1
    }
}

pub struct EncodeSink {
    launcher: Arc<dyn EncoderLauncher>,
    spec: EncodeSpec,
    spool: FrameSpool,
    active: CodecProfile,
    /// Software profile still available for the single fallback.
    fallback: Option<CodecProfile>,
    session: Option<Box<dyn EncoderSession>>,
    attempts: Vec<EncodeAttempt>,
}

impl EncodeSink {
    /// Start the primary encoder. A primary that cannot be launched counts as
    /// a failed attempt and the fallback is launched in its place.
    pub async fn open(
        launcher: Arc<dyn EncoderLauncher>,
        plan: CodecPlan,
        spec: EncodeSpec,
        spool_dir: &Path,
    ) -> ChatreelResult<Self> {
        let spool = FrameSpool::create(spool_dir, spec.width, spec.height)?;
        let mut sink = Self {
            launcher,
            spec,
            spool,
            active: plan.primary,
            fallback: plan.fallback,
            session: None,
            attempts: Vec::new(),
        };

        match sink.launcher.launch(&sink.spec, &sink.active).await {
            Ok(session) => {
                tracing::info!("encoding {} with {}", sink.spec.output.display(), sink.active);
                sink.session = Some(session);
            }
            Err(e) => sink.fall_back(e).await?,
        }
        Ok(sink)
    }

    pub fn spec(&self) -> &EncodeSpec {
        &self.spec
    }

    /// Codec of the current attempt.
    pub fn codec(&self) -> &'static str {
        self.active.codec
    }

    /// Frames accepted so far.
    pub fn frame_count(&self) -> usize {
        self.spool.len()
    }

    /// Append the next frame. Waits while the encoder is saturated.
    pub async fn push_frame(&mut self, frame: Arc<FrameBuffer>) -> ChatreelResult<()> {
        self.spool.push(&frame)?;

        let session = self
            .session
            .as_mut()
            .ok_or_else(|| ChatreelError::Encode("no active encoder".into()))?;
        if let Err(e) = session.write_frame(frame).await {
            self.fall_back(e).await?;
        }
        Ok(())
    }

    /// Close the input and wait for the output to be finalized.
    pub async fn finish(mut self) -> ChatreelResult<EncodeReport> {
        if self.spool.is_empty() {
            self.abort().await;
            return Err(ChatreelError::Encode("no frames were produced".into()));
        }

        loop {
            let session = self
                .session
                .take()
                .ok_or_else(|| ChatreelError::Encode("no active encoder".into()))?;
            match session.finish().await {
                Ok(()) => break,
                Err(e) => self.fall_back(e).await?,
            }
        }

        self.attempts.push(EncodeAttempt {
            codec: self.active.codec,
            outcome: AttemptOutcome::Succeeded,
        });
        tracing::info!(
            "encoded {} frames ({} unique) to {} with {}",
            self.spool.len(),
            self.spool.unique_frames(),
            self.spec.output.display(),
            self.active
        );

        Ok(EncodeReport {
            output: self.spec.output.clone(),
            frames: self.spool.len(),
            unique_frames: self.spool.unique_frames(),
            codec: self.active.codec,
            attempts: std::mem::take(&mut self.attempts),
        })
    }

    /// Stop the encoder without finalizing. The spool is removed on drop.
    pub async fn abort(mut self) {
        if let Some(session) = self.session.take() {
            tracing::debug!("aborting {} encode", self.active);
            session.abort().await;
        }
    }

    /// Record the failed attempt, then restart with the fallback and replay
    /// every spooled frame. Fails if the fallback was already used.
    async fn fall_back(&mut self, cause: ChatreelError) -> ChatreelResult<()> {
        if let Some(session) = self.session.take() {
            session.abort().await;
        }
        self.attempts.push(EncodeAttempt {
            codec: self.active.codec,
            outcome: AttemptOutcome::Failed(cause.to_string()),
        });

        let Some(fallback) = self.fallback.take() else {
            tracing::error!("{} failed with no fallback left: {}", self.active, cause);
            return Err(cause);
        };
        tracing::warn!(
            "{} failed ({}), restarting with {} and replaying {} frames",
            self.active,
            cause,
            fallback,
            self.spool.len()
        );
        self.active = fallback;

        let mut session = match self.launcher.launch(&self.spec, &self.active).await {
            Ok(session) => session,
            Err(e) => {
                self.attempts.push(EncodeAttempt {
                    codec: self.active.codec,
                    outcome: AttemptOutcome::Failed(e.to_string()),
                });
                return Err(e);
            }
        };
        let replayed = self.replay_into(session.as_mut()).await;
        if let Err(e) = replayed {
            session.abort().await;
            self.attempts.push(EncodeAttempt {
                codec: self.active.codec,
                outcome: AttemptOutcome::Failed(e.to_string()),
            });
            return Err(e);
        }
        self.session = Some(session);
        Ok(())
    }

    async fn replay_into(&mut self, session: &mut dyn EncoderSession) -> ChatreelResult<()> {
        for frame in self.spool.replay()? {
            session.write_frame(frame?).await?;
        }
        Ok(())
    }
}
