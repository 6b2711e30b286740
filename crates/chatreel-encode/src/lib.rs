//! # chatreel-encode
//!
//! Turns the ordered frame stream into a video file. Frames are streamed to an
//! ffmpeg child process as raw RGBA with backpressure, spooled to temporary
//! storage, and replayed into a software encoder if the hardware attempt fails.

pub mod codec;
pub mod ffmpeg;
pub mod keyframes;
pub mod memory;
pub mod sink;
pub mod spool;

pub use codec::{ffmpeg_args, CodecPlan, CodecProfile, EncodeSpec, Platform};
pub use ffmpeg::{EncoderLauncher, EncoderSession, FfmpegLauncher, FRAME_QUEUE_DEPTH};
pub use keyframes::{write_png, KeyframeWriter};
pub use memory::{FailurePoint, MemoryLauncher, RecordedAttempt};
pub use sink::{AttemptOutcome, EncodeAttempt, EncodeReport, EncodeSink};
pub use spool::FrameSpool;
