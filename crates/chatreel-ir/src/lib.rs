//! # chatreel-ir
//!
//! The frame-level intermediate representation: what each output frame shows
//! (`FrameState`) and the ordered, lazily generated sequence of frames for a
//! whole conversation (`Timeline`).

pub mod state;
pub mod timeline;

pub use state::{FrameState, Tick};
pub use timeline::{Timeline, TimelineBuilder, TimelineIter, WIDGET_HISTORY};
