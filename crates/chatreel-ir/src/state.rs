use std::sync::Arc;

use serde::{Deserialize, Serialize};

use chatreel_core::Message;

/// What a single frame shows. Rendering a state is a pure function of the
/// state, the theme and the loaded assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FrameState {
    /// Story reply screen with the first message under the story image.
    Initial {
        first_message: Message,
        story_asset: Option<String>,
    },
    /// Chat screen showing a trailing window of messages.
    Chat {
        visible: Vec<Message>,
        /// Index of the newest visible message in the conversation.
        current_index: usize,
        /// Whole-frame opacity against the background, in [0, 1].
        opacity: f32,
    },
    /// Full-screen inline image.
    Image { asset: String },
    /// Suggestion widget over recent history.
    Widget {
        messages: Vec<Message>,
        suggestion: Option<String>,
    },
}

impl FrameState {
    /// Short name for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            FrameState::Initial { .. } => "initial",
            FrameState::Chat { .. } => "chat",
            FrameState::Image { .. } => "image",
            FrameState::Widget { .. } => "widget",
        }
    }
}

/// One output frame in timeline order.
///
/// Consecutive ticks of a hold block share the same `Arc<FrameState>`, so
/// consumers can reuse a rendered frame with `Arc::ptr_eq`.
#[derive(Debug, Clone)]
pub struct Tick {
    /// Zero-based output frame number.
    pub index: u64,
    pub state: Arc<FrameState>,
    /// Set on the first frame of each message hold block and each inline image,
    /// naming the still that keyframe export writes for it.
    pub keyframe: Option<String>,
}

impl Tick {
    /// Whether this tick shows exactly the same state object as `other`.
    pub fn repeats(&self, other: &Tick) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }
}
