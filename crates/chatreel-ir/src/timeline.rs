//! Timeline expansion — messages + special elements → ordered frame ticks.
//!
//! For every message `i` the timeline emits, in this order:
//! 1. `fade_frames` chat frames with rising opacity (only when `i > 0`),
//! 2. `hold_frames` copies of the settled frame (`Initial` for `i == 0`),
//! 3. the special elements anchored at `i`: an image is held for
//!    `hold_frames`, the widget for `2 × hold_frames`.

use std::collections::VecDeque;
use std::sync::Arc;

use chatreel_core::{Message, RenderConfig, SpecialElement, SpecialKind};

use crate::state::{FrameState, Tick};

/// How many recent messages the widget shows.
pub const WIDGET_HISTORY: usize = 3;

/// Builder for a [`Timeline`].
#[derive(Debug, Clone)]
pub struct TimelineBuilder {
    messages: Vec<Message>,
    elements: Vec<SpecialElement>,
    story_asset: Option<String>,
    widgets_enabled: bool,
}

impl TimelineBuilder {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            elements: Vec::new(),
            story_asset: None,
            widgets_enabled: true,
        }
    }

    pub fn elements(mut self, elements: Vec<SpecialElement>) -> Self {
        self.elements = elements;
        self
    }

    pub fn story_asset(mut self, key: Option<String>) -> Self {
        self.story_asset = key;
        self
    }

    /// When disabled, widget elements produce no frames.
    pub fn widgets(mut self, enabled: bool) -> Self {
        self.widgets_enabled = enabled;
        self
    }

    /// Group elements per anchor, keeping at most one element of each kind
    /// per anchor in script order.
    pub fn build(self, config: &RenderConfig) -> Timeline {
        let mut anchored: Vec<Vec<SpecialKind>> = vec![Vec::new(); self.messages.len()];

        for el in self.elements {
            let Some(anchor) = el.anchor else {
                tracing::warn!("dropping {:?} anchored before the first message", el.kind);
                continue;
            };
            let Some(slot) = anchored.get_mut(anchor) else {
                tracing::warn!("dropping {:?} anchored at missing message {}", el.kind, anchor);
                continue;
            };
            if matches!(el.kind, SpecialKind::Widget) && !self.widgets_enabled {
                continue;
            }
            if slot.iter().any(|k| k.same_variant(&el.kind)) {
                tracing::warn!("message {} already has a {:?}-kind element, skipping", anchor, el.kind);
                continue;
            }
            slot.push(el.kind);
        }

        Timeline {
            messages: Arc::new(self.messages),
            anchored: Arc::new(anchored),
            story_asset: self.story_asset,
            repeat_window: config.repeat_window,
            fade_frames: config.fade_frames,
            hold_frames: config.hold_frames(),
        }
    }
}

/// A complete, immutable frame schedule. Iterating it is lazy and can be
/// repeated any number of times with identical results.
#[derive(Debug, Clone)]
pub struct Timeline {
    messages: Arc<Vec<Message>>,
    anchored: Arc<Vec<Vec<SpecialKind>>>,
    story_asset: Option<String>,
    repeat_window: usize,
    fade_frames: u32,
    hold_frames: u64,
}

impl Timeline {
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn hold_frames(&self) -> u64 {
        self.hold_frames
    }

    /// Number of frames emitted for message `index`, including its special elements.
    pub fn frames_for_message(&self, index: usize) -> u64 {
        if index >= self.messages.len() {
            return 0;
        }
        let fades = if index > 0 { self.fade_frames as u64 } else { 0 };
        let specials: u64 = self.anchored[index]
            .iter()
            .map(|kind| self.special_frames(kind))
            .sum();
        fades + self.hold_frames + specials
    }

    /// Total number of frames, without expanding the timeline.
    pub fn frame_count(&self) -> u64 {
        (0..self.messages.len()).map(|i| self.frames_for_message(i)).sum()
    }

    pub fn duration_seconds(&self, fps: u32) -> f64 {
        if fps == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / fps as f64
    }

    /// Every distinct asset key the frames reference, in first-use order.
    pub fn image_assets(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.story_asset.iter().cloned().collect();
        for kinds in self.anchored.iter() {
            for kind in kinds {
                if let SpecialKind::Image { asset_key } = kind {
                    if !keys.contains(asset_key) {
                        keys.push(asset_key.clone());
                    }
                }
            }
        }
        keys
    }

    pub fn iter(&self) -> TimelineIter {
        TimelineIter {
            timeline: self.clone(),
            next_message: 0,
            pending: VecDeque::new(),
            current: None,
            index: 0,
        }
    }

    fn special_frames(&self, kind: &SpecialKind) -> u64 {
        match kind {
            SpecialKind::Image { .. } => self.hold_frames,
            SpecialKind::Widget => self.hold_frames * 2,
        }
    }

    fn chat_state(&self, index: usize, opacity: f32) -> FrameState {
        let start = index.saturating_sub(self.repeat_window);
        FrameState::Chat {
            visible: self.messages[start..=index].to_vec(),
            current_index: index,
            opacity,
        }
    }

    /// Frame runs for one message, in emission order.
    fn segments_for(&self, index: usize) -> Vec<Segment> {
        let mut segments = Vec::new();

        if index > 0 {
            for f in 1..=self.fade_frames {
                let opacity = f as f32 / self.fade_frames as f32;
                segments.push(Segment::once(self.chat_state(index, opacity)));
            }
        }

        let settled = if index == 0 {
            FrameState::Initial {
                first_message: self.messages[0].clone(),
                story_asset: self.story_asset.clone(),
            }
        } else {
            self.chat_state(index, 1.0)
        };
        segments.push(Segment {
            state: Arc::new(settled),
            remaining: self.hold_frames,
            keyframe: Some(format!("message_{}", index + 1)),
        });

        for kind in &self.anchored[index] {
            let (state, keyframe) = match kind {
                SpecialKind::Image { asset_key } => (
                    FrameState::Image {
                        asset: asset_key.clone(),
                    },
                    Some(format!("inline_{}", index + 1)),
                ),
                SpecialKind::Widget => {
                    let start = (index + 1).saturating_sub(WIDGET_HISTORY);
                    (
                        FrameState::Widget {
                            messages: self.messages[start..=index].to_vec(),
                            suggestion: self.messages.get(index + 1).map(|m| m.text.clone()),
                        },
                        None,
                    )
                }
            };
            segments.push(Segment {
                state: Arc::new(state),
                remaining: self.special_frames(kind),
                keyframe,
            });
        }

        segments
    }
}

impl<'a> IntoIterator for &'a Timeline {
    type Item = Tick;
    type IntoIter = TimelineIter;

    fn into_iter(self) -> TimelineIter {
        self.iter()
    }
}

/// A run of identical frames.
#[derive(Debug)]
struct Segment {
    state: Arc<FrameState>,
    remaining: u64,
    keyframe: Option<String>,
}

impl Segment {
    fn once(state: FrameState) -> Self {
        Self {
            state: Arc::new(state),
            remaining: 1,
            keyframe: None,
        }
    }
}

/// Lazy iterator over a timeline's ticks. States are built one message at a time.
#[derive(Debug)]
pub struct TimelineIter {
    timeline: Timeline,
    next_message: usize,
    pending: VecDeque<Segment>,
    current: Option<Segment>,
    index: u64,
}

impl Iterator for TimelineIter {
    type Item = Tick;

    fn next(&mut self) -> Option<Tick> {
        loop {
            if let Some(segment) = self.current.as_mut() {
                if segment.remaining > 0 {
                    segment.remaining -= 1;
                    let tick = Tick {
                        index: self.index,
                        state: Arc::clone(&segment.state),
                        keyframe: segment.keyframe.take(),
                    };
                    self.index += 1;
                    return Some(tick);
                }
                self.current = None;
            }

            if let Some(segment) = self.pending.pop_front() {
                self.current = Some(segment);
                continue;
            }

            if self.next_message >= self.timeline.messages.len() {
                return None;
            }
            self.pending = self.timeline.segments_for(self.next_message).into();
            self.next_message += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreel_core::{RenderSettings, ThemeKind};

    fn config(hold_seconds: f64, fade_frames: u32) -> RenderConfig {
        RenderConfig::new(
            ThemeKind::IosDark,
            &RenderSettings {
                repeat_window: 2,
                hold_seconds,
                fade_frames,
                fps: 30,
            },
        )
        .unwrap()
    }

    fn chat(n: usize) -> Vec<Message> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    Message::left(format!("m{i}"))
                } else {
                    Message::right(format!("m{i}"))
                }
            })
            .collect()
    }

    #[test]
    fn test_first_message_has_no_fades() {
        let timeline = TimelineBuilder::new(chat(3)).build(&config(1.0, 8));
        assert_eq!(timeline.frames_for_message(0), 30);
        assert_eq!(timeline.frames_for_message(1), 38);
        assert_eq!(timeline.frames_for_message(2), 38);
        assert_eq!(timeline.frame_count(), 106);
        assert_eq!(timeline.iter().count(), 106);

        let first = timeline.iter().next().unwrap();
        assert!(matches!(*first.state, FrameState::Initial { .. }));
    }

    #[test]
    fn test_fades_precede_hold() {
        let timeline = TimelineBuilder::new(chat(2)).build(&config(1.0, 4));
        let ticks: Vec<Tick> = timeline.iter().collect();
        let opacities: Vec<f32> = ticks[30..34]
            .iter()
            .map(|t| match &*t.state {
                FrameState::Chat { opacity, .. } => *opacity,
                other => panic!("expected chat frame, got {}", other.kind_name()),
            })
            .collect();
        assert_eq!(opacities, vec![0.25, 0.5, 0.75, 1.0]);
        assert!(ticks[34..].iter().all(|t| t.repeats(&ticks[34])));
        assert!(!ticks[33].repeats(&ticks[34]));
    }

    #[test]
    fn test_trailing_window() {
        let timeline = TimelineBuilder::new(chat(5)).build(&config(1.0, 0));
        let last = timeline.iter().last().unwrap();
        match &*last.state {
            FrameState::Chat {
                visible,
                current_index,
                ..
            } => {
                assert_eq!(*current_index, 4);
                let texts: Vec<&str> = visible.iter().map(|m| m.text.as_str()).collect();
                assert_eq!(texts, vec!["m2", "m3", "m4"]);
            }
            other => panic!("unexpected {}", other.kind_name()),
        }
    }

    #[test]
    fn test_widget_follows_anchor_hold() {
        let elements = vec![SpecialElement::after(4, SpecialKind::Widget)];
        let timeline = TimelineBuilder::new(chat(5))
            .elements(elements)
            .build(&config(1.0, 0));
        assert_eq!(timeline.frames_for_message(3), 30 + 60);

        let ticks: Vec<Tick> = timeline.iter().collect();
        let widget = &ticks[4 * 30];
        match &*widget.state {
            FrameState::Widget {
                messages,
                suggestion,
            } => {
                let texts: Vec<&str> = messages.iter().map(|m| m.text.as_str()).collect();
                assert_eq!(texts, vec!["m1", "m2", "m3"]);
                assert_eq!(suggestion.as_deref(), Some("m4"));
            }
            other => panic!("unexpected {}", other.kind_name()),
        }
    }

    #[test]
    fn test_widget_on_last_message_has_no_suggestion() {
        let timeline = TimelineBuilder::new(chat(1))
            .elements(vec![SpecialElement::after(1, SpecialKind::Widget)])
            .build(&config(1.0, 0));
        let last = timeline.iter().last().unwrap();
        assert!(matches!(
            &*last.state,
            FrameState::Widget { suggestion: None, messages } if messages.len() == 1
        ));
    }

    #[test]
    fn test_widgets_disabled() {
        let timeline = TimelineBuilder::new(chat(2))
            .elements(vec![SpecialElement::after(1, SpecialKind::Widget)])
            .widgets(false)
            .build(&config(1.0, 0));
        assert_eq!(timeline.frame_count(), 60);
    }

    #[test]
    fn test_one_element_per_kind_per_anchor() {
        let image = |key: &str| SpecialKind::Image {
            asset_key: key.to_string(),
        };
        let timeline = TimelineBuilder::new(chat(2))
            .elements(vec![
                SpecialElement::after(2, image("a.png")),
                SpecialElement::after(2, image("b.png")),
                SpecialElement::after(2, SpecialKind::Widget),
                SpecialElement::after(0, image("early.png")),
            ])
            .build(&config(1.0, 0));
        assert_eq!(timeline.frames_for_message(1), 30 + 30 + 60);
        assert_eq!(timeline.image_assets(), vec!["a.png".to_string()]);
    }

    #[test]
    fn test_keyframe_labels() {
        let timeline = TimelineBuilder::new(chat(2))
            .elements(vec![SpecialElement::after(
                1,
                SpecialKind::Image {
                    asset_key: "cat.png".into(),
                },
            )])
            .build(&config(1.0, 2));
        let labels: Vec<(u64, String)> = timeline
            .iter()
            .filter_map(|t| t.keyframe.map(|k| (t.index, k)))
            .collect();
        assert_eq!(
            labels,
            vec![
                (0, "message_1".to_string()),
                (30, "inline_1".to_string()),
                (62, "message_2".to_string()),
            ]
        );
    }

    #[test]
    fn test_restartable() {
        let timeline = TimelineBuilder::new(chat(3)).build(&config(0.5, 3));
        let a: Vec<(u64, FrameState)> = timeline.iter().map(|t| (t.index, (*t.state).clone())).collect();
        let b: Vec<(u64, FrameState)> = timeline.iter().map(|t| (t.index, (*t.state).clone())).collect();
        assert_eq!(a, b);
    }
}
