//! Frame composition — one `FrameState` → one full canvas.
//!
//! Every frame starts from a fresh background fill; nothing carries over from
//! the previous frame.

use chatreel_core::{Color, FrameBuffer, Message, RenderConfig, Side, Theme};
use chatreel_ir::FrameState;

use crate::asset_cache::AssetSet;
use crate::emoji::emoji_keys;
use crate::fonts::Fonts;
use crate::image_loader::{fit_size, scale_to};
use crate::layout::{BubbleLayout, BubbleStyle, LayoutEngine};
use crate::text::{draw_run, TextPainter};
use crate::widget::{draw_widget, widget_asset_keys, WidgetStyle};

/// Vertical gap below every chat bubble.
pub const BUBBLE_GAP: f32 = 15.0;
/// Horizontal margin between a bubble and the canvas edge.
pub const SIDE_MARGIN: f32 = 40.0;

const SCROLL_BAR_X: f32 = 1064.0;
const SCROLL_BAR_Y: f32 = 700.0;
const SCROLL_BAR_SIZE: (f32, f32) = (6.0, 250.0);
const STORY_RECT: (f32, f32, f32, f32) = (610.0, 650.0, 420.0, 560.0);
const STORY_RADIUS: f32 = 35.0;
const CAPTION: &str = "Sent a reply to your story";
const CAPTION_SIZE: f32 = 34.0;
const CAPTION_POS: (f32, f32) = (610.0, 610.0);
const FIRST_BUBBLE_Y: f32 = 1240.0;
const WIDGET_TOP: f32 = 400.0;

/// A bubble positioned on the canvas.
#[derive(Debug, Clone)]
pub struct PlacedBubble {
    pub side: Side,
    pub layout: BubbleLayout,
    pub x: f32,
    pub y: f32,
}

/// The vertically centred bubble stack of a chat frame.
#[derive(Debug, Clone)]
pub struct ChatLayout {
    pub bubbles: Vec<PlacedBubble>,
    /// Sum of bubble heights plus gaps.
    pub total_height: f32,
    pub start_y: f32,
}

/// Renders frame states with a fixed theme and canvas.
pub struct FrameComposer {
    fonts: Fonts,
    theme: Theme,
    width: u32,
    height: u32,
    widget: WidgetStyle,
}

impl FrameComposer {
    pub fn new(fonts: Fonts, config: &RenderConfig) -> Self {
        Self {
            fonts,
            theme: config.theme.clone(),
            width: config.canvas_width,
            height: config.canvas_height,
            widget: WidgetStyle::default(),
        }
    }

    pub fn with_widget_style(mut self, style: WidgetStyle) -> Self {
        self.widget = style;
        self
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Asset keys that must be loaded before `render` is called for `state`.
    pub fn required_assets(&self, state: &FrameState) -> Vec<String> {
        match state {
            FrameState::Initial {
                first_message,
                story_asset,
            } => {
                let mut keys: Vec<String> = story_asset.iter().cloned().collect();
                keys.extend(emoji_keys(&first_message.text));
                keys
            }
            FrameState::Chat { visible, .. } => {
                let mut keys: Vec<String> = Vec::new();
                for key in visible.iter().flat_map(|m| emoji_keys(&m.text)) {
                    if !keys.contains(&key) {
                        keys.push(key);
                    }
                }
                keys
            }
            FrameState::Image { asset } => vec![asset.clone()],
            FrameState::Widget {
                messages,
                suggestion,
            } => widget_asset_keys(&self.widget, messages, suggestion.as_deref()),
        }
    }

    /// Measured height a message takes in the chat stack, gap included.
    pub fn measure_message(&self, message: &Message) -> f32 {
        self.bubble(message).height + BUBBLE_GAP
    }

    fn bubble(&self, message: &Message) -> BubbleLayout {
        let engine = LayoutEngine::new(self.fonts.regular.as_ref());
        BubbleLayout::new(&engine, message, BubbleStyle::CHAT)
    }

    fn bubble_x(&self, side: Side, bubble: &BubbleLayout) -> f32 {
        match side {
            Side::Right => self.width as f32 - bubble.width - SIDE_MARGIN,
            Side::Left => SIDE_MARGIN,
        }
    }

    /// The first message on the story-reply frame, always sent from the right.
    pub fn initial_bubble(&self, first: &Message) -> PlacedBubble {
        let layout = self.bubble(&Message::right(first.text.clone()));
        PlacedBubble {
            side: Side::Right,
            x: self.bubble_x(Side::Right, &layout),
            y: FIRST_BUBBLE_Y,
            layout,
        }
    }

    /// Two-pass stack layout: measure every bubble, centre the stack, then
    /// place bubbles top to bottom using the measured geometry.
    pub fn chat_layout(&self, visible: &[Message]) -> ChatLayout {
        let measured: Vec<(Side, BubbleLayout)> = visible.iter().map(|m| (m.side, self.bubble(m))).collect();
        let total_height: f32 = measured.iter().map(|(_, b)| b.height + BUBBLE_GAP).sum();
        let start_y = (self.height as f32 - total_height) / 2.0;

        let mut y = start_y;
        let bubbles = measured
            .into_iter()
            .map(|(side, layout)| {
                let placed = PlacedBubble {
                    side,
                    x: self.bubble_x(side, &layout),
                    y,
                    layout,
                };
                y += placed.layout.height + BUBBLE_GAP;
                placed
            })
            .collect();

        ChatLayout {
            bubbles,
            total_height,
            start_y,
        }
    }

    /// Render one frame.
    pub fn render(&self, state: &FrameState, assets: &AssetSet) -> FrameBuffer {
        let mut fb = FrameBuffer::solid(self.width, self.height, &self.theme.background);
        match state {
            FrameState::Initial {
                first_message,
                story_asset,
            } => self.render_initial(&mut fb, first_message, story_asset.as_deref(), assets),
            FrameState::Chat {
                visible, opacity, ..
            } => self.render_chat(&mut fb, visible, *opacity, assets),
            FrameState::Image { asset } => self.render_image(&mut fb, asset, assets),
            FrameState::Widget {
                messages,
                suggestion,
            } => {
                draw_widget(
                    &mut fb,
                    &self.fonts,
                    &self.theme,
                    &self.widget,
                    assets,
                    WIDGET_TOP,
                    messages,
                    suggestion.as_deref(),
                );
            }
        }
        fb
    }

    fn render_initial(&self, fb: &mut FrameBuffer, first: &Message, story: Option<&str>, assets: &AssetSet) {
        let bar = self.theme.background.contrast().with_alpha(0.3);
        let (bw, bh) = SCROLL_BAR_SIZE;
        fb.fill_rounded_rect(SCROLL_BAR_X, SCROLL_BAR_Y, bw, bh, bw / 2.0, &bar);

        if let Some(image) = story.and_then(|key| assets.get(key)).map(|a| a.image.as_ref()) {
            let (x, y, w, h) = STORY_RECT;
            let mut clipped = scale_to(image, w as u32, h as u32);
            clipped.round_corners(STORY_RADIUS);
            fb.composite_over(&clipped, x as i32, y as i32);
        }

        let (cx, cy) = CAPTION_POS;
        draw_run(
            fb,
            self.fonts.semibold.as_ref(),
            CAPTION,
            cx,
            cy,
            CAPTION_SIZE,
            &self.theme.secondary,
        );

        let b = self.initial_bubble(first);
        self.draw_bubble(fb, b.side, &b.layout, b.x, b.y, assets);
    }

    fn render_chat(&self, fb: &mut FrameBuffer, visible: &[Message], opacity: f32, assets: &AssetSet) {
        let layout = self.chat_layout(visible);
        if opacity >= 1.0 {
            for b in &layout.bubbles {
                self.draw_bubble(fb, b.side, &b.layout, b.x, b.y, assets);
            }
            return;
        }

        // Flat alpha over the background: draw on a clear layer, then blend once.
        let mut layer = FrameBuffer::new(self.width, self.height);
        for b in &layout.bubbles {
            self.draw_bubble(&mut layer, b.side, &b.layout, b.x, b.y, assets);
        }
        fb.composite_over_with_opacity(&layer, 0, 0, opacity);
    }

    fn render_image(&self, fb: &mut FrameBuffer, key: &str, assets: &AssetSet) {
        fb.fill(&Color::BLACK);
        let Some(asset) = assets.get(key) else {
            tracing::warn!("image frame asset '{}' was not loaded", key);
            return;
        };
        let (w, h) = fit_size(&asset.image, self.width, self.height);
        if w == 0 || h == 0 {
            return;
        }
        let scaled = scale_to(&asset.image, w, h);
        let dx = (self.width as i32 - w as i32) / 2;
        let dy = (self.height as i32 - h as i32) / 2;
        fb.composite_over(&scaled, dx, dy);
    }

    fn draw_bubble(&self, fb: &mut FrameBuffer, side: Side, bubble: &BubbleLayout, x: f32, y: f32, assets: &AssetSet) {
        let text_color = if bubble.sticker {
            self.theme.background.contrast()
        } else {
            let (fill, text) = match side {
                Side::Right => (&self.theme.right_bubble, self.theme.right_text),
                Side::Left => (&self.theme.left_bubble, self.theme.left_text),
            };
            fb.fill_rounded_rect(x, y, bubble.width, bubble.height, bubble.style.radius, fill);
            text
        };
        let painter = TextPainter::new(self.fonts.regular.as_ref(), assets);
        painter.draw_layout(fb, &bubble.text, x + bubble.style.pad_x, y + bubble.style.pad_y, &text_color);
    }
}
