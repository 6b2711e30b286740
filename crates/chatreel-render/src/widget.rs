//! Suggestion widget overlay.
//!
//! A gradient card with a title header, a dark chat area holding up to three
//! recent messages, a caption rule, and a white box with the suggested reply.
//! Every block is measured first and the card is sized to fit.

use chatreel_core::{Color, FrameBuffer, Message, Side, Theme};
pub use chatreel_core::WidgetStyle;

use crate::asset_cache::AssetSet;
use crate::emoji::{emoji_asset_key, emoji_keys};
use crate::fonts::Fonts;
use crate::image_loader::scale_to;
use crate::layout::{BubbleLayout, BubbleStyle, LayoutEngine, TextLayout, TextStyle};
use crate::text::{draw_run, TextAlign, TextPainter};

const CARD_WIDTH: f32 = 1040.0;
const AREA_MARGIN_X: f32 = 60.0;
const AREA_OFFSET_Y: f32 = 260.0;
const AREA_PADDING: f32 = 50.0;
const AREA_RADIUS: f32 = 50.0;
const BUBBLE_GAP: f32 = 18.0;
const BUBBLE_INSET: f32 = 40.0;
const HEADER_OFFSET_Y: f32 = 160.0;
const TITLE_SIZE: f32 = 110.0;
const TITLE_OUTLINE: f32 = 11.0;
const LABEL_SIZE: f32 = 46.0;
const LABEL_TOP_GAP: f32 = 80.0;
const LABEL_BOTTOM_GAP: f32 = 60.0;
const HINT_SIZE: f32 = 56.0;
const SUGGESTION_SIZE: f32 = 44.0;
const SUGGESTION_LINE_HEIGHT: f32 = 60.0;
const SUGGESTION_PAD_LEFT: f32 = 60.0;
const COPY_ICON_SPACE: f32 = 130.0;
const SUGGESTION_MIN_HEIGHT: f32 = 140.0;
const SUGGESTION_RADIUS: f32 = 45.0;
const CARD_PADDING_BOTTOM: f32 = 80.0;

/// Measured widget geometry. All coordinates are absolute canvas pixels.
#[derive(Debug, Clone)]
pub struct WidgetLayout {
    pub top: f32,
    pub x: f32,
    /// Bubble per history slot; empty messages take no space.
    pub bubbles: Vec<Option<BubbleLayout>>,
    pub area_x: f32,
    pub area_y: f32,
    pub area_width: f32,
    pub area_height: f32,
    pub label_y: f32,
    pub suggestion: TextLayout,
    pub suggestion_y: f32,
    pub suggestion_height: f32,
    pub total_height: f32,
}

impl WidgetLayout {
    pub fn new(fonts: &Fonts, canvas_width: f32, top: f32, messages: &[Message], suggestion: Option<&str>) -> Self {
        let x = (canvas_width - CARD_WIDTH) / 2.0;
        let area_x = x + AREA_MARGIN_X;
        let area_y = top + AREA_OFFSET_Y;
        let area_width = CARD_WIDTH - AREA_MARGIN_X * 2.0;

        let bubble_engine = LayoutEngine::new(fonts.semibold.as_ref());
        let bubbles: Vec<Option<BubbleLayout>> = messages
            .iter()
            .map(|m| {
                (!m.text.trim().is_empty()).then(|| BubbleLayout::new(&bubble_engine, m, BubbleStyle::WIDGET))
            })
            .collect();
        let present: Vec<f32> = bubbles.iter().flatten().map(|b| b.height).collect();
        let gaps = present.len().saturating_sub(1) as f32 * BUBBLE_GAP;
        let area_height = AREA_PADDING * 2.0 + present.iter().sum::<f32>() + gaps;

        let suggestion_engine = LayoutEngine::new(fonts.semibold.as_ref());
        let suggestion = suggestion_engine.layout(
            suggestion.unwrap_or_default().trim(),
            TextStyle {
                font_size: SUGGESTION_SIZE,
                max_width: area_width - SUGGESTION_PAD_LEFT - COPY_ICON_SPACE,
                line_height: SUGGESTION_LINE_HEIGHT,
            },
        );

        let label_y = area_y + area_height + LABEL_TOP_GAP;
        let suggestion_y = label_y + LABEL_BOTTOM_GAP;
        let text_height = if suggestion.lines.iter().all(|l| l.clusters.is_empty()) {
            0.0
        } else {
            suggestion.height
        };
        let suggestion_height = (text_height + 120.0).max(SUGGESTION_MIN_HEIGHT);
        let total_height = suggestion_y + suggestion_height + CARD_PADDING_BOTTOM - top;

        Self {
            top,
            x,
            bubbles,
            area_x,
            area_y,
            area_width,
            area_height,
            label_y,
            suggestion,
            suggestion_y,
            suggestion_height,
            total_height,
        }
    }
}

/// Draw the widget with its top edge at `top`. Returns the drawn height.
pub fn draw_widget(
    fb: &mut FrameBuffer,
    fonts: &Fonts,
    theme: &Theme,
    style: &WidgetStyle,
    assets: &AssetSet,
    top: f32,
    messages: &[Message],
    suggestion: Option<&str>,
) -> f32 {
    let canvas_width = fb.width as f32;
    let layout = WidgetLayout::new(fonts, canvas_width, top, messages, suggestion);
    let painter = TextPainter::new(fonts.semibold.as_ref(), assets);

    fb.fill_vertical_gradient(
        0.0,
        top,
        canvas_width,
        layout.total_height,
        &rgb(0xE0, 0xD7, 0xFF),
        &Color::WHITE,
    );

    draw_header(fb, fonts, style, &layout, canvas_width / 2.0);

    fb.fill_rounded_rect(
        layout.area_x,
        layout.area_y,
        layout.area_width,
        layout.area_height,
        AREA_RADIUS,
        &theme.background,
    );

    let mut y = layout.area_y + AREA_PADDING;
    for (slot, bubble) in layout.bubbles.iter().enumerate() {
        let Some(bubble) = bubble else { continue };
        // Slots alternate left, right, left.
        let side = if slot % 2 == 1 { Side::Right } else { Side::Left };
        let bx = match side {
            Side::Right => layout.area_x + layout.area_width - bubble.width - BUBBLE_INSET,
            Side::Left => layout.area_x + BUBBLE_INSET,
        };
        let (fill, text) = match side {
            Side::Right => (&theme.right_bubble, &theme.right_text),
            Side::Left => (&theme.left_bubble, &theme.left_text),
        };
        fb.fill_rounded_rect(bx, y, bubble.width, bubble.height, bubble.style.radius, fill);
        painter.draw_layout(fb, &bubble.text, bx + bubble.style.pad_x, y + bubble.style.pad_y, text);
        y += bubble.height + BUBBLE_GAP;
    }

    draw_label(fb, fonts, style, assets, &layout, canvas_width / 2.0);

    fb.fill_rounded_rect(
        layout.area_x,
        layout.suggestion_y,
        layout.area_width,
        layout.suggestion_height,
        SUGGESTION_RADIUS,
        &Color::WHITE,
    );
    let text_top =
        layout.suggestion_y + (layout.suggestion_height - layout.suggestion.height) / 2.0;
    painter.draw_layout(
        fb,
        &layout.suggestion,
        layout.area_x + SUGGESTION_PAD_LEFT,
        text_top,
        &Color::BLACK,
    );
    draw_copy_icon(
        fb,
        layout.area_x + layout.area_width - 100.0,
        layout.suggestion_y + layout.suggestion_height / 2.0 - 20.0,
    );

    layout.total_height
}

fn rgb(r: u8, g: u8, b: u8) -> Color {
    Color::from_rgba8([r, g, b, 255])
}

fn draw_header(fb: &mut FrameBuffer, fonts: &Fonts, style: &WidgetStyle, layout: &WidgetLayout, center_x: f32) {
    let glyphs = fonts.semibold.as_ref();
    let baseline = layout.top + HEADER_OFFSET_Y;
    let width = glyphs.text_width(&style.title, TITLE_SIZE);
    let x = center_x - width / 2.0;

    draw_run(fb, glyphs, &style.title, x, baseline + 10.0, TITLE_SIZE, &Color::BLACK.with_alpha(0.35));
    // Outline: stamp the title around a circle before the fill.
    for step in 0..16 {
        let angle = step as f32 * std::f32::consts::TAU / 16.0;
        let (dx, dy) = (angle.cos() * TITLE_OUTLINE, angle.sin() * TITLE_OUTLINE);
        draw_run(fb, glyphs, &style.title, x + dx, baseline + dy, TITLE_SIZE, &Color::BLACK);
    }
    draw_run(fb, glyphs, &style.title, x, baseline, TITLE_SIZE, &rgb(0xD7, 0xBE, 0xE6));

    let icon_y = baseline - 30.0;
    draw_icon(fb, &[((16.0, -32.0), (-16.0, 0.0)), ((-16.0, 0.0), (16.0, 32.0))], layout.x + 60.0, icon_y);
    draw_icon(
        fb,
        &[((0.0, -32.0), (0.0, 32.0)), ((-32.0, 0.0), (32.0, 0.0))],
        layout.x + CARD_WIDTH - 60.0,
        icon_y,
    );
}

fn draw_icon(fb: &mut FrameBuffer, strokes: &[((f32, f32), (f32, f32))], cx: f32, cy: f32) {
    let at = |p: (f32, f32)| (cx + p.0, cy + p.1);
    for &(a, b) in strokes {
        fb.fill_capsule(at(a), at(b), 24.0, &Color::BLACK);
    }
    for &(a, b) in strokes {
        fb.fill_capsule(at(a), at(b), 12.0, &rgb(0xEA, 0xCE, 0xEA));
    }
}

fn draw_label(
    fb: &mut FrameBuffer,
    fonts: &Fonts,
    style: &WidgetStyle,
    assets: &AssetSet,
    layout: &WidgetLayout,
    center_x: f32,
) {
    let glyphs = fonts.semibold.as_ref();
    let painter = TextPainter::new(glyphs, assets);
    let y = layout.label_y;
    let text_width = glyphs.text_width(&style.label, LABEL_SIZE);
    let break_start = text_width / 2.0 + 20.0 + HINT_SIZE + 15.0;

    let hairline = Color::BLACK.with_alpha(0.1);
    let left_len = center_x - break_start - layout.area_x;
    if left_len > 0.0 {
        fb.fill_rect(layout.area_x, y - 1.0, left_len, 2.0, &hairline);
        fb.fill_rect(center_x + break_start, y - 1.0, left_len, 2.0, &hairline);
    }

    painter.draw_text(fb, &style.label, center_x, y, LABEL_SIZE, &Color::BLACK, TextAlign::Center);

    let spacing = text_width / 2.0 + 20.0 + HINT_SIZE / 2.0;
    draw_hint(fb, fonts, style, assets, center_x - spacing, y, false);
    draw_hint(fb, fonts, style, assets, center_x + spacing, y, true);
}

/// Draw the hint glyph centred on (`cx`, `cy`). Falls back to font text when
/// the glyph image is unavailable.
fn draw_hint(fb: &mut FrameBuffer, fonts: &Fonts, style: &WidgetStyle, assets: &AssetSet, cx: f32, cy: f32, mirrored: bool) {
    let size = HINT_SIZE as u32;
    let mut tile = match assets.image(&emoji_asset_key(&style.hint_glyph)) {
        Some(image) => scale_to(image, size, size),
        None => {
            let mut tile = FrameBuffer::new(size, size);
            let painter = TextPainter::new(fonts.regular.as_ref(), assets);
            painter.draw_text(
                &mut tile,
                &style.hint_glyph,
                HINT_SIZE / 2.0,
                HINT_SIZE / 2.0,
                HINT_SIZE,
                &Color::BLACK,
                TextAlign::Center,
            );
            tile
        }
    };
    if mirrored {
        tile.flip_horizontal();
    }
    let half = HINT_SIZE / 2.0;
    fb.composite_over(&tile, (cx - half).round() as i32, (cy - half).round() as i32);
}

fn draw_copy_icon(fb: &mut FrameBuffer, x: f32, y: f32) {
    fb.stroke_rect(x + 8.0, y + 8.0, 28.0, 34.0, 4.0, &Color::BLACK);
    fb.fill_rect(x, y, 28.0, 34.0, &Color::WHITE);
    fb.stroke_rect(x, y, 28.0, 34.0, 4.0, &Color::BLACK);
}

/// Emoji keys the widget needs for the given content.
pub fn widget_asset_keys(style: &WidgetStyle, messages: &[Message], suggestion: Option<&str>) -> Vec<String> {
    let mut keys = vec![emoji_asset_key(&style.hint_glyph)];
    let texts = messages.iter().map(|m| m.text.as_str()).chain(suggestion);
    for text in texts {
        for key in emoji_keys(text) {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    keys
}
