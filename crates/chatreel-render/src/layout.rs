//! Text layout — grapheme-aware greedy word wrap and bubble geometry.
//!
//! `layout` is the only place geometry is computed. `measure` and every draw
//! path go through it, so measured and drawn sizes can never disagree.

use unicode_segmentation::UnicodeSegmentation;

use chatreel_core::Message;

use crate::emoji::{is_pictographic, is_sticker};
use crate::fonts::GlyphSource;

/// Pictographic clusters advance by this multiple of the font size.
pub const EMOJI_ADVANCE_RATIO: f32 = 1.05;

/// Parameters of one text block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font_size: f32,
    /// Maximum line width before wrapping.
    pub max_width: f32,
    pub line_height: f32,
}

/// One grapheme cluster placed on a line.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCluster {
    pub text: String,
    pub pictographic: bool,
    /// Offset from the line start.
    pub x: f32,
    pub advance: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutLine {
    pub clusters: Vec<PlacedCluster>,
    pub width: f32,
}

impl LayoutLine {
    pub fn text(&self) -> String {
        self.clusters.iter().map(|c| c.text.as_str()).collect()
    }
}

/// Wrapped, measured text.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLayout {
    pub lines: Vec<LayoutLine>,
    /// Widest line.
    pub width: f32,
    /// `lines × line_height`.
    pub height: f32,
    pub style: TextStyle,
}

/// Measures and wraps text against a glyph source.
pub struct LayoutEngine<'a> {
    glyphs: &'a dyn GlyphSource,
}

impl<'a> LayoutEngine<'a> {
    pub fn new(glyphs: &'a dyn GlyphSource) -> Self {
        Self { glyphs }
    }

    /// Advance of one grapheme cluster.
    pub fn cluster_advance(&self, cluster: &str, font_size: f32) -> f32 {
        if is_pictographic(cluster) {
            font_size * EMOJI_ADVANCE_RATIO
        } else {
            self.glyphs.text_width(cluster, font_size)
        }
    }

    /// Width of a run of text on one line.
    pub fn text_width(&self, text: &str, font_size: f32) -> f32 {
        text.graphemes(true)
            .map(|cluster| self.cluster_advance(cluster, font_size))
            .sum()
    }

    /// Greedy word wrap. A word wider than `max_width` gets a line to itself.
    pub fn layout(&self, text: &str, style: TextStyle) -> TextLayout {
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();

        for word in text.trim().split(' ') {
            if current.is_empty() {
                current.push_str(word);
                continue;
            }
            let candidate = format!("{} {}", current, word);
            if self.text_width(&candidate, style.font_size) > style.max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }
        lines.push(current);

        let lines: Vec<LayoutLine> = lines.iter().map(|l| self.place_line(l, style.font_size)).collect();
        let width = lines.iter().map(|l| l.width).fold(0.0, f32::max);
        let height = lines.len() as f32 * style.line_height;
        TextLayout {
            lines,
            width,
            height,
            style,
        }
    }

    /// Height of the laid-out text.
    pub fn measure(&self, text: &str, style: TextStyle) -> f32 {
        self.layout(text, style).height
    }

    fn place_line(&self, line: &str, font_size: f32) -> LayoutLine {
        let mut x = 0.0;
        let clusters = line
            .graphemes(true)
            .map(|cluster| {
                let advance = self.cluster_advance(cluster, font_size);
                let placed = PlacedCluster {
                    text: cluster.to_string(),
                    pictographic: is_pictographic(cluster),
                    x,
                    advance,
                };
                x += advance;
                placed
            })
            .collect();
        LayoutLine { clusters, width: x }
    }
}

/// Geometry constants of a chat bubble family.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BubbleStyle {
    pub font_size: f32,
    /// Font size for sticker messages; `None` disables sticker rendering.
    pub sticker_font_size: Option<f32>,
    pub pad_x: f32,
    pub pad_y: f32,
    /// Outer bubble width cap, padding included.
    pub max_width: f32,
    pub line_height_ratio: f32,
    pub radius: f32,
}

impl BubbleStyle {
    /// Bubbles of the main chat screen.
    pub const CHAT: BubbleStyle = BubbleStyle {
        font_size: 44.0,
        sticker_font_size: Some(115.0),
        pad_x: 36.0,
        pad_y: 26.0,
        max_width: 780.0,
        line_height_ratio: 1.2,
        radius: 50.0,
    };

    /// Compact bubbles inside the suggestion widget.
    pub const WIDGET: BubbleStyle = BubbleStyle {
        font_size: 36.0,
        sticker_font_size: None,
        pad_x: 30.0,
        pad_y: 20.0,
        max_width: 610.0,
        line_height_ratio: 44.0 / 36.0,
        radius: 28.0,
    };
}

/// A measured message bubble.
#[derive(Debug, Clone, PartialEq)]
pub struct BubbleLayout {
    pub text: TextLayout,
    pub sticker: bool,
    pub width: f32,
    pub height: f32,
    pub style: BubbleStyle,
}

impl BubbleLayout {
    pub fn new(engine: &LayoutEngine<'_>, message: &Message, style: BubbleStyle) -> Self {
        let text = message.text.trim();
        let sticker_size = style.sticker_font_size.filter(|_| is_sticker(text));
        let font_size = sticker_size.unwrap_or(style.font_size);
        let text_style = TextStyle {
            font_size,
            max_width: style.max_width - style.pad_x * 2.0,
            line_height: font_size * style.line_height_ratio,
        };
        let layout = engine.layout(text, text_style);
        let width = (layout.width + style.pad_x * 2.0).min(style.max_width);
        let height = layout.height + style.pad_y * 2.0;
        Self {
            text: layout,
            sticker: sticker_size.is_some(),
            width,
            height,
            style,
        }
    }
}
