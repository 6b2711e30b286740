//! Text painting.
//! Draws laid-out lines with glyph coverage masks; pictographic clusters are
//! drawn from their emoji glyph images when those are loaded.

use chatreel_core::{Color, FrameBuffer};

use crate::asset_cache::AssetSet;
use crate::emoji::emoji_asset_key;
use crate::fonts::GlyphSource;
use crate::image_loader::scale_to;
use crate::layout::{LayoutLine, TextLayout};

/// Horizontal alignment of a single text run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

pub struct TextPainter<'a> {
    glyphs: &'a dyn GlyphSource,
    assets: &'a AssetSet,
}

impl<'a> TextPainter<'a> {
    pub fn new(glyphs: &'a dyn GlyphSource, assets: &'a AssetSet) -> Self {
        Self { glyphs, assets }
    }

    /// Baseline that vertically centres text of `size` on `center_y`.
    pub fn baseline_for(&self, center_y: f32, size: f32) -> f32 {
        let m = self.glyphs.vertical_metrics(size);
        center_y + (m.ascent - m.descent) / 2.0
    }

    /// Draw every line of a layout. Line `i` is centred on `top + (i + 0.5) × line_height`.
    pub fn draw_layout(&self, fb: &mut FrameBuffer, layout: &TextLayout, x: f32, top: f32, color: &Color) {
        let lh = layout.style.line_height;
        for (i, line) in layout.lines.iter().enumerate() {
            let center = top + i as f32 * lh + lh / 2.0;
            self.draw_line(fb, line, x, center, layout.style.font_size, color);
        }
    }

    /// Draw one laid-out line with its vertical centre at `center_y`.
    pub fn draw_line(&self, fb: &mut FrameBuffer, line: &LayoutLine, x: f32, center_y: f32, size: f32, color: &Color) {
        let baseline = self.baseline_for(center_y, size);
        for cluster in &line.clusters {
            let cx = x + cluster.x;
            if cluster.pictographic && self.draw_emoji(fb, &cluster.text, cx, center_y, cluster.advance) {
                continue;
            }
            draw_run(fb, self.glyphs, &cluster.text, cx, baseline, size, color);
        }
    }

    /// Draw a plain run of text (no emoji lookup) centred vertically on `center_y`.
    /// Returns the run width.
    pub fn draw_text(
        &self,
        fb: &mut FrameBuffer,
        text: &str,
        x: f32,
        center_y: f32,
        size: f32,
        color: &Color,
        align: TextAlign,
    ) -> f32 {
        let width = self.glyphs.text_width(text, size);
        let start = match align {
            TextAlign::Left => x,
            TextAlign::Center => x - width / 2.0,
            TextAlign::Right => x - width,
        };
        draw_run(fb, self.glyphs, text, start, self.baseline_for(center_y, size), size, color);
        width
    }

    /// Draw the emoji image for `cluster` in a `size` square. Returns false
    /// when no real glyph image is loaded, so the caller can fall back to text.
    pub fn draw_emoji(&self, fb: &mut FrameBuffer, cluster: &str, x: f32, center_y: f32, size: f32) -> bool {
        let Some(image) = self.assets.image(&emoji_asset_key(cluster)) else {
            return false;
        };
        let px = size.round().max(1.0) as u32;
        let scaled = scale_to(image, px, px);
        fb.composite_over(&scaled, x.round() as i32, (center_y - size / 2.0).round() as i32);
        true
    }
}

/// Rasterize a run of characters starting at pen position (`x`, `baseline`).
pub fn draw_run(fb: &mut FrameBuffer, glyphs: &dyn GlyphSource, text: &str, x: f32, baseline: f32, size: f32, color: &Color) {
    let mut pen = x;
    for ch in text.chars() {
        let glyph = glyphs.rasterize(ch, size);
        if glyph.width > 0 {
            let gx = pen.round() as i32 + glyph.xmin;
            let gy = baseline.round() as i32 - (glyph.height as i32 + glyph.ymin);
            fb.blend_mask(&glyph.coverage, glyph.width, gx, gy, color);
        }
        pen += glyphs.advance(ch, size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::FixedAdvanceGlyphs;
    use crate::layout::{LayoutEngine, TextStyle};

    fn count_color(fb: &FrameBuffer, rgba: [u8; 4]) -> usize {
        fb.data.chunks_exact(4).filter(|p| *p == rgba).count()
    }

    #[test]
    fn test_draw_text_marks_pixels() {
        let assets = AssetSet::default();
        let painter = TextPainter::new(&FixedAdvanceGlyphs, &assets);
        let mut fb = FrameBuffer::solid(200, 60, &Color::BLACK);
        let width = painter.draw_text(&mut fb, "Hi", 10.0, 30.0, 40.0, &Color::WHITE, TextAlign::Left);
        assert_eq!(width, 40.0);
        assert!(count_color(&fb, [255, 255, 255, 255]) > 0);
        // Nothing to the right of the run.
        assert_eq!(fb.get_pixel(120, 30), Some([0, 0, 0, 255]));
    }

    #[test]
    fn test_text_is_centred_on_line() {
        let assets = AssetSet::default();
        let painter = TextPainter::new(&FixedAdvanceGlyphs, &assets);
        let mut fb = FrameBuffer::solid(100, 100, &Color::BLACK);
        painter.draw_text(&mut fb, "x", 0.0, 50.0, 40.0, &Color::WHITE, TextAlign::Left);
        let rows: Vec<u32> = (0..100)
            .filter(|&y| (0..100).any(|x| fb.get_pixel(x, y) == Some([255, 255, 255, 255])))
            .collect();
        let (top, bottom) = (rows[0], rows[rows.len() - 1]);
        assert!(top < 50 && bottom > 40);
    }

    #[test]
    fn test_missing_emoji_falls_back_to_text() {
        let assets = AssetSet::default();
        let painter = TextPainter::new(&FixedAdvanceGlyphs, &assets);
        let engine = LayoutEngine::new(&FixedAdvanceGlyphs);
        let layout = engine.layout(
            "👍",
            TextStyle {
                font_size: 40.0,
                max_width: 500.0,
                line_height: 48.0,
            },
        );
        let mut fb = FrameBuffer::solid(100, 60, &Color::BLACK);
        painter.draw_layout(&mut fb, &layout, 0.0, 0.0, &Color::WHITE);
        assert!(count_color(&fb, [255, 255, 255, 255]) > 0);
    }

    #[test]
    fn test_loaded_emoji_is_drawn_as_image() {
        let mut assets = AssetSet::default();
        assets.insert_image(&emoji_asset_key("👍"), FrameBuffer::solid(72, 72, &Color::RED));
        let painter = TextPainter::new(&FixedAdvanceGlyphs, &assets);
        let mut fb = FrameBuffer::solid(100, 100, &Color::BLACK);
        assert!(painter.draw_emoji(&mut fb, "👍", 10.0, 50.0, 42.0));
        assert_eq!(fb.get_pixel(30, 50), Some([255, 0, 0, 255]));
        assert_eq!(fb.get_pixel(5, 50), Some([0, 0, 0, 255]));
    }
}
