//! Font handling.
//! Glyph metrics and coverage come from a `GlyphSource`; production uses
//! fontdue, tests and headless runs use `FixedAdvanceGlyphs`.

use std::path::Path;
use std::sync::Arc;

use fontdue::{Font, FontSettings};

use chatreel_core::{ChatreelError, ChatreelResult, FontPaths};

/// A rasterized glyph: an 8-bit coverage mask plus its placement.
#[derive(Debug, Clone)]
pub struct GlyphBitmap {
    pub width: usize,
    pub height: usize,
    /// Horizontal offset from the pen position to the bitmap's left edge.
    pub xmin: i32,
    /// Offset from the baseline to the bitmap's bottom edge (positive is up).
    pub ymin: i32,
    pub coverage: Vec<u8>,
}

/// Vertical metrics of a font at a given size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerticalMetrics {
    /// Distance above the baseline (positive).
    pub ascent: f32,
    /// Distance below the baseline (positive).
    pub descent: f32,
}

/// Anything that can measure and rasterize glyphs.
pub trait GlyphSource: Send + Sync {
    /// Horizontal advance of `ch` at `size` pixels.
    fn advance(&self, ch: char, size: f32) -> f32;

    fn rasterize(&self, ch: char, size: f32) -> GlyphBitmap;

    /// Whether the font has a real glyph for `ch`.
    fn has_glyph(&self, ch: char) -> bool;

    fn vertical_metrics(&self, size: f32) -> VerticalMetrics;

    /// Advance width of a whole string.
    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().map(|ch| self.advance(ch, size)).sum()
    }
}

/// A TrueType/OpenType face loaded through fontdue.
pub struct FontFace {
    font: Font,
}

impl FontFace {
    pub fn from_bytes(data: Vec<u8>) -> ChatreelResult<Self> {
        let font = Font::from_bytes(data, FontSettings::default())
            .map_err(|e| ChatreelError::Font(e.to_string()))?;
        Ok(Self { font })
    }

    pub fn from_file(path: &Path) -> ChatreelResult<Self> {
        let data = std::fs::read(path).map_err(|e| {
            ChatreelError::Font(format!("failed to read font file {}: {}", path.display(), e))
        })?;
        Self::from_bytes(data)
    }
}

impl GlyphSource for FontFace {
    fn advance(&self, ch: char, size: f32) -> f32 {
        self.font.metrics(ch, size).advance_width
    }

    fn rasterize(&self, ch: char, size: f32) -> GlyphBitmap {
        let (metrics, coverage) = self.font.rasterize(ch, size);
        GlyphBitmap {
            width: metrics.width,
            height: metrics.height,
            xmin: metrics.xmin,
            ymin: metrics.ymin,
            coverage,
        }
    }

    fn has_glyph(&self, ch: char) -> bool {
        self.font.lookup_glyph_index(ch) != 0
    }

    fn vertical_metrics(&self, size: f32) -> VerticalMetrics {
        match self.font.horizontal_line_metrics(size) {
            Some(m) => VerticalMetrics {
                ascent: m.ascent,
                descent: -m.descent,
            },
            None => VerticalMetrics {
                ascent: size * 0.8,
                descent: size * 0.2,
            },
        }
    }
}

/// Deterministic glyph source where every character is a box half the font
/// size wide. Needs no font file.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedAdvanceGlyphs;

impl FixedAdvanceGlyphs {
    pub const ADVANCE_RATIO: f32 = 0.5;
}

impl GlyphSource for FixedAdvanceGlyphs {
    fn advance(&self, _ch: char, size: f32) -> f32 {
        size * Self::ADVANCE_RATIO
    }

    fn rasterize(&self, ch: char, size: f32) -> GlyphBitmap {
        if ch.is_whitespace() {
            return GlyphBitmap {
                width: 0,
                height: 0,
                xmin: 0,
                ymin: 0,
                coverage: Vec::new(),
            };
        }
        let width = (size * Self::ADVANCE_RATIO * 0.8).round().max(1.0) as usize;
        let height = (size * 0.7).round().max(1.0) as usize;
        GlyphBitmap {
            width,
            height,
            xmin: (size * 0.05).round() as i32,
            ymin: 0,
            coverage: vec![255; width * height],
        }
    }

    fn has_glyph(&self, ch: char) -> bool {
        !ch.is_control()
    }

    fn vertical_metrics(&self, size: f32) -> VerticalMetrics {
        VerticalMetrics {
            ascent: size * 0.8,
            descent: size * 0.2,
        }
    }
}

/// The two weights the renderer draws with.
#[derive(Clone)]
pub struct Fonts {
    pub regular: Arc<dyn GlyphSource>,
    pub semibold: Arc<dyn GlyphSource>,
}

impl Fonts {
    /// Load fonts from disk. A missing semibold face falls back to the regular one.
    pub fn load(paths: &FontPaths) -> ChatreelResult<Self> {
        let regular_path = paths
            .regular
            .as_deref()
            .ok_or_else(|| ChatreelError::Font("no regular font configured".into()))?;
        let regular: Arc<dyn GlyphSource> = Arc::new(FontFace::from_file(regular_path)?);
        let semibold: Arc<dyn GlyphSource> = match paths.semibold.as_deref() {
            Some(path) => Arc::new(FontFace::from_file(path)?),
            None => Arc::clone(&regular),
        };
        tracing::debug!("loaded fonts from {}", regular_path.display());
        Ok(Self { regular, semibold })
    }

    /// Both weights backed by [`FixedAdvanceGlyphs`].
    pub fn fixed() -> Self {
        Self {
            regular: Arc::new(FixedAdvanceGlyphs),
            semibold: Arc::new(FixedAdvanceGlyphs),
        }
    }
}

impl std::fmt::Debug for Fonts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fonts").finish_non_exhaustive()
    }
}
