use serde::{Deserialize, Serialize};
use std::fmt;

/// Straight-alpha RGBA color, each channel in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque color.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from 8-bit RGBA channels.
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self::rgba(
            rgba[0] as f32 / 255.0,
            rgba[1] as f32 / 255.0,
            rgba[2] as f32 / 255.0,
            rgba[3] as f32 / 255.0,
        )
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`; the leading `#` is optional.
    pub fn from_hex(hex: &str) -> Result<Self, ColorError> {
        let hex = hex.trim_start_matches('#');
        let channel = |range: std::ops::Range<usize>| {
            hex.get(range)
                .and_then(|digits| u8::from_str_radix(digits, 16).ok())
                .ok_or(ColorError::InvalidHex)
        };
        match hex.len() {
            6 => Ok(Self::from_rgba8([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255])),
            8 => Ok(Self::from_rgba8([
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            ])),
            _ => Err(ColorError::InvalidHex),
        }
    }

    /// Quantize to 8-bit channels.
    pub fn to_rgba8(&self) -> [u8; 4] {
        [
            (self.r * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.g * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.b * 255.0).round().clamp(0.0, 255.0) as u8,
            (self.a * 255.0).round().clamp(0.0, 255.0) as u8,
        ]
    }

    /// The same color with its alpha replaced.
    pub fn with_alpha(&self, a: f32) -> Color {
        Color { a: a.clamp(0.0, 1.0), ..*self }
    }

    /// Relative luminance approximation, used to pick contrasting foregrounds.
    pub fn luminance(&self) -> f32 {
        0.2126 * self.r + 0.7152 * self.g + 0.0722 * self.b
    }

    /// Whether this color reads as a light background.
    pub fn is_light(&self) -> bool {
        self.luminance() > 0.5
    }

    /// Black on light colors, white on dark ones.
    pub fn contrast(&self) -> Color {
        if self.is_light() {
            Color::BLACK
        } else {
            Color::WHITE
        }
    }

    pub fn lerp(&self, other: &Color, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        Color {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    pub const TRANSPARENT: Color = Color::rgba(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Color = Color::rgb(0.0, 0.0, 0.0);
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
}

impl Default for Color {
    fn default() -> Self {
        Color::BLACK
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba8();
        if a == 255 {
            write!(f, "#{:02X}{:02X}{:02X}", r, g, b)
        } else {
            write!(f, "#{:02X}{:02X}{:02X}{:02X}", r, g, b, a)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ColorError {
    #[error("invalid hex color string")]
    InvalidHex,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_palette_hex() {
        assert_eq!(Color::from_hex("#007AFF").unwrap().to_rgba8(), [0, 122, 255, 255]);
        assert_eq!(Color::from_hex("c01f4a").unwrap().to_rgba8(), [192, 31, 74, 255]);
        assert_eq!(Color::from_hex("#E9E9EB4D").unwrap().to_rgba8(), [233, 233, 235, 77]);
    }

    #[test]
    fn test_rejects_malformed_hex() {
        for bad in ["", "#12345", "#GG0000", "#26262ß", "#007AFF0"] {
            assert!(Color::from_hex(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_contrast_picks_readable_foreground() {
        assert_eq!(Color::WHITE.contrast(), Color::BLACK);
        assert_eq!(Color::from_hex("#26262b").unwrap().contrast(), Color::WHITE);
        assert_eq!(Color::from_hex("#E0D7FF").unwrap().contrast(), Color::BLACK);
    }

    #[test]
    fn test_gradient_endpoints() {
        let top = Color::from_hex("#E0D7FF").unwrap();
        assert_eq!(top.lerp(&Color::WHITE, 0.0), top);
        assert_eq!(top.lerp(&Color::WHITE, 2.0).to_rgba8(), [255, 255, 255, 255]);
        let mid = Color::BLACK.lerp(&Color::WHITE, 0.5).to_rgba8();
        assert!(mid[..3].iter().all(|&c| c == 128));
    }

    #[test]
    fn test_with_alpha_and_display() {
        let scroll = Color::WHITE.with_alpha(0.3);
        assert_eq!(scroll.to_rgba8()[3], 77);
        assert_eq!(Color::from_hex("#8E8E93").unwrap().to_string(), "#8E8E93");
        assert_eq!(scroll.to_string(), "#FFFFFF4D");
    }
}
