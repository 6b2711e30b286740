use serde::{Deserialize, Serialize};

use crate::Color;

/// Pixel format of a frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA, straight alpha (4 bytes per pixel).
    Rgba8,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            PixelFormat::Rgba8 => 4,
        }
    }

    /// Name of this layout in ffmpeg's `-pix_fmt` vocabulary.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            PixelFormat::Rgba8 => "rgba",
        }
    }
}

/// A single video frame as a raw pixel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameBuffer {
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel format.
    pub format: PixelFormat,
}

impl FrameBuffer {
    /// Create a new frame buffer filled with zeros (transparent black).
    pub fn new(width: u32, height: u32) -> Self {
        let format = PixelFormat::Rgba8;
        let size = (width as usize) * (height as usize) * format.bytes_per_pixel();
        Self {
            data: vec![0u8; size],
            width,
            height,
            format,
        }
    }

    /// Create a frame buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: &Color) -> Self {
        let pixel = color.to_rgba8();
        let pixel_count = (width as usize) * (height as usize);
        let mut data = Vec::with_capacity(pixel_count * 4);
        for _ in 0..pixel_count {
            data.extend_from_slice(&pixel);
        }
        Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        }
    }

    /// Wrap raw RGBA bytes. Returns None when the length does not match the dimensions.
    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> Option<Self> {
        if data.len() != (width as usize) * (height as usize) * 4 {
            return None;
        }
        Some(Self {
            data,
            width,
            height,
            format: PixelFormat::Rgba8,
        })
    }

    /// Total number of pixels.
    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    /// Total byte size of the pixel data.
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    fn offset(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + (x as usize)) * self.format.bytes_per_pixel()
    }

    /// Get the RGBA value at a pixel coordinate. Returns None if out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let o = self.offset(x, y);
        Some([
            self.data[o],
            self.data[o + 1],
            self.data[o + 2],
            self.data[o + 3],
        ])
    }

    /// Set the RGBA value at a pixel coordinate. No-op if out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let o = self.offset(x, y);
        self.data[o..o + 4].copy_from_slice(&rgba);
    }

    /// Source-over blend a color into one pixel, scaled by `coverage` in [0, 1].
    /// No-op if out of bounds.
    pub fn blend_pixel(&mut self, x: i32, y: i32, color: [u8; 4], coverage: f32) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let sa = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u32;
        if sa == 0 {
            return;
        }
        let o = self.offset(x as u32, y as u32);
        blend_over(&mut self.data[o..o + 4], [color[0], color[1], color[2]], sa);
    }

    /// Overwrite every pixel with a color.
    pub fn fill(&mut self, color: &Color) {
        let pixel = color.to_rgba8();
        for d in self.data.chunks_exact_mut(4) {
            d.copy_from_slice(&pixel);
        }
    }

    /// Blend an axis-aligned rectangle. Edges are snapped to whole pixels.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: &Color) {
        let rgba = color.to_rgba8();
        let (x0, y0, x1, y1) = self.clamp_box(x, y, x + w, y + h);
        for py in y0..y1 {
            for px in x0..x1 {
                self.blend_pixel(px, py, rgba, 1.0);
            }
        }
    }

    /// Blend an anti-aliased rounded rectangle.
    pub fn fill_rounded_rect(&mut self, x: f32, y: f32, w: f32, h: f32, radius: f32, color: &Color) {
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let rgba = color.to_rgba8();
        let (x0, y0, x1, y1) = self.clamp_box(x - 1.0, y - 1.0, x + w + 1.0, y + h + 1.0);
        for py in y0..y1 {
            for px in x0..x1 {
                let d = rounded_rect_distance(px as f32 + 0.5, py as f32 + 0.5, x, y, w, h, radius);
                let coverage = (0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend_pixel(px, py, rgba, coverage);
                }
            }
        }
    }

    /// Blend a vertical gradient over a rectangle.
    pub fn fill_vertical_gradient(&mut self, x: f32, y: f32, w: f32, h: f32, top: &Color, bottom: &Color) {
        let (x0, y0, x1, y1) = self.clamp_box(x, y, x + w, y + h);
        for py in y0..y1 {
            let t = if h > 1.0 { (py as f32 - y) / (h - 1.0) } else { 0.0 };
            let rgba = top.lerp(bottom, t).to_rgba8();
            for px in x0..x1 {
                self.blend_pixel(px, py, rgba, 1.0);
            }
        }
    }

    /// Blend a thick line segment with round caps.
    pub fn fill_capsule(&mut self, from: (f32, f32), to: (f32, f32), thickness: f32, color: &Color) {
        let rgba = color.to_rgba8();
        let half = thickness / 2.0;
        let (x0, y0, x1, y1) = self.clamp_box(
            from.0.min(to.0) - half - 1.0,
            from.1.min(to.1) - half - 1.0,
            from.0.max(to.0) + half + 1.0,
            from.1.max(to.1) + half + 1.0,
        );
        for py in y0..y1 {
            for px in x0..x1 {
                let d = segment_distance(px as f32 + 0.5, py as f32 + 0.5, from, to) - half;
                let coverage = (0.5 - d).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend_pixel(px, py, rgba, coverage);
                }
            }
        }
    }

    /// Stroke the outline of an axis-aligned rectangle.
    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, line_width: f32, color: &Color) {
        let half = line_width / 2.0;
        self.fill_rect(x - half, y - half, w + line_width, line_width, color);
        self.fill_rect(x - half, y + h - half, w + line_width, line_width, color);
        self.fill_rect(x - half, y + half, line_width, h - line_width, color);
        self.fill_rect(x + w - half, y + half, line_width, h - line_width, color);
    }

    /// Blend an 8-bit coverage mask (e.g. a rasterized glyph) tinted with `color`.
    pub fn blend_mask(&mut self, mask: &[u8], mask_width: usize, x: i32, y: i32, color: &Color) {
        if mask_width == 0 {
            return;
        }
        let rgba = color.to_rgba8();
        for (row, line) in mask.chunks_exact(mask_width).enumerate() {
            for (col, &coverage) in line.iter().enumerate() {
                if coverage == 0 {
                    continue;
                }
                self.blend_pixel(x + col as i32, y + row as i32, rgba, coverage as f32 / 255.0);
            }
        }
    }

    /// Multiply alpha by a rounded-rectangle mask covering the whole buffer.
    pub fn round_corners(&mut self, radius: f32) {
        let (w, h) = (self.width as f32, self.height as f32);
        for py in 0..self.height {
            for px in 0..self.width {
                let d = rounded_rect_distance(px as f32 + 0.5, py as f32 + 0.5, 0.0, 0.0, w, h, radius);
                let coverage = (0.5 - d).clamp(0.0, 1.0);
                if coverage < 1.0 {
                    let o = self.offset(px, py);
                    self.data[o + 3] = (self.data[o + 3] as f32 * coverage).round() as u8;
                }
            }
        }
    }

    /// Mirror the buffer left to right.
    pub fn flip_horizontal(&mut self) {
        let stride = self.width as usize * 4;
        for row in self.data.chunks_exact_mut(stride) {
            let pixels = row.len() / 4;
            for i in 0..pixels / 2 {
                let j = pixels - 1 - i;
                for c in 0..4 {
                    row.swap(i * 4 + c, j * 4 + c);
                }
            }
        }
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy).
    pub fn composite_over(&mut self, src: &FrameBuffer, dx: i32, dy: i32) {
        self.composite_over_with_opacity(src, dx, dy, 1.0);
    }

    /// Alpha-composite `src` on top of `self` at position (dx, dy), with every
    /// source alpha scaled by `opacity`.
    /// Uses integer math in the inner loop so it auto-vectorizes.
    pub fn composite_over_with_opacity(&mut self, src: &FrameBuffer, dx: i32, dy: i32, opacity: f32) {
        let opacity = (opacity.clamp(0.0, 1.0) * 255.0).round() as u32;
        if opacity == 0 {
            return;
        }

        let dst_width = self.width as i32;
        let dst_height = self.height as i32;

        let mut start_y = 0;
        let mut end_y = src.height as i32;
        let mut start_x = 0;
        let mut end_x = src.width as i32;

        if dy < 0 { start_y = -dy; }
        if dy + end_y > dst_height { end_y = dst_height - dy; }
        if dx < 0 { start_x = -dx; }
        if dx + end_x > dst_width { end_x = dst_width - dx; }

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        let src_stride = (src.width * 4) as usize;
        let dst_stride = (self.width * 4) as usize;

        for sy in start_y..end_y {
            let dst_y = dy + sy;
            let src_row_start = (sy as usize * src_stride) + (start_x as usize * 4);
            let dst_row_start = (dst_y as usize * dst_stride) + ((dx + start_x) as usize * 4);
            let len = (end_x - start_x) as usize * 4;

            let src_slice = &src.data[src_row_start..src_row_start + len];
            let dst_slice = &mut self.data[dst_row_start..dst_row_start + len];

            for (s, d) in src_slice.chunks_exact(4).zip(dst_slice.chunks_exact_mut(4)) {
                let sa = (s[3] as u32 * opacity) / 255;
                if sa == 0 {
                    continue;
                }
                blend_over(d, [s[0], s[1], s[2]], sa);
            }
        }
    }

    /// Clamp a float box to integer pixel bounds inside the buffer.
    fn clamp_box(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> (i32, i32, i32, i32) {
        let cx0 = (x0.round() as i32).max(0);
        let cy0 = (y0.round() as i32).max(0);
        let cx1 = (x1.round() as i32).min(self.width as i32);
        let cy1 = (y1.round() as i32).min(self.height as i32);
        (cx0, cy0, cx1, cy1)
    }
}

/// Porter-Duff "over" for straight-alpha RGBA, source alpha `sa` in 0..=255.
fn blend_over(d: &mut [u8], s: [u8; 3], sa: u32) {
    if sa >= 255 {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 255;
        return;
    }

    let da = d[3] as u32;
    let inv_sa = 255 - sa;
    let out_a = sa + ((da * inv_sa) / 255);
    if out_a == 0 {
        return;
    }

    for c in 0..3 {
        let sc = s[c] as u32;
        let dc = d[c] as u32;
        d[c] = ((sc * sa * 255 + dc * da * inv_sa) / (out_a * 255)) as u8;
    }
    d[3] = out_a as u8;
}

/// Signed distance from a point to a rounded rectangle (negative inside).
fn rounded_rect_distance(px: f32, py: f32, x: f32, y: f32, w: f32, h: f32, radius: f32) -> f32 {
    let hw = w / 2.0;
    let hh = h / 2.0;
    let r = radius.clamp(0.0, hw.min(hh));
    let qx = (px - (x + hw)).abs() - (hw - r);
    let qy = (py - (y + hh)).abs() - (hh - r);
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    outside + qx.max(qy).min(0.0) - r
}

/// Distance from a point to a line segment.
fn segment_distance(px: f32, py: f32, a: (f32, f32), b: (f32, f32)) -> f32 {
    let (vx, vy) = (b.0 - a.0, b.1 - a.1);
    let len_sq = vx * vx + vy * vy;
    let t = if len_sq > 0.0 {
        (((px - a.0) * vx + (py - a.1) * vy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (a.0 + vx * t, a.1 + vy * t);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}
