//! Image decoding and scaling.
//! Decodes PNG, JPEG, GIF and WebP into FrameBuffers.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbaImage;

use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer};

/// Load an image file and convert it to a FrameBuffer.
pub fn load_image(path: &Path) -> ChatreelResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        ChatreelError::asset(
            path.display().to_string(),
            format!("failed to load image: {}", e),
        )
    })?;
    into_frame(img.to_rgba8())
}

/// Decode an image from raw bytes. The format is sniffed from the content.
pub fn load_image_from_bytes(key: &str, data: &[u8]) -> ChatreelResult<FrameBuffer> {
    let format = image::guess_format(data)
        .map_err(|e| ChatreelError::asset(key, format!("unrecognized image data: {}", e)))?;
    let img = image::load_from_memory_with_format(data, format)
        .map_err(|e| ChatreelError::asset(key, format!("failed to decode image: {}", e)))?;
    into_frame(img.to_rgba8())
}

fn into_frame(rgba: RgbaImage) -> ChatreelResult<FrameBuffer> {
    let (width, height) = rgba.dimensions();
    FrameBuffer::from_raw(width, height, rgba.into_raw())
        .ok_or_else(|| ChatreelError::Render("decoded image has an unexpected size".into()))
}

/// Bilinear resample to an exact size.
pub fn scale_to(fb: &FrameBuffer, width: u32, height: u32) -> FrameBuffer {
    let width = width.max(1);
    let height = height.max(1);
    if width == fb.width && height == fb.height {
        return fb.clone();
    }
    let Some(src) = RgbaImage::from_raw(fb.width, fb.height, fb.data.clone()) else {
        return FrameBuffer::new(width, height);
    };
    let resized = image::imageops::resize(&src, width, height, FilterType::Triangle);
    FrameBuffer::from_raw(width, height, resized.into_raw()).unwrap_or_else(|| FrameBuffer::new(width, height))
}

/// Size of `fb` scaled to fit inside `max_width × max_height`, preserving
/// aspect ratio. Upscales small images.
pub fn fit_size(fb: &FrameBuffer, max_width: u32, max_height: u32) -> (u32, u32) {
    if fb.width == 0 || fb.height == 0 {
        return (0, 0);
    }
    let scale = (max_width as f64 / fb.width as f64).min(max_height as f64 / fb.height as f64);
    (
        ((fb.width as f64 * scale).round() as u32).clamp(1, max_width.max(1)),
        ((fb.height as f64 * scale).round() as u32).clamp(1, max_height.max(1)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreel_core::Color;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_load_image_missing_file() {
        assert!(load_image(Path::new("/nonexistent/image.png")).is_err());
    }

    #[test]
    fn test_load_from_bytes() {
        let fb = load_image_from_bytes("t.png", &png_bytes(3, 2)).unwrap();
        assert_eq!((fb.width, fb.height), (3, 2));
        assert_eq!(fb.get_pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let err = load_image_from_bytes("clip.mp4", b"\x00\x00\x00\x18ftypmp42").unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_fit_size_preserves_aspect() {
        let wide = FrameBuffer::solid(200, 100, &Color::RED);
        assert_eq!(fit_size(&wide, 1080, 1920), (1080, 540));
        let tall = FrameBuffer::solid(100, 400, &Color::RED);
        assert_eq!(fit_size(&tall, 1080, 1920), (480, 1920));
    }

    #[test]
    fn test_scale_to_exact_size() {
        let fb = FrameBuffer::solid(10, 10, &Color::RED);
        let scaled = scale_to(&fb, 4, 7);
        assert_eq!((scaled.width, scaled.height), (4, 7));
        assert_eq!(scaled.get_pixel(2, 3), Some([255, 0, 0, 255]));
    }
}
