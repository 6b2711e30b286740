use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer};

/// Writes labelled still frames as PNG files into one directory.
pub struct KeyframeWriter {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl KeyframeWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: Vec::new(),
        }
    }

    /// `<stem>_keyframes/` next to the video output.
    pub fn beside(output: &Path) -> Self {
        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let parent = output.parent().unwrap_or_else(|| Path::new(""));
        Self::new(parent.join(format!("{}_keyframes", stem)))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Files written so far, in order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    /// Write `frame` as `<label>.png`.
    pub fn write(&mut self, label: &str, frame: &FrameBuffer) -> ChatreelResult<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.png", label));
        write_png(&path, frame)?;
        tracing::debug!("wrote keyframe {}", path.display());
        self.written.push(path.clone());
        Ok(path)
    }
}

/// Encode one RGBA frame as a PNG file.
pub fn write_png(path: &Path, frame: &FrameBuffer) -> ChatreelResult<()> {
    let file = File::create(path)
        .map_err(|e| ChatreelError::Encode(format!("failed to create {}: {}", path.display(), e)))?;
    let mut encoder = png::Encoder::new(BufWriter::new(file), frame.width, frame.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);

    let mut writer = encoder
        .write_header()
        .map_err(|e| ChatreelError::Encode(format!("failed to write PNG header: {}", e)))?;
    writer
        .write_image_data(&frame.data)
        .map_err(|e| ChatreelError::Encode(format!("failed to write PNG data: {}", e)))?;
    writer
        .finish()
        .map_err(|e| ChatreelError::Encode(format!("failed to finalize PNG: {}", e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreel_core::Color;

    #[test]
    fn test_beside_output() {
        let writer = KeyframeWriter::beside(Path::new("/videos/job42.mp4"));
        assert_eq!(writer.dir(), Path::new("/videos/job42_keyframes"));
    }

    #[test]
    fn test_write_keyframe() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = KeyframeWriter::new(dir.path().join("stills"));
        let frame = FrameBuffer::solid(3, 2, &Color::BLUE);
        let path = writer.write("message_1", &frame).unwrap();
        assert_eq!(path, dir.path().join("stills/message_1.png"));
        assert_eq!(writer.written().len(), 1);

        let decoder = png::Decoder::new(File::open(&path).unwrap());
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 3);
        assert_eq!(reader.info().height, 2);
    }
}
