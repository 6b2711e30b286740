//! Frame spool — the ordered frame sequence persisted to temporary storage so
//! a fallback encode can replay it without re-rendering.
//!
//! Runs of the same frame object are stored once. Every stored frame carries a
//! content hash that is checked when it is read back.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chatreel_core::hash::{hash_frame, hash_rgba, ContentHash};
use chatreel_core::{ChatreelError, ChatreelResult, FrameBuffer};

#[derive(Debug, Clone, Copy)]
struct Slot {
    offset: u64,
    hash: ContentHash,
}

pub struct FrameSpool {
    path: PathBuf,
    writer: BufWriter<File>,
    width: u32,
    height: u32,
    frame_bytes: usize,
    slots: Vec<Slot>,
    /// Slot index of every pushed frame, in order.
    order: Vec<usize>,
    last: Option<Arc<FrameBuffer>>,
    written: u64,
}

impl FrameSpool {
    /// Create a spool file inside `dir`.
    pub fn create(dir: &Path, width: u32, height: u32) -> ChatreelResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("frames.rgba");
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            width,
            height,
            frame_bytes: width as usize * height as usize * 4,
            slots: Vec::new(),
            order: Vec::new(),
            last: None,
            written: 0,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a frame. Pushing the same `Arc` as the previous frame stores a reference.
    pub fn push(&mut self, frame: &Arc<FrameBuffer>) -> ChatreelResult<()> {
        if frame.width != self.width || frame.height != self.height || frame.data.len() != self.frame_bytes {
            return Err(ChatreelError::Encode(format!(
                "frame {} is {}x{}, expected {}x{}",
                self.order.len(),
                frame.width,
                frame.height,
                self.width,
                self.height
            )));
        }

        let repeat = self.last.as_ref().is_some_and(|last| Arc::ptr_eq(last, frame));
        if !repeat {
            self.writer.write_all(&frame.data)?;
            self.slots.push(Slot {
                offset: self.written,
                hash: hash_frame(frame),
            });
            self.written += self.frame_bytes as u64;
            self.last = Some(Arc::clone(frame));
        }
        self.order.push(self.slots.len() - 1);
        Ok(())
    }

    /// Number of frames pushed.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of distinct frames stored.
    pub fn unique_frames(&self) -> usize {
        self.slots.len()
    }

    /// Read the frames back in push order.
    pub fn replay(&mut self) -> ChatreelResult<SpoolReplay<'_>> {
        self.writer.flush()?;
        let file = File::open(&self.path)?;
        Ok(SpoolReplay {
            spool: self,
            file,
            position: 0,
            cached: None,
        })
    }
}

impl Drop for FrameSpool {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::debug!("failed to remove spool {}: {}", self.path.display(), e);
        }
    }
}

/// Iterator over spooled frames. Repeated slots yield the same `Arc`.
pub struct SpoolReplay<'a> {
    spool: &'a FrameSpool,
    file: File,
    position: usize,
    cached: Option<(usize, Arc<FrameBuffer>)>,
}

impl SpoolReplay<'_> {
    fn read_slot(&mut self, index: usize) -> ChatreelResult<Arc<FrameBuffer>> {
        let slot = self.spool.slots[index];
        let mut data = vec![0u8; self.spool.frame_bytes];
        self.file.seek(SeekFrom::Start(slot.offset))?;
        self.file.read_exact(&mut data)?;
        if hash_rgba(self.spool.width, self.spool.height, &data) != slot.hash {
            return Err(ChatreelError::Encode(format!(
                "spooled frame {} is corrupted",
                self.position
            )));
        }
        FrameBuffer::from_raw(self.spool.width, self.spool.height, data)
            .map(Arc::new)
            .ok_or_else(|| ChatreelError::Encode("spooled frame has the wrong size".into()))
    }
}

impl Iterator for SpoolReplay<'_> {
    type Item = ChatreelResult<Arc<FrameBuffer>>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = *self.spool.order.get(self.position)?;
        let frame = match &self.cached {
            Some((cached, frame)) if *cached == index => Ok(Arc::clone(frame)),
            _ => self.read_slot(index),
        };
        self.position += 1;
        if let Ok(frame) = &frame {
            self.cached = Some((index, Arc::clone(frame)));
        }
        Some(frame)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.spool.order.len() - self.position;
        (remaining, Some(remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatreel_core::Color;

    #[test]
    fn test_replay_preserves_order_and_dedups() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = FrameSpool::create(dir.path(), 2, 2).unwrap();
        let red = Arc::new(FrameBuffer::solid(2, 2, &Color::RED));
        let blue = Arc::new(FrameBuffer::solid(2, 2, &Color::BLUE));

        for frame in [&red, &red, &red, &blue, &red] {
            spool.push(frame).unwrap();
        }
        assert_eq!(spool.len(), 5);
        assert_eq!(spool.unique_frames(), 3);

        let frames: Vec<Arc<FrameBuffer>> = spool.replay().unwrap().map(|f| f.unwrap()).collect();
        let colors: Vec<[u8; 4]> = frames.iter().map(|f| f.get_pixel(0, 0).unwrap()).collect();
        assert_eq!(
            colors,
            vec![[255, 0, 0, 255], [255, 0, 0, 255], [255, 0, 0, 255], [0, 0, 255, 255], [255, 0, 0, 255]]
        );
        assert!(Arc::ptr_eq(&frames[0], &frames[2]));
        assert!(!Arc::ptr_eq(&frames[2], &frames[4]));
    }

    #[test]
    fn test_replay_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = FrameSpool::create(dir.path(), 1, 1).unwrap();
        spool.push(&Arc::new(FrameBuffer::solid(1, 1, &Color::WHITE))).unwrap();
        assert_eq!(spool.replay().unwrap().count(), 1);
        assert_eq!(spool.replay().unwrap().count(), 1);
    }

    #[test]
    fn test_rejects_wrong_size() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = FrameSpool::create(dir.path(), 2, 2).unwrap();
        let frame = Arc::new(FrameBuffer::solid(3, 2, &Color::RED));
        assert!(spool.push(&frame).is_err());
        assert!(spool.is_empty());
    }

    #[test]
    fn test_detects_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let mut spool = FrameSpool::create(dir.path(), 1, 1).unwrap();
        spool.push(&Arc::new(FrameBuffer::solid(1, 1, &Color::RED))).unwrap();
        spool.writer.flush().unwrap();
        std::fs::write(spool.path(), [0u8, 0, 0, 0]).unwrap();
        let first = spool.replay().unwrap().next().unwrap();
        assert!(first.is_err());
    }

    #[test]
    fn test_drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let spool = FrameSpool::create(dir.path(), 1, 1).unwrap();
        let path = spool.path().to_path_buf();
        assert!(path.exists());
        drop(spool);
        assert!(!path.exists());
    }
}
