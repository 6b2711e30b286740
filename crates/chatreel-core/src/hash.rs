//! Content hashing for frame integrity checks.
//!
//! Produces a SHA-256 hash of frame buffer data so frames persisted to
//! temporary storage can be verified bit-exact when they are read back.

use sha2::{Digest, Sha256};

use crate::frame::FrameBuffer;

/// A content hash digest (SHA-256, 32 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash {
    bytes: [u8; 32],
}

impl ContentHash {
    /// Lowercase hex digest.
    pub fn to_hex(&self) -> String {
        self.bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Hash raw RGBA bytes together with their dimensions.
pub fn hash_rgba(width: u32, height: u32, data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    // Dimensions are part of the digest so equal bytes at different sizes differ.
    hasher.update(width.to_le_bytes());
    hasher.update(height.to_le_bytes());
    hasher.update(data);
    finish(hasher)
}

/// Compute the content hash of a single frame buffer.
pub fn hash_frame(frame: &FrameBuffer) -> ContentHash {
    hash_rgba(frame.width, frame.height, &frame.data)
}

fn finish(hasher: Sha256) -> ContentHash {
    let result = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&result);
    ContentHash { bytes }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Color;

    #[test]
    fn test_same_frame_same_hash() {
        let a = FrameBuffer::solid(4, 4, &Color::RED);
        let b = FrameBuffer::solid(4, 4, &Color::RED);
        assert_eq!(hash_frame(&a), hash_frame(&b));
        assert_eq!(hash_frame(&a).to_hex().len(), 64);
    }

    #[test]
    fn test_dimensions_are_hashed() {
        let a = FrameBuffer::solid(2, 8, &Color::RED);
        let b = FrameBuffer::solid(8, 2, &Color::RED);
        assert_eq!(a.data, b.data);
        assert_ne!(hash_frame(&a), hash_frame(&b));
    }
}
