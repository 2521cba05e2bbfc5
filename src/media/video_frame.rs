use std::sync::Arc;

use super::media_error::MediaError;

/// Packed RGB24 picture handed to a video [`Encoder`](super::Encoder).
/// Pixels are shared so a frame can be queued without copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Arc<Vec<u8>>,
}

impl VideoFrame {
    /// Wraps `bytes` after checking they hold `width * height` RGB pixels.
    pub fn from_rgb(width: u32, height: u32, bytes: Vec<u8>) -> Result<Self, MediaError> {
        let expected = rgb_len(width, height);
        if width == 0 || height == 0 || bytes.len() != expected {
            return Err(MediaError::Codec(format!(
                "{width}x{height} RGB needs {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            width,
            height,
            bytes: Arc::new(bytes),
        })
    }

    /// Diagonal colour bands that scroll by `tick` pixels per frame, so
    /// consecutive frames differ everywhere.
    pub fn synthetic(width: u32, height: u32, tick: u8) -> Self {
        let mut rgb = Vec::with_capacity(rgb_len(width, height));
        for y in 0..height {
            for x in 0..width {
                let band = (x.wrapping_add(y).wrapping_add(u32::from(tick)) / 8) as u8;
                rgb.extend_from_slice(&[band.wrapping_mul(37), band.wrapping_mul(91), band ^ tick]);
            }
        }
        Self {
            width,
            height,
            bytes: Arc::new(rgb),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

fn rgb_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * 3
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn rgb_length_is_checked() {
        assert!(VideoFrame::from_rgb(2, 2, vec![0; 12]).is_ok());
        assert!(VideoFrame::from_rgb(2, 2, vec![0; 11]).is_err());
        assert!(VideoFrame::from_rgb(0, 2, Vec::new()).is_err());
    }

    #[test]
    fn synthetic_frames_move_between_ticks() {
        let a = VideoFrame::synthetic(32, 16, 0);
        let b = VideoFrame::synthetic(32, 16, 4);
        assert_eq!(a.bytes.len(), a.pixel_count() * 3);
        assert_ne!(a.bytes, b.bytes);
    }
}
