//! Silhouette frames as fed to an embedding model.
//!
//! Decoding and resizing happen upstream; this module only holds frames that
//! are already at model resolution and packs them into the model's input
//! tensor layout `[N=1, C=1, S, H, W]`.

use crate::error::GaitError;

/// Frame height expected by GaitSet-style models.
pub const FRAME_HEIGHT: usize = 64;

/// Frame width expected by GaitSet-style models.
pub const FRAME_WIDTH: usize = 44;

/// A single-channel silhouette, row-major, values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    height: usize,
    width: usize,
    pixels: Vec<f32>,
}

impl Frame {
    /// Wraps normalized pixels. Every value must be finite and in `[0, 1]`.
    pub fn new(height: usize, width: usize, pixels: Vec<f32>) -> Result<Self, GaitError> {
        if height == 0 || width == 0 {
            return Err(GaitError::InvalidFrames(format!(
                "empty frame {height}x{width}"
            )));
        }
        if pixels.len() != height * width {
            return Err(GaitError::InvalidFrames(format!(
                "frame {height}x{width} needs {} pixels, got {}",
                height * width,
                pixels.len()
            )));
        }
        if let Some(i) = pixels.iter().position(|p| !(0.0..=1.0).contains(p)) {
            return Err(GaitError::InvalidFrames(format!(
                "pixel {i} out of range: {}",
                pixels[i]
            )));
        }
        Ok(Self {
            height,
            width,
            pixels,
        })
    }

    /// Normalizes 8-bit grayscale pixels to `[0, 1]` by dividing by 255.
    pub fn from_gray8(height: usize, width: usize, gray: &[u8]) -> Result<Self, GaitError> {
        let pixels = gray.iter().map(|&p| p as f32 / 255.0).collect();
        Self::new(height, width, pixels)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }
}

/// An ordered walking sequence of frames with uniform geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSequence {
    frames: Vec<Frame>,
}

impl FrameSequence {
    /// Requires at least one frame; all frames must share one size.
    pub fn new(frames: Vec<Frame>) -> Result<Self, GaitError> {
        let Some(first) = frames.first() else {
            return Err(GaitError::InvalidFrames("no frames".into()));
        };
        let (h, w) = (first.height, first.width);
        if let Some((i, f)) = frames
            .iter()
            .enumerate()
            .find(|(_, f)| f.height != h || f.width != w)
        {
            return Err(GaitError::InvalidFrames(format!(
                "frame {i} is {}x{}, expected {h}x{w}",
                f.height, f.width
            )));
        }
        Ok(Self { frames })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// `(height, width)` shared by every frame.
    pub fn geometry(&self) -> (usize, usize) {
        (self.frames[0].height, self.frames[0].width)
    }

    /// Shape of the packed input tensor: `[1, 1, S, H, W]`.
    pub fn tensor_shape(&self) -> [usize; 5] {
        let (h, w) = self.geometry();
        [1, 1, self.frames.len(), h, w]
    }

    /// Packs all frames into one contiguous buffer in `tensor_shape` order.
    pub fn to_tensor(&self) -> Vec<f32> {
        let (h, w) = self.geometry();
        let mut out = Vec::with_capacity(self.frames.len() * h * w);
        for f in &self.frames {
            out.extend_from_slice(&f.pixels);
        }
        out
    }
}
