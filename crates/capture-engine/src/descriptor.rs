//! Offscreen buffer descriptor shared by every captured frame.

use framecap_common::error::{FramecapError, FramecapResult};
use serde::{Deserialize, Serialize};

/// Depth buffer precision used for capture targets.
pub const CAPTURE_DEPTH_BITS: u32 = 24;

/// Texel layout of a capture target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    /// 8 bits per channel, normalized.
    Rgba8Unorm,
    /// 16-bit float per channel, high dynamic range.
    Rgba16Float,
}

impl PixelFormat {
    /// Storage size of one texel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8Unorm => 4,
            Self::Rgba16Float => 8,
        }
    }

    /// Whether the format can hold values above 1.0.
    pub fn is_hdr(self) -> bool {
        matches!(self, Self::Rgba16Float)
    }
}

/// Fixed description of the render target used for every captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferDescriptor {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Depth buffer bits.
    pub depth_bits: u32,
    /// Multisample count, always at least 1.
    pub msaa_samples: u32,
    /// Whether the target stores sRGB-encoded color.
    pub srgb: bool,
}

impl BufferDescriptor {
    /// Descriptor for a capture session producing `width` x `height` frames.
    ///
    /// Uses an HDR-capable format so overlapping cameras can accumulate
    /// without clipping, and the host's multisample level (minimum 1).
    pub fn for_frame_size(width: u32, height: u32, msaa_level: u32) -> FramecapResult<Self> {
        if width == 0 || height == 0 {
            return Err(FramecapError::frame_size_unavailable(format!(
                "reported frame size {width}x{height} has a zero dimension"
            )));
        }
        let descriptor = Self {
            width,
            height,
            format: PixelFormat::Rgba16Float,
            depth_bits: CAPTURE_DEPTH_BITS,
            msaa_samples: msaa_level.max(1),
            srgb: true,
        };
        // Reject sizes that cannot be addressed at all.
        descriptor.byte_len()?;
        Ok(descriptor)
    }

    /// Number of texels in the resolved image.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Size in bytes of the resolved color image.
    pub fn byte_len(&self) -> FramecapResult<usize> {
        self.pixel_count()
            .checked_mul(self.format.bytes_per_pixel())
            .ok_or(FramecapError::Allocation { bytes: usize::MAX })
    }

    /// Frame size as `(width, height)`.
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}
