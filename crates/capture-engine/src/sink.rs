//! Frame consumers.
//!
//! A [`FrameSink`] receives every committed frame as a finished render
//! target. Most consumers are encoders that want plain 8-bit pixels, so
//! [`ReadbackSink`] adapts a [`MediaRecorder`] by reading the HDR target
//! back into an RGBA8 staging buffer first.

use framecap_common::error::{FramecapError, FramecapResult};

use crate::buffer::{FrameBuffer, Rgba};

/// Downstream consumer of committed frames.
pub trait FrameSink: Send {
    /// Frame size the sink expects, `None` if it cannot tell.
    fn frame_size(&self) -> Option<(u32, u32)>;

    /// Accept one frame. The buffer is only borrowed for the call.
    fn commit_frame(&mut self, buffer: &FrameBuffer, timestamp: i64) -> FramecapResult<()>;

    /// Release the sink's resources. Called at most once by a session.
    fn dispose(&mut self) -> FramecapResult<()>;
}

/// Recorder consuming RGBA8 pixel buffers, such as a video encoder.
pub trait MediaRecorder: Send {
    /// Frame size the recorder was configured with.
    fn frame_size(&self) -> Option<(u32, u32)>;

    /// Append a frame of tightly packed RGBA8 pixels, top row first.
    fn commit_frame(&mut self, pixels: &[u8], timestamp: i64) -> FramecapResult<()>;

    /// Stop accepting frames and finalize output.
    fn finish(&mut self) -> FramecapResult<()>;
}

impl<R: MediaRecorder + ?Sized> MediaRecorder for Box<R> {
    fn frame_size(&self) -> Option<(u32, u32)> {
        (**self).frame_size()
    }

    fn commit_frame(&mut self, pixels: &[u8], timestamp: i64) -> FramecapResult<()> {
        (**self).commit_frame(pixels, timestamp)
    }

    fn finish(&mut self) -> FramecapResult<()> {
        (**self).finish()
    }
}

/// Sink that reads frames back to RGBA8 and forwards them to a recorder.
pub struct ReadbackSink<R> {
    recorder: R,
    staging: Vec<u8>,
    flip_vertical: bool,
    finished: bool,
}

impl<R: MediaRecorder> ReadbackSink<R> {
    pub fn new(recorder: R) -> Self {
        Self {
            recorder,
            staging: Vec::new(),
            flip_vertical: false,
            finished: false,
        }
    }

    /// Emit rows bottom-up, for recorders expecting a bottom-left origin.
    pub fn flip_vertical(mut self, flip: bool) -> Self {
        self.flip_vertical = flip;
        self
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    fn read_back(&mut self, buffer: &FrameBuffer) {
        let width = buffer.width() as usize;
        let height = buffer.height() as usize;
        let srgb = buffer.descriptor().srgb;

        self.staging.clear();
        self.staging.reserve(width * height * 4);
        for row in 0..height {
            let src_row = if self.flip_vertical {
                height - 1 - row
            } else {
                row
            };
            let texels = &buffer.texels()[src_row * width..(src_row + 1) * width];
            for texel in texels {
                self.staging.extend_from_slice(&encode_texel(*texel, srgb));
            }
        }
    }
}

impl<R: MediaRecorder> FrameSink for ReadbackSink<R> {
    fn frame_size(&self) -> Option<(u32, u32)> {
        self.recorder.frame_size()
    }

    fn commit_frame(&mut self, buffer: &FrameBuffer, timestamp: i64) -> FramecapResult<()> {
        if self.finished {
            return Err(FramecapError::Disposed);
        }
        self.read_back(buffer);
        self.recorder.commit_frame(&self.staging, timestamp)
    }

    fn dispose(&mut self) -> FramecapResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.staging = Vec::new();
        self.recorder.finish()
    }
}

/// Quantize a linear texel to RGBA8, sRGB-encoding color when requested.
pub fn encode_texel(texel: Rgba, srgb: bool) -> [u8; 4] {
    let color = |c: f32| {
        let c = c.clamp(0.0, 1.0);
        if srgb {
            linear_to_srgb(c)
        } else {
            c
        }
    };
    [
        quantize(color(texel[0])),
        quantize(color(texel[1])),
        quantize(color(texel[2])),
        quantize(texel[3].clamp(0.0, 1.0)),
    ]
}

fn linear_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

fn quantize(c: f32) -> u8 {
    (c * 255.0).round() as u8
}
