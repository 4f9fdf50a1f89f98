//! Transient frame buffers and the pool they are borrowed from.
//!
//! Every captured frame borrows one [`FrameBuffer`] from a [`BufferPool`],
//! composites the cameras into it, hands it to the sink and gives it back.
//! Buffers never live across frames; the pool only keeps a small number of
//! idle allocations around so steady-state capture does not reallocate.

use std::sync::atomic::{AtomicU64, Ordering};

use framecap_common::error::{FramecapError, FramecapResult};

use crate::descriptor::BufferDescriptor;

/// Linear RGBA color.
pub type Rgba = [f32; 4];

/// Fully transparent black.
pub const TRANSPARENT: Rgba = [0.0, 0.0, 0.0, 0.0];

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Offscreen render target holding the resolved image of one frame.
#[derive(Debug)]
pub struct FrameBuffer {
    id: u64,
    descriptor: BufferDescriptor,
    texels: Vec<Rgba>,
}

impl FrameBuffer {
    /// Allocate a cleared buffer, reporting allocation failure instead of
    /// aborting the process.
    pub fn allocate(descriptor: &BufferDescriptor) -> FramecapResult<Self> {
        // Reject descriptors whose encoded size overflows.
        descriptor.byte_len()?;
        let count = descriptor.pixel_count();
        let mut texels = Vec::new();
        texels
            .try_reserve_exact(count)
            .map_err(|_| FramecapError::Allocation {
                bytes: count.saturating_mul(std::mem::size_of::<Rgba>()),
            })?;
        texels.resize(count, TRANSPARENT);

        Ok(Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            descriptor: *descriptor,
            texels,
        })
    }

    /// Unique identifier of this allocation.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub fn width(&self) -> u32 {
        self.descriptor.width
    }

    pub fn height(&self) -> u32 {
        self.descriptor.height
    }

    /// Resolved texels, row-major from the top-left corner.
    pub fn texels(&self) -> &[Rgba] {
        &self.texels
    }

    /// Overwrite every texel with `color`.
    pub fn clear(&mut self, color: Rgba) {
        self.texels.fill(color);
    }

    /// Texel at `(x, y)`, or `None` outside the buffer.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.index(x, y).map(|i| self.texels[i])
    }

    /// Alpha-blend `color` over the texel at `(x, y)`. Out-of-range
    /// coordinates are ignored.
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Rgba) {
        if let Some(i) = self.index(x, y) {
            self.texels[i] = blend_over(self.texels[i], color);
        }
    }

    /// Blend `color` over the rectangle starting at `(x, y)`, clipped to the
    /// buffer.
    pub fn fill_rect(&mut self, x: u32, y: u32, width: u32, height: u32, color: Rgba) {
        let x_end = x.saturating_add(width).min(self.width());
        let y_end = y.saturating_add(height).min(self.height());
        for py in y.min(y_end)..y_end {
            for px in x.min(x_end)..x_end {
                self.blend_pixel(px, py, color);
            }
        }
    }

    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x >= self.width() || y >= self.height() {
            return None;
        }
        Some(y as usize * self.width() as usize + x as usize)
    }
}

/// Source-over blend of straight-alpha colors.
pub fn blend_over(dst: Rgba, src: Rgba) -> Rgba {
    let a = src[3].clamp(0.0, 1.0);
    let inv = 1.0 - a;
    [
        src[0] * a + dst[0] * inv,
        src[1] * a + dst[1] * inv,
        src[2] * a + dst[2] * inv,
        a + dst[3] * inv,
    ]
}

/// Allocation counters for a [`BufferPool`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Fresh allocations.
    pub allocations: u64,
    /// Acquisitions served from an idle buffer.
    pub reuses: u64,
    /// Buffers currently handed out and not yet released.
    pub in_flight: u64,
}

/// Pool of temporary frame buffers.
#[derive(Debug)]
pub struct BufferPool {
    idle: Vec<FrameBuffer>,
    max_idle: usize,
    stats: PoolStats,
}

impl BufferPool {
    /// Default number of idle buffers kept for reuse.
    pub const DEFAULT_MAX_IDLE: usize = 2;

    pub fn new() -> Self {
        Self::with_max_idle(Self::DEFAULT_MAX_IDLE)
    }

    pub fn with_max_idle(max_idle: usize) -> Self {
        Self {
            idle: Vec::new(),
            max_idle,
            stats: PoolStats::default(),
        }
    }

    /// Borrow a cleared buffer matching `descriptor`.
    pub fn acquire(&mut self, descriptor: &BufferDescriptor) -> FramecapResult<FrameBuffer> {
        let buffer = match self.idle.iter().position(|b| b.descriptor() == descriptor) {
            Some(pos) => {
                let mut buffer = self.idle.swap_remove(pos);
                buffer.clear(TRANSPARENT);
                self.stats.reuses += 1;
                buffer
            }
            None => {
                let buffer = FrameBuffer::allocate(descriptor)?;
                self.stats.allocations += 1;
                tracing::debug!(
                    id = buffer.id(),
                    width = descriptor.width,
                    height = descriptor.height,
                    "Allocated frame buffer"
                );
                buffer
            }
        };
        self.stats.in_flight += 1;
        Ok(buffer)
    }

    /// Return a buffer obtained from [`acquire`](Self::acquire).
    pub fn release(&mut self, buffer: FrameBuffer) {
        self.stats.in_flight = self.stats.in_flight.saturating_sub(1);
        if self.idle.len() < self.max_idle {
            self.idle.push(buffer);
        }
    }

    /// Record that a borrowed buffer will never come back.
    pub fn forget(&mut self) {
        self.stats.in_flight = self.stats.in_flight.saturating_sub(1);
    }

    /// Drop every idle buffer.
    pub fn clear(&mut self) {
        self.idle.clear();
    }

    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(width: u32, height: u32) -> BufferDescriptor {
        BufferDescriptor::for_frame_size(width, height, 1).unwrap()
    }

    #[test]
    fn test_allocate_matches_descriptor() {
        let buffer = FrameBuffer::allocate(&desc(8, 4)).unwrap();
        assert_eq!(buffer.width(), 8);
        assert_eq!(buffer.height(), 4);
        assert_eq!(buffer.texels().len(), 32);
        assert!(buffer.texels().iter().all(|t| *t == TRANSPARENT));
    }

    #[test]
    fn test_blend_accumulates() {
        let mut buffer = FrameBuffer::allocate(&desc(2, 2)).unwrap();
        buffer.clear([1.0, 0.0, 0.0, 1.0]);
        buffer.blend_pixel(0, 0, [0.0, 0.0, 1.0, 0.5]);
        let px = buffer.pixel(0, 0).unwrap();
        assert!((px[0] - 0.5).abs() < 1e-6);
        assert!((px[2] - 0.5).abs() < 1e-6);
        assert!((px[3] - 1.0).abs() < 1e-6);
        assert_eq!(buffer.pixel(1, 1), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(buffer.pixel(2, 0), None);
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut buffer = FrameBuffer::allocate(&desc(4, 4)).unwrap();
        buffer.fill_rect(2, 2, 10, 10, [1.0, 1.0, 1.0, 1.0]);
        let lit = buffer.texels().iter().filter(|t| t[3] > 0.0).count();
        assert_eq!(lit, 4);
    }

    #[test]
    fn test_pool_reuses_released_buffers() {
        let mut pool = BufferPool::new();
        let d = desc(16, 16);

        let mut first = pool.acquire(&d).unwrap();
        first.clear([1.0, 1.0, 1.0, 1.0]);
        let first_id = first.id();
        assert_eq!(pool.stats().in_flight, 1);
        pool.release(first);

        let second = pool.acquire(&d).unwrap();
        assert_eq!(second.id(), first_id);
        assert!(second.texels().iter().all(|t| *t == TRANSPARENT));
        pool.release(second);

        let stats = pool.stats();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.reuses, 1);
        assert_eq!(stats.in_flight, 0);
    }

    #[test]
    fn test_pool_caps_idle_buffers() {
        let mut pool = BufferPool::with_max_idle(1);
        let d = desc(4, 4);
        let a = pool.acquire(&d).unwrap();
        let b = pool.acquire(&d).unwrap();
        pool.release(a);
        pool.release(b);
        assert_eq!(pool.idle_count(), 1);
    }

    #[test]
    fn test_pool_does_not_mix_descriptors() {
        let mut pool = BufferPool::new();
        let small = pool.acquire(&desc(4, 4)).unwrap();
        pool.release(small);
        let large = pool.acquire(&desc(8, 8)).unwrap();
        assert_eq!(large.width(), 8);
        assert_eq!(pool.stats().allocations, 2);
    }
}
