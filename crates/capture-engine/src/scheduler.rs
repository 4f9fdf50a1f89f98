//! Frame capture scheduler.
//!
//! Runs once per host frame boundary. Every `skip + 1` boundaries it
//! borrows a frame buffer, composites all cameras into it in depth order,
//! commits it to the sink with a timestamp and returns the buffer to the
//! pool.
//!
//! Failure policy:
//! - buffer allocation and camera render failures abort the current frame
//!   and are returned to the host; the scheduler keeps running.
//! - sink commit failures are logged and counted, and capture continues
//!   with the next eligible frame.

use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use framecap_common::clock::Clock;
use framecap_common::error::{FramecapError, FramecapResult};

use crate::buffer::{BufferPool, FrameBuffer};
use crate::camera::{CameraSource, RenderTarget};
use crate::compositor::Compositor;
use crate::descriptor::BufferDescriptor;
use crate::frame_loop::{FrameBoundary, TaskControl};
use crate::sink::FrameSink;

/// Sink shared between the scheduler task and the owning session.
pub type SharedSink = Arc<Mutex<Box<dyn FrameSink>>>;

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Capturing on every eligible frame boundary.
    Running = 0,
    /// Torn down; no further frames are captured.
    Disposed = 1,
}

/// Point-in-time capture counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frame boundaries handled while running.
    pub boundaries: u64,
    /// Frames accepted by the sink.
    pub frames_committed: u64,
    /// Boundaries skipped by the decimation policy.
    pub frames_skipped: u64,
    /// Frames the sink rejected.
    pub commit_failures: u64,
    /// Frames abandoned before commit (allocation or render failures).
    pub frames_failed: u64,
    /// Message of the most recent failure.
    pub last_error: Option<String>,
}

/// State shared between a running scheduler and its session.
///
/// `skip` can be changed from outside the frame loop at any time; the
/// scheduler reads it once per boundary.
#[derive(Debug, Default)]
pub struct SchedulerShared {
    skip: AtomicU32,
    state: AtomicU8,
    frame_count: AtomicU64,
    committed: AtomicU64,
    skipped: AtomicU64,
    commit_failures: AtomicU64,
    failed: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SchedulerShared {
    pub fn new(skip: u32) -> Self {
        Self {
            skip: AtomicU32::new(skip),
            ..Self::default()
        }
    }

    pub fn skip(&self) -> u32 {
        self.skip.load(Ordering::Relaxed)
    }

    pub fn set_skip(&self, skip: u32) {
        self.skip.store(skip, Ordering::Relaxed);
    }

    /// Boundaries seen so far.
    pub fn frame_count(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> SessionState {
        match self.state.load(Ordering::Acquire) {
            0 => SessionState::Running,
            _ => SessionState::Disposed,
        }
    }

    /// Move to `Disposed`. Returns `false` if already disposed.
    pub fn mark_disposed(&self) -> bool {
        self.state
            .swap(SessionState::Disposed as u8, Ordering::AcqRel)
            != SessionState::Disposed as u8
    }

    pub fn is_disposed(&self) -> bool {
        self.state() == SessionState::Disposed
    }

    pub fn stats(&self) -> CaptureStats {
        CaptureStats {
            boundaries: self.frame_count(),
            frames_committed: self.committed.load(Ordering::Relaxed),
            frames_skipped: self.skipped.load(Ordering::Relaxed),
            commit_failures: self.commit_failures.load(Ordering::Relaxed),
            frames_failed: self.failed.load(Ordering::Relaxed),
            last_error: self
                .last_error
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn record_error(&self, error: &FramecapError) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(error.to_string());
    }
}

/// Per-boundary capture driver.
pub struct FrameScheduler {
    cameras: Arc<[Arc<dyn CameraSource>]>,
    descriptor: BufferDescriptor,
    pool: BufferPool,
    compositor: Box<dyn Compositor>,
    sink: SharedSink,
    clock: Option<Arc<dyn Clock>>,
    shared: Arc<SchedulerShared>,
}

impl FrameScheduler {
    /// Create a scheduler. `cameras` must already be in render order.
    pub fn new(
        cameras: Arc<[Arc<dyn CameraSource>]>,
        descriptor: BufferDescriptor,
        compositor: Box<dyn Compositor>,
        sink: SharedSink,
        clock: Option<Arc<dyn Clock>>,
        shared: Arc<SchedulerShared>,
    ) -> Self {
        Self {
            cameras,
            descriptor,
            pool: BufferPool::new(),
            compositor,
            sink,
            clock,
            shared,
        }
    }

    /// Handle one end-of-frame boundary.
    pub fn on_frame_boundary(&mut self, boundary: &FrameBoundary) -> FramecapResult<TaskControl> {
        if self.shared.is_disposed() {
            self.pool.clear();
            return Ok(TaskControl::Finish);
        }

        let index = self.shared.frame_count.fetch_add(1, Ordering::Relaxed);
        let skip = u64::from(self.shared.skip());
        if index % (skip + 1) != 0 {
            self.shared.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(index, skip, "Skipping frame");
            return Ok(TaskControl::Continue);
        }

        if let Err(e) = self.capture(index, boundary) {
            self.shared.failed.fetch_add(1, Ordering::Relaxed);
            self.shared.record_error(&e);
            return Err(e);
        }
        Ok(TaskControl::Continue)
    }

    fn capture(&mut self, index: u64, boundary: &FrameBoundary) -> FramecapResult<()> {
        let buffer = self.pool.acquire(&self.descriptor)?;
        let target: RenderTarget = Arc::new(Mutex::new(buffer));

        let rendered = self.render_cameras(&target);
        let buffer = match (rendered, self.reclaim(target)) {
            (Ok(()), Ok(buffer)) => buffer,
            (Err(e), Ok(buffer)) => {
                self.pool.release(buffer);
                return Err(e);
            }
            (Err(e), Err(_)) | (Ok(()), Err(e)) => return Err(e),
        };

        let timestamp = self.clock.as_ref().map_or(0, |clock| clock.timestamp());
        let committed = self.commit(&buffer, timestamp);
        self.pool.release(buffer);

        match committed {
            Ok(true) => {
                self.shared.committed.fetch_add(1, Ordering::Relaxed);
                tracing::trace!(index, host_frame = boundary.frame, timestamp, "Committed frame");
            }
            Ok(false) => {
                tracing::debug!(index, "Session disposed before commit; frame dropped");
            }
            Err(e) => {
                self.shared.commit_failures.fetch_add(1, Ordering::Relaxed);
                self.shared.record_error(&e);
                tracing::warn!(index, timestamp, error = %e, "Frame sink rejected frame");
            }
        }
        Ok(())
    }

    fn render_cameras(&mut self, target: &RenderTarget) -> FramecapResult<()> {
        for camera in self.cameras.iter() {
            self.compositor.composite(camera.as_ref(), target)?;
            if Arc::strong_count(target) != 1 {
                return Err(FramecapError::render(
                    camera.name(),
                    "camera kept a reference to the capture target",
                ));
            }
        }
        Ok(())
    }

    /// Take the buffer back from the shared target once every camera let go.
    fn reclaim(&mut self, target: RenderTarget) -> FramecapResult<FrameBuffer> {
        match Arc::try_unwrap(target) {
            Ok(mutex) => Ok(mutex.into_inner().unwrap_or_else(PoisonError::into_inner)),
            Err(_) => {
                // The buffer now belongs to whoever kept it.
                self.pool.forget();
                Err(FramecapError::frame_loop(
                    "capture target still referenced after compositing",
                ))
            }
        }
    }

    /// Commit to the sink unless the session was disposed meanwhile.
    fn commit(&self, buffer: &FrameBuffer, timestamp: i64) -> FramecapResult<bool> {
        let mut sink = self
            .sink
            .lock()
            .map_err(|_| FramecapError::commit("frame sink lock poisoned"))?;
        if self.shared.is_disposed() {
            return Ok(false);
        }
        sink.commit_frame(buffer, timestamp)?;
        Ok(true)
    }
}
