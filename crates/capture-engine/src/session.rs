//! Capture session lifecycle.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use framecap_common::clock::Clock;
use framecap_common::error::{FramecapError, FramecapResult};
use serde::{Deserialize, Serialize};

use crate::camera::{sort_by_depth, CameraSource};
use crate::compositor::{Compositor, DefaultCompositor};
use crate::descriptor::BufferDescriptor;
use crate::frame_loop::{FrameBoundary, FrameLoopAttachment, FrameTask, HostFrameLoop};
use crate::scheduler::{CaptureStats, FrameScheduler, SchedulerShared, SessionState, SharedSink};
use crate::sink::{FrameSink, MediaRecorder, ReadbackSink};

/// Per-session capture settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Host frames skipped between captured frames.
    pub skip: u32,

    /// Multisample level override; defaults to the host's level.
    pub anti_aliasing: Option<u32>,

    /// Deprecated. Capture targets are always HDR-capable; this flag is
    /// accepted for compatibility and ignored.
    pub hdr: bool,
}

/// Builder collecting everything a [`CaptureSession`] needs.
pub struct SessionBuilder {
    cameras: Vec<Arc<dyn CameraSource>>,
    clock: Option<Arc<dyn Clock>>,
    compositor: Option<Box<dyn Compositor>>,
    config: SessionConfig,
}

impl SessionBuilder {
    fn new() -> Self {
        Self {
            cameras: Vec::new(),
            clock: None,
            compositor: None,
            config: SessionConfig::default(),
        }
    }

    /// Add a camera to record from.
    pub fn camera(mut self, camera: Arc<dyn CameraSource>) -> Self {
        self.cameras.push(camera);
        self
    }

    /// Add several cameras to record from.
    pub fn cameras(mut self, cameras: impl IntoIterator<Item = Arc<dyn CameraSource>>) -> Self {
        self.cameras.extend(cameras);
        self
    }

    /// Clock used to timestamp frames. Without one every frame is stamped 0.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Replace the default render-and-restore compositor.
    pub fn compositor(mut self, compositor: impl Compositor + 'static) -> Self {
        self.compositor = Some(Box::new(compositor));
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn skip(mut self, skip: u32) -> Self {
        self.config.skip = skip;
        self
    }

    /// Start capturing into a recorder, reading frames back to RGBA8.
    pub fn start_with_recorder(
        self,
        recorder: impl MediaRecorder + 'static,
        host: Arc<dyn HostFrameLoop>,
    ) -> FramecapResult<CaptureSession> {
        self.start(ReadbackSink::new(recorder), host)
    }

    /// Start capturing into `sink`, driven by `host`.
    ///
    /// Fails without touching the host if no camera was added or the sink
    /// cannot report a usable frame size.
    pub fn start(
        self,
        sink: impl FrameSink + 'static,
        host: Arc<dyn HostFrameLoop>,
    ) -> FramecapResult<CaptureSession> {
        let Self {
            mut cameras,
            clock,
            compositor,
            config,
        } = self;

        if cameras.is_empty() {
            return Err(FramecapError::NoCameras);
        }
        let (width, height) = sink.frame_size().ok_or_else(|| {
            FramecapError::frame_size_unavailable("sink did not report a frame size")
        })?;
        let msaa_level = config.anti_aliasing.unwrap_or_else(|| host.msaa_level());
        let descriptor = BufferDescriptor::for_frame_size(width, height, msaa_level)?;

        if config.hdr {
            tracing::warn!("SessionConfig::hdr is deprecated and has no effect");
        }

        sort_by_depth(&mut cameras);
        let cameras: Arc<[Arc<dyn CameraSource>]> = cameras.into();
        let sink: Box<dyn FrameSink> = Box::new(sink);
        let sink: SharedSink = Arc::new(Mutex::new(sink));
        let shared = Arc::new(SchedulerShared::new(config.skip));

        let mut scheduler = FrameScheduler::new(
            cameras.clone(),
            descriptor,
            compositor.unwrap_or_else(|| Box::new(DefaultCompositor)),
            sink.clone(),
            clock,
            shared.clone(),
        );
        let task: FrameTask =
            Box::new(move |boundary: &FrameBoundary| scheduler.on_frame_boundary(boundary));
        let attachment = FrameLoopAttachment::attach(host, task)?;

        tracing::info!(
            width,
            height,
            msaa = descriptor.msaa_samples,
            hdr_target = descriptor.format.is_hdr(),
            cameras = cameras.len(),
            skip = config.skip,
            "Capture session started"
        );

        Ok(CaptureSession {
            cameras,
            descriptor,
            sink,
            shared,
            attachment,
            hdr: config.hdr,
        })
    }
}

/// Records frames from one or more cameras until disposed.
///
/// Cameras are sorted by ascending depth when the session starts; cameras
/// with equal depth keep the order they were added in. Dropping the session
/// disposes it.
pub struct CaptureSession {
    cameras: Arc<[Arc<dyn CameraSource>]>,
    descriptor: BufferDescriptor,
    sink: SharedSink,
    shared: Arc<SchedulerShared>,
    attachment: FrameLoopAttachment,
    hdr: bool,
}

impl CaptureSession {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Cameras in render order.
    pub fn cameras(&self) -> &[Arc<dyn CameraSource>] {
        &self.cameras
    }

    /// Descriptor every captured frame buffer is created from.
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    /// Host frames skipped between captured frames.
    pub fn skip(&self) -> u32 {
        self.shared.skip()
    }

    /// Change the decimation policy. Takes effect from the next boundary.
    pub fn set_skip(&self, skip: u32) {
        self.shared.set_skip(skip);
    }

    /// Frame boundaries handled so far.
    pub fn frame_count(&self) -> u64 {
        self.shared.frame_count()
    }

    pub fn stats(&self) -> CaptureStats {
        self.shared.stats()
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    #[deprecated(note = "capture targets are always HDR-capable; this flag has no effect")]
    pub fn hdr(&self) -> bool {
        self.hdr
    }

    #[deprecated(note = "capture targets are always HDR-capable; this flag has no effect")]
    pub fn set_hdr(&mut self, hdr: bool) {
        self.hdr = hdr;
    }

    /// Stop capturing and dispose the sink.
    ///
    /// The frame-loop task is unregistered before the sink is disposed, so
    /// no frame is committed afterwards. Calling this again does nothing.
    /// Must not be called from inside the sink's `commit_frame`.
    pub fn dispose(&mut self) -> FramecapResult<()> {
        if !self.shared.mark_disposed() {
            return Ok(());
        }
        self.attachment.detach();

        let result = self
            .sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .dispose();

        let stats = self.shared.stats();
        tracing::info!(
            boundaries = stats.boundaries,
            committed = stats.frames_committed,
            skipped = stats.frames_skipped,
            commit_failures = stats.commit_failures,
            failed = stats.frames_failed,
            "Capture session disposed"
        );
        result
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        if let Err(e) = self.dispose() {
            tracing::warn!(error = %e, "Frame sink failed to dispose");
        }
    }
}

impl fmt::Debug for CaptureSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSession")
            .field(
                "cameras",
                &self.cameras.iter().map(|c| c.name()).collect::<Vec<_>>(),
            )
            .field("descriptor", &self.descriptor)
            .field("skip", &self.skip())
            .field("state", &self.state())
            .field("attachment", &self.attachment)
            .finish()
    }
}
