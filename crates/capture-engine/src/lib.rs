//! Framecap Capture Engine
//!
//! Captures frames from one or more host-engine cameras and forwards them,
//! with timestamps, to a frame sink. The engine hooks into the host's
//! render loop instead of running its own thread: after every fully
//! rendered frame the host resumes the scheduler task, which decides
//! whether to capture, composites the cameras into a transient buffer in
//! depth order, and commits the result.
//!
//! # Architecture
//!
//! ```text
//! host frame loop ──end of frame──▶ FrameScheduler
//!                                      │ skip?
//!                                      ▼
//!                               BufferPool::acquire
//!                                      │
//!                   ┌──────────────────┼──────────────────┐
//!                   ▼                  ▼                  ▼
//!             Compositor(cam0)   Compositor(cam1)   Compositor(camN)
//!                   └──────────────────┼──────────────────┘
//!                                      ▼
//!                       FrameSink::commit_frame(buffer, ts)
//!                                      │
//!                                      ▼
//!                               BufferPool::release
//! ```

pub mod buffer;
pub mod camera;
pub mod compositor;
pub mod descriptor;
pub mod frame_loop;
pub mod scheduler;
pub mod session;
pub mod sink;

pub use buffer::{BufferPool, FrameBuffer, Rgba};
pub use camera::{sort_by_depth, CameraSource, RenderTarget};
pub use compositor::{Compositor, DefaultCompositor, TargetSwap};
pub use descriptor::{BufferDescriptor, PixelFormat};
pub use frame_loop::{
    FrameBoundary, FrameLoopAttachment, FrameTask, HostFrameLoop, ManualFrameLoop, TaskControl,
    TaskId,
};
pub use scheduler::{CaptureStats, SessionState};
pub use session::*;
pub use sink::{FrameSink, MediaRecorder, ReadbackSink};
