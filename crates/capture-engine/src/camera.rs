//! Camera collaborator interface.
//!
//! Cameras belong to the host engine; a capture session only borrows
//! them. A camera renders into whatever target is currently assigned to it,
//! so capturing is a matter of pointing it at the frame buffer for the
//! duration of one render.

use std::cmp::Ordering;
use std::sync::{Arc, Mutex};

use framecap_common::error::FramecapResult;

use crate::buffer::FrameBuffer;

/// Shared handle to a render target a camera can draw into.
pub type RenderTarget = Arc<Mutex<FrameBuffer>>;

/// A render source owned by the host engine.
///
/// Implementations use interior mutability for their target assignment;
/// the capture pipeline only ever holds shared references to cameras.
pub trait CameraSource: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Ordering key; lower depths render first.
    fn depth(&self) -> f32;

    /// Currently assigned render target, `None` for the host's default.
    fn target(&self) -> Option<RenderTarget>;

    /// Assign the render target used by subsequent renders.
    fn set_target(&self, target: Option<RenderTarget>);

    /// Render synchronously into the current target.
    fn render(&self) -> FramecapResult<()>;
}

/// Sort cameras ascending by depth.
///
/// The sort is stable: cameras with equal depth keep their input order.
/// NaN depths sort after every finite depth.
pub fn sort_by_depth(cameras: &mut [Arc<dyn CameraSource>]) {
    cameras.sort_by(|a, b| compare_depth(a.depth(), b.depth()));
}

fn compare_depth(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.total_cmp(&b),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}
