//! Camera compositor: renders one camera into a shared frame buffer.
//!
//! The scheduler calls the compositor once per camera per captured frame,
//! in ascending depth order, so later cameras draw over earlier ones. The
//! compositor is injected into the session, which makes it the hook for
//! custom rendering such as post-processing passes.

use framecap_common::error::FramecapResult;

use crate::camera::{CameraSource, RenderTarget};

/// Strategy that renders a camera into a capture target.
pub trait Compositor: Send {
    fn composite(&mut self, camera: &dyn CameraSource, target: &RenderTarget)
        -> FramecapResult<()>;
}

impl<F> Compositor for F
where
    F: FnMut(&dyn CameraSource, &RenderTarget) -> FramecapResult<()> + Send,
{
    fn composite(
        &mut self,
        camera: &dyn CameraSource,
        target: &RenderTarget,
    ) -> FramecapResult<()> {
        self(camera, target)
    }
}

/// Temporarily points a camera at another target.
///
/// The camera's previous target is restored when the guard drops, including
/// when rendering fails part way.
pub struct TargetSwap<'a> {
    camera: &'a dyn CameraSource,
    previous: Option<RenderTarget>,
}

impl<'a> TargetSwap<'a> {
    pub fn new(camera: &'a dyn CameraSource, target: &RenderTarget) -> Self {
        let previous = camera.target();
        camera.set_target(Some(target.clone()));
        Self { camera, previous }
    }
}

impl Drop for TargetSwap<'_> {
    fn drop(&mut self) {
        self.camera.set_target(self.previous.take());
    }
}

/// Renders the camera into the target and restores its original target.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCompositor;

impl Compositor for DefaultCompositor {
    fn composite(
        &mut self,
        camera: &dyn CameraSource,
        target: &RenderTarget,
    ) -> FramecapResult<()> {
        let _swap = TargetSwap::new(camera, target);
        camera.render()
    }
}
