//! Synthetic cameras used to exercise the capture pipeline without a
//! real rendering engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use framecap_capture_engine::{CameraSource, FrameBuffer, RenderTarget, Rgba};
use framecap_common::error::FramecapResult;

/// What a synthetic camera draws on each render.
enum Shot {
    /// Fill the whole target.
    Backdrop(Rgba),
    /// A square bouncing horizontally across the target.
    Bouncer { size: u32, speed: u32, color: Rgba },
    /// A progress bar along the top edge that loops every `period` renders.
    ProgressBar { period: u64, color: Rgba },
}

/// Camera that paints procedurally into whatever target it is given.
pub struct SyntheticCamera {
    name: String,
    depth: f32,
    shot: Shot,
    target: Mutex<Option<RenderTarget>>,
    renders: AtomicU64,
}

impl SyntheticCamera {
    fn new(name: &str, depth: f32, shot: Shot) -> Self {
        Self {
            name: name.to_string(),
            depth,
            shot,
            target: Mutex::new(None),
            renders: AtomicU64::new(0),
        }
    }

    fn paint(&self, buffer: &mut FrameBuffer, render: u64) {
        let (width, height) = (buffer.width(), buffer.height());
        match self.shot {
            Shot::Backdrop(color) => buffer.fill_rect(0, 0, width, height, color),
            Shot::Bouncer { size, speed, color } => {
                let travel = u64::from(width.saturating_sub(size).max(1));
                let offset = (render * u64::from(speed)) % (2 * travel);
                let x = if offset < travel {
                    offset
                } else {
                    2 * travel - offset
                };
                let y = height.saturating_sub(size) / 2;
                buffer.fill_rect(x as u32, y, size, size, color);
            }
            Shot::ProgressBar { period, color } => {
                let progress = (render % period) as f64 / period as f64;
                let bar = (f64::from(width) * progress).round() as u32;
                buffer.fill_rect(0, 0, bar, (height / 40).max(1), color);
            }
        }
    }
}

impl CameraSource for SyntheticCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn depth(&self) -> f32 {
        self.depth
    }

    fn target(&self) -> Option<RenderTarget> {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_target(&self, target: Option<RenderTarget>) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = target;
    }

    fn render(&self) -> FramecapResult<()> {
        let render = self.renders.fetch_add(1, Ordering::Relaxed);
        // Without a target the host would present to screen; nothing to do here.
        if let Some(target) = self.target() {
            let mut buffer = target.lock().unwrap_or_else(PoisonError::into_inner);
            self.paint(&mut buffer, render);
        }
        Ok(())
    }
}

/// Backdrop, a moving subject and a HUD overlay, listed out of depth order
/// on purpose; the session sorts them.
pub fn demo_scene(width: u32) -> Vec<Arc<dyn CameraSource>> {
    let size = (width / 10).max(1);
    vec![
        Arc::new(SyntheticCamera::new(
            "hud",
            10.0,
            Shot::ProgressBar {
                period: 120,
                color: [1.0, 1.0, 1.0, 0.8],
            },
        )),
        Arc::new(SyntheticCamera::new(
            "backdrop",
            -1.0,
            Shot::Backdrop([0.05, 0.07, 0.12, 1.0]),
        )),
        Arc::new(SyntheticCamera::new(
            "subject",
            0.0,
            Shot::Bouncer {
                size,
                speed: (size / 4).max(1),
                color: [1.6, 0.4, 0.1, 1.0],
            },
        )),
    ]
}

#[cfg(test)]
mod tests {
    use framecap_capture_engine::{BufferDescriptor, Compositor, DefaultCompositor};

    use super::*;

    fn target(width: u32, height: u32) -> RenderTarget {
        let desc = BufferDescriptor::for_frame_size(width, height, 1).unwrap();
        Arc::new(Mutex::new(FrameBuffer::allocate(&desc).unwrap()))
    }

    #[test]
    fn backdrop_covers_target() {
        let camera = SyntheticCamera::new("bg", 0.0, Shot::Backdrop([0.2, 0.2, 0.2, 1.0]));
        let target = target(8, 8);
        DefaultCompositor.composite(&camera, &target).unwrap();
        let buffer = target.lock().unwrap();
        assert!(buffer.texels().iter().all(|t| *t == [0.2, 0.2, 0.2, 1.0]));
    }

    #[test]
    fn bouncer_moves_between_renders() {
        let camera = SyntheticCamera::new(
            "box",
            0.0,
            Shot::Bouncer {
                size: 2,
                speed: 1,
                color: [1.0, 0.0, 0.0, 1.0],
            },
        );
        let first = target(10, 4);
        let second = target(10, 4);
        DefaultCompositor.composite(&camera, &first).unwrap();
        DefaultCompositor.composite(&camera, &second).unwrap();

        let lit = |t: &RenderTarget| {
            let buffer = t.lock().unwrap();
            (0..10).find(|&x| buffer.pixel(x, 1).is_some_and(|p| p[3] > 0.0))
        };
        assert_eq!(lit(&first), Some(0));
        assert_eq!(lit(&second), Some(1));
    }

    #[test]
    fn demo_scene_has_three_cameras() {
        let scene = demo_scene(320);
        let names: Vec<&str> = scene.iter().map(|c| c.name()).collect();
        assert_eq!(names, ["hud", "backdrop", "subject"]);
    }
}
