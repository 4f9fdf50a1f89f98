#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use framecap_capture_engine::{CameraSource, FrameBuffer, FrameSink, RenderTarget, Rgba};
use framecap_common::error::{FramecapError, FramecapResult};

/// Shared log of camera renders, in call order.
pub type RenderLog = Arc<Mutex<Vec<String>>>;

/// Camera that logs each render and paints a rectangle into its target.
pub struct RecordingCamera {
    name: String,
    depth: f32,
    color: Rgba,
    rect: (u32, u32, u32, u32),
    log: RenderLog,
    target: Mutex<Option<RenderTarget>>,
    pub fail: Mutex<bool>,
    pub hold_target: Mutex<Option<RenderTarget>>,
    pub leak_target: bool,
}

impl RecordingCamera {
    pub fn new(name: &str, depth: f32, log: &RenderLog) -> Self {
        Self {
            name: name.to_string(),
            depth,
            color: [1.0, 1.0, 1.0, 1.0],
            rect: (0, 0, u32::MAX, u32::MAX),
            log: log.clone(),
            target: Mutex::new(None),
            fail: Mutex::new(false),
            hold_target: Mutex::new(None),
            leak_target: false,
        }
    }

    pub fn painting(mut self, color: Rgba, rect: (u32, u32, u32, u32)) -> Self {
        self.color = color;
        self.rect = rect;
        self
    }

    pub fn shared(self) -> Arc<dyn CameraSource> {
        Arc::new(self)
    }
}

impl CameraSource for RecordingCamera {
    fn name(&self) -> &str {
        &self.name
    }

    fn depth(&self) -> f32 {
        self.depth
    }

    fn target(&self) -> Option<RenderTarget> {
        self.target.lock().unwrap().clone()
    }

    fn set_target(&self, target: Option<RenderTarget>) {
        *self.target.lock().unwrap() = target;
    }

    fn render(&self) -> FramecapResult<()> {
        self.log.lock().unwrap().push(self.name.clone());
        if *self.fail.lock().unwrap() {
            return Err(FramecapError::render(&self.name, "device lost"));
        }
        if let Some(target) = self.target() {
            if self.leak_target {
                *self.hold_target.lock().unwrap() = Some(target.clone());
            }
            let (x, y, w, h) = self.rect;
            target.lock().unwrap().fill_rect(x, y, w, h, self.color);
        }
        Ok(())
    }
}

/// What a sink saw for one commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
    pub buffer_id: u64,
    pub width: u32,
    pub height: u32,
    pub timestamp: i64,
    pub first_pixel: Option<Rgba>,
}

#[derive(Debug, Default)]
pub struct SinkLog {
    pub commits: Vec<Commit>,
    pub attempts: u64,
    pub disposals: u32,
    /// Commit attempts (0-based) to reject.
    pub reject: Vec<u64>,
}

/// Sink recording every commit into a shared log.
pub struct RecordingSink {
    size: Option<(u32, u32)>,
    pub log: Arc<Mutex<SinkLog>>,
}

impl RecordingSink {
    pub fn new(width: u32, height: u32) -> (Self, Arc<Mutex<SinkLog>>) {
        Self::with_size(Some((width, height)))
    }

    pub fn with_size(size: Option<(u32, u32)>) -> (Self, Arc<Mutex<SinkLog>>) {
        let log = Arc::new(Mutex::new(SinkLog::default()));
        (
            Self {
                size,
                log: log.clone(),
            },
            log,
        )
    }
}

impl FrameSink for RecordingSink {
    fn frame_size(&self) -> Option<(u32, u32)> {
        self.size
    }

    fn commit_frame(&mut self, buffer: &FrameBuffer, timestamp: i64) -> FramecapResult<()> {
        let mut log = self.log.lock().unwrap();
        let attempt = log.attempts;
        log.attempts += 1;
        if log.reject.contains(&attempt) {
            return Err(FramecapError::commit("encoder busy"));
        }
        log.commits.push(Commit {
            buffer_id: buffer.id(),
            width: buffer.width(),
            height: buffer.height(),
            timestamp,
            first_pixel: buffer.pixel(0, 0),
        });
        Ok(())
    }

    fn dispose(&mut self) -> FramecapResult<()> {
        self.log.lock().unwrap().disposals += 1;
        Ok(())
    }
}

pub fn render_log() -> RenderLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn commit_count(log: &Arc<Mutex<SinkLog>>) -> usize {
    log.lock().unwrap().commits.len()
}
