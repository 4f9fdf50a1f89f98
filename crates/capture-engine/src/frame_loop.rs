//! Host frame-loop attachment.
//!
//! The capture scheduler does not own a thread. It registers a task with
//! the host's frame loop and the host runs that task once every time a
//! frame has finished rendering. [`FrameLoopAttachment`] is the handle that
//! keeps the task registered; dropping it unregisters the task.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use framecap_common::error::{FramecapError, FramecapResult};

/// End-of-frame signal delivered to registered tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBoundary {
    /// Host frame number, counted from the first boundary signalled.
    pub frame: u64,
}

/// What a task wants after handling a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskControl {
    /// Run again at the next boundary.
    Continue,
    /// Unregister the task.
    Finish,
}

/// A long-running task resumed once per frame boundary.
pub type FrameTask = Box<dyn FnMut(&FrameBoundary) -> FramecapResult<TaskControl> + Send>;

/// Identifier of a registered task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// The host engine's per-frame task registry.
pub trait HostFrameLoop: Send + Sync {
    /// Register a task to run after every rendered frame.
    fn register(&self, task: FrameTask) -> FramecapResult<TaskId>;

    /// Unregister a task. The task does not run again, even if the host is
    /// in the middle of a boundary pass. Unknown ids are ignored.
    fn unregister(&self, id: TaskId);

    /// Multisample level configured for the host's rendering.
    fn msaa_level(&self) -> u32 {
        1
    }
}

/// Handle tying a task's lifetime to the host frame loop.
pub struct FrameLoopAttachment {
    host: Arc<dyn HostFrameLoop>,
    id: Option<TaskId>,
}

impl FrameLoopAttachment {
    /// Register `task` with `host`.
    pub fn attach(host: Arc<dyn HostFrameLoop>, task: FrameTask) -> FramecapResult<Self> {
        let id = host.register(task)?;
        tracing::debug!(%id, "Attached to host frame loop");
        Ok(Self { host, id: Some(id) })
    }

    /// Registered task id, `None` once detached.
    pub fn id(&self) -> Option<TaskId> {
        self.id
    }

    pub fn is_attached(&self) -> bool {
        self.id.is_some()
    }

    /// Unregister the task. Repeated calls do nothing.
    pub fn detach(&mut self) {
        if let Some(id) = self.id.take() {
            self.host.unregister(id);
            tracing::debug!(%id, "Detached from host frame loop");
        }
    }
}

impl Drop for FrameLoopAttachment {
    fn drop(&mut self) {
        self.detach();
    }
}

impl fmt::Debug for FrameLoopAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameLoopAttachment")
            .field("id", &self.id)
            .finish()
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    frames: u64,
    tasks: Vec<(TaskId, FrameTask)>,
    /// Tasks taken out of `tasks` for the boundary pass in progress.
    running: HashSet<TaskId>,
    /// Running tasks unregistered during the pass.
    cancelled: HashSet<TaskId>,
}

/// Frame loop driven explicitly by calling [`end_of_frame`](Self::end_of_frame).
///
/// Embedders call `end_of_frame` after presenting each frame; the CLI and
/// tests drive it directly.
pub struct ManualFrameLoop {
    registry: Mutex<Registry>,
    msaa_level: u32,
}

impl ManualFrameLoop {
    pub fn new() -> Self {
        Self::with_msaa_level(1)
    }

    /// Loop reporting the given multisample level to capture sessions.
    pub fn with_msaa_level(msaa_level: u32) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            msaa_level,
        }
    }

    /// Signal that all rendering for the current frame is complete.
    ///
    /// Every registered task runs exactly once, in registration order.
    /// Task errors do not stop the pass or unregister the task; they are
    /// logged and the first one is returned once every task has run.
    ///
    /// Boundaries must be signalled from a single thread. Each call replaces
    /// the set of tasks considered in flight, so overlapping calls would lose
    /// track of which running tasks a concurrent `unregister` should cancel.
    pub fn end_of_frame(&self) -> FramecapResult<()> {
        let (boundary, batch) = {
            let mut registry = self.registry();
            let boundary = FrameBoundary {
                frame: registry.frames,
            };
            registry.frames += 1;
            let batch = std::mem::take(&mut registry.tasks);
            registry.running = batch.iter().map(|(id, _)| *id).collect();
            (boundary, batch)
        };

        let mut kept = Vec::with_capacity(batch.len());
        let mut first_error = None;

        for (id, mut task) in batch {
            if self.registry().cancelled.contains(&id) {
                continue;
            }
            match task(&boundary) {
                Ok(TaskControl::Continue) => kept.push((id, task)),
                Ok(TaskControl::Finish) => {
                    tracing::debug!(%id, "Frame task finished");
                }
                Err(e) => {
                    tracing::error!(%id, frame = boundary.frame, error = %e, "Frame task failed");
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                    kept.push((id, task));
                }
            }
        }

        let mut registry = self.registry();
        let cancelled = std::mem::take(&mut registry.cancelled);
        registry.running.clear();
        kept.retain(|(id, _)| !cancelled.contains(id));
        // Tasks registered during the pass go after the existing ones.
        kept.append(&mut registry.tasks);
        registry.tasks = kept;
        drop(registry);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of live tasks.
    pub fn task_count(&self) -> usize {
        let registry = self.registry();
        registry.tasks.len() + registry.running.len() - registry.cancelled.len()
    }

    /// Number of boundaries signalled so far.
    pub fn frames_signalled(&self) -> u64 {
        self.registry().frames
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualFrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl HostFrameLoop for ManualFrameLoop {
    fn register(&self, task: FrameTask) -> FramecapResult<TaskId> {
        let mut registry = self.registry();
        registry.next_id = registry
            .next_id
            .checked_add(1)
            .ok_or_else(|| FramecapError::frame_loop("task id space exhausted"))?;
        let id = TaskId(registry.next_id);
        registry.tasks.push((id, task));
        Ok(id)
    }

    fn unregister(&self, id: TaskId) {
        let mut registry = self.registry();
        if let Some(pos) = registry.tasks.iter().position(|(t, _)| *t == id) {
            let (_, task) = registry.tasks.remove(pos);
            drop(registry);
            drop(task);
        } else if registry.running.contains(&id) {
            registry.cancelled.insert(id);
        }
    }

    fn msaa_level(&self) -> u32 {
        self.msaa_level
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_task(counter: Arc<AtomicUsize>) -> FrameTask {
        Box::new(move |_: &FrameBoundary| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(TaskControl::Continue)
        })
    }

    #[test]
    fn test_task_runs_once_per_boundary() {
        let host = Arc::new(ManualFrameLoop::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let _attachment =
            FrameLoopAttachment::attach(host.clone(), counting_task(counter.clone())).unwrap();

        for _ in 0..5 {
            host.end_of_frame().unwrap();
        }
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(host.frames_signalled(), 5);
    }

    #[test]
    fn test_dropping_attachment_unregisters() {
        let host = Arc::new(ManualFrameLoop::new());
        let counter = Arc::new(AtomicUsize::new(0));
        let attachment =
            FrameLoopAttachment::attach(host.clone(), counting_task(counter.clone())).unwrap();
        host.end_of_frame().unwrap();
        assert_eq!(host.task_count(), 1);

        drop(attachment);
        host.end_of_frame().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(host.task_count(), 0);
    }

    #[test]
    fn test_detach_is_idempotent() {
        let host = Arc::new(ManualFrameLoop::new());
        let task: FrameTask = Box::new(|_: &FrameBoundary| Ok(TaskControl::Continue));
        let mut attachment = FrameLoopAttachment::attach(host.clone(), task).unwrap();
        attachment.detach();
        attachment.detach();
        assert!(!attachment.is_attached());
        assert_eq!(host.task_count(), 0);
    }

    #[test]
    fn test_finish_unregisters_task() {
        let host = Arc::new(ManualFrameLoop::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let seen = runs.clone();
        host.register(Box::new(move |boundary: &FrameBoundary| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(if boundary.frame >= 1 {
                TaskControl::Finish
            } else {
                TaskControl::Continue
            })
        }))
        .unwrap();

        for _ in 0..4 {
            host.end_of_frame().unwrap();
        }
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(host.task_count(), 0);
    }

    #[test]
    fn test_task_unregistered_mid_pass_does_not_run() {
        let host = Arc::new(ManualFrameLoop::new());
        let victim_runs = Arc::new(AtomicUsize::new(0));
        let victim_id = Arc::new(Mutex::new(None::<TaskId>));

        let host_ref = host.clone();
        let id_ref = victim_id.clone();
        host.register(Box::new(move |_: &FrameBoundary| {
            if let Some(id) = *id_ref.lock().unwrap() {
                host_ref.unregister(id);
            }
            Ok(TaskControl::Continue)
        }))
        .unwrap();
        let id = host.register(counting_task(victim_runs.clone())).unwrap();
        *victim_id.lock().unwrap() = Some(id);

        host.end_of_frame().unwrap();
        host.end_of_frame().unwrap();
        assert_eq!(victim_runs.load(Ordering::SeqCst), 0);
        assert_eq!(host.task_count(), 1);
    }

    #[test]
    fn test_failing_task_stays_registered() {
        let host = Arc::new(ManualFrameLoop::new());
        let counter = Arc::new(AtomicUsize::new(0));
        host.register(Box::new(|_: &FrameBoundary| {
            Err(FramecapError::Allocation { bytes: 64 })
        }))
        .unwrap();
        host.register(counting_task(counter.clone())).unwrap();

        let err = host.end_of_frame().unwrap_err();
        assert!(matches!(err, FramecapError::Allocation { bytes: 64 }));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(host.task_count(), 2);
    }

    #[test]
    fn test_reports_msaa_level() {
        assert_eq!(ManualFrameLoop::with_msaa_level(8).msaa_level(), 8);
        assert_eq!(ManualFrameLoop::new().msaa_level(), 1);
    }
}
