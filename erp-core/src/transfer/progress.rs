use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Progress of a bulk pass: a status line plus a resource count.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: String,
    /// Resources finished so far.
    pub current: usize,
    pub total: usize,
}

impl ProgressEvent {
    pub fn new(status: impl Into<String>, current: usize, total: usize) -> Self {
        Self {
            status: status.into(),
            current,
            total,
        }
    }

    /// Completion in `0.0..=1.0`; an empty pass counts as done.
    pub fn ratio(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Receives progress from a bulk pass, possibly on a worker thread.
pub trait ProgressSink: Send {
    fn on_progress(&mut self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: FnMut(&ProgressEvent) + Send,
{
    fn on_progress(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&mut self, _event: &ProgressEvent) {}
}

/// Shared stop flag, checked between resources.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
