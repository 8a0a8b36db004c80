//! Progress reporting for stage execution.
//!
//! The coordinator reports coarse progress around each stage run: one
//! `start` before the executor begins and one `end` with a success flag
//! after, on every path. Callers plug in their own reporter (spinner,
//! progress bar, notification); the default discards everything.

use async_trait::async_trait;
use tracing::info;

/// Trait for receivers of stage progress.
///
/// Implementations must never fail: reporting is an observability concern
/// and has no bearing on the outcome of a stage.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    /// Called once before stage execution begins.
    async fn start(&self, title: &str);

    /// Called once after the stage finishes, on every path.
    ///
    /// `success` is true only for a fully successful run; partial success
    /// and pre-execution aborts both report false.
    async fn end(&self, success: bool);
}

/// A reporter that discards all progress.
///
/// Used as the default when the caller supplies none.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgressReporter;

#[async_trait]
impl ProgressReporter for NoOpProgressReporter {
    async fn start(&self, _title: &str) {}

    async fn end(&self, _success: bool) {}
}

/// A reporter that logs progress through the tracing framework.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingProgressReporter;

#[async_trait]
impl ProgressReporter for LoggingProgressReporter {
    async fn start(&self, title: &str) {
        info!(title = %title, "progress started");
    }

    async fn end(&self, success: bool) {
        info!(success, "progress ended");
    }
}

/// A progress event recorded by [`CollectingProgressReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// A `start` call with its title.
    Started(String),
    /// An `end` call with its success flag.
    Ended(bool),
}

/// A collecting reporter for testing purposes.
#[derive(Debug, Default)]
pub struct CollectingProgressReporter {
    events: parking_lot::RwLock<Vec<ProgressEvent>>,
}

impl CollectingProgressReporter {
    /// Creates a new collecting reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events in order.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.read().clone()
    }

    /// Returns the success flag of the last `end` call, if any.
    #[must_use]
    pub fn last_outcome(&self) -> Option<bool> {
        self.events.read().iter().rev().find_map(|e| match e {
            ProgressEvent::Ended(success) => Some(*success),
            ProgressEvent::Started(_) => None,
        })
    }
}

#[async_trait]
impl ProgressReporter for CollectingProgressReporter {
    async fn start(&self, title: &str) {
        self.events
            .write()
            .push(ProgressEvent::Started(title.to_string()));
    }

    async fn end(&self, success: bool) {
        self.events.write().push(ProgressEvent::Ended(success));
    }
}
