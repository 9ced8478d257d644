//! Progress side channel
//!
//! Milestone events emitted while a run is in flight. The channel is
//! fire-and-forget: reporters never fail and never block the extraction
//! loop. `StdoutProgress` keeps the line protocol consumed by the
//! monitoring frontend (`PROGRESS_TOTAL:n` etc.).

/// Discrete run milestones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Total question count is known.
    TotalKnown(usize),
    /// Currently processing question `current` of `total` (1-based).
    Processing { current: usize, total: usize },
    /// The question at `current` (1-based) carries at least one image.
    ImageFound { current: usize },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: &ProgressEvent);
}

/// Writes the line protocol to stdout with an immediate flush.
pub struct StdoutProgress;

impl ProgressReporter for StdoutProgress {
    fn report(&self, event: &ProgressEvent) {
        use std::io::Write;

        let line = match event {
            ProgressEvent::TotalKnown(total) => format!("PROGRESS_TOTAL:{total}"),
            ProgressEvent::Processing { current, total } => {
                format!("PROGRESS_CURRENT:{current}:{total}")
            }
            ProgressEvent::ImageFound { current } => format!("PROGRESS_IMAGE_FOUND:{current}"),
        };
        let mut stdout = std::io::stdout();
        let _ = writeln!(stdout, "{line}");
        let _ = stdout.flush();
    }
}

/// Discards all events. Used in tests.
pub struct NullProgress;

impl ProgressReporter for NullProgress {
    fn report(&self, _event: &ProgressEvent) {}
}
