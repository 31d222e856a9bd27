//! Progress and cancellation hooks for long-running operations.
//!
//! Hooks are invoked only between coarse phases, never inside one.

use std::fmt;

/// A coarse phase of a long-running operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Loading one file of a batch.
    Load { index: usize, total: usize, file: String },
    /// Selected datasets concatenated.
    Merge,
    /// Non-temporal filters applied.
    BaseFilter,
    /// One cross-month spec evaluated.
    CrossMonth { index: usize, total: usize, field: String },
    /// Passing sets intersected.
    Intersect,
    /// Passing rows extracted.
    Extract,
    /// Report rows pivoted.
    Pivot,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { index, total, file } => write!(f, "loading {file} ({}/{total})", index + 1),
            Self::Merge => f.write_str("merging datasets"),
            Self::BaseFilter => f.write_str("applying base filters"),
            Self::CrossMonth { index, total, field } => {
                write!(f, "cross-month filter on {field} ({}/{total})", index + 1)
            }
            Self::Intersect => f.write_str("intersecting passing animals"),
            Self::Extract => f.write_str("extracting passing rows"),
            Self::Pivot => f.write_str("building monthly report"),
            Self::Done => f.write_str("done"),
        }
    }
}

/// A progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub phase: Phase,
    /// Completion in percent, 0..=100.
    pub percent: u8,
}

/// Optional progress callback and cancellation probe.
#[derive(Clone, Copy, Default)]
pub struct RunHooks<'a> {
    progress: Option<&'a (dyn Fn(&Progress) + Sync)>,
    cancel: Option<&'a (dyn Fn() -> bool + Sync)>,
}

impl<'a> RunHooks<'a> {
    /// Hooks that do nothing.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: &'a (dyn Fn(&Progress) + Sync)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_cancel(mut self, cancel: &'a (dyn Fn() -> bool + Sync)) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn report(&self, phase: Phase, percent: u8) {
        if let Some(progress) = self.progress {
            progress(&Progress {
                phase,
                percent: percent.min(100),
            });
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|cancel| cancel())
    }
}

impl fmt::Debug for RunHooks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHooks")
            .field("progress", &self.progress.is_some())
            .field("cancel", &self.cancel.is_some())
            .finish()
    }
}
