//! Progress reporting
//!
//! Purely observational: reporters must never block or fail dispatch. The
//! numbers describe records *submitted* to workers, not records committed.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot taken after every dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub batches_submitted: u64,
    pub records_submitted: u64,
    pub total_records: Option<u64>,
}

impl Progress {
    /// Completed share in percent, clamped to 100. `None` without a total.
    pub fn percent(&self) -> Option<f64> {
        let total = self.total_records.filter(|t| *t > 0)?;
        let done = self.records_submitted.min(total);
        Some(done as f64 * 100.0 / total as f64)
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.total_records, Some(total) if self.records_submitted >= total)
    }
}

/// Receives progress snapshots from the dispatch path.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _progress: Progress) {}
}

/// Single-line terminal bar on stderr.
#[derive(Debug)]
pub struct TerminalProgress {
    length: usize,
    fill: char,
    finished: AtomicBool,
}

impl Default for TerminalProgress {
    fn default() -> Self {
        Self::new(60)
    }
}

impl TerminalProgress {
    pub fn new(length: usize) -> Self {
        Self {
            length: length.max(1),
            fill: '█',
            finished: AtomicBool::new(false),
        }
    }

    /// Render one frame of the bar, starting with a carriage return.
    pub fn render(&self, progress: &Progress) -> String {
        let Some(percent) = progress.percent() else {
            return format!(
                "\rProgress: {} records in {} batches",
                progress.records_submitted, progress.batches_submitted
            );
        };
        let filled = ((self.length as f64) * percent / 100.0) as usize;
        let filled = filled.min(self.length);
        let bar: String = std::iter::repeat_n(self.fill, filled)
            .chain(std::iter::repeat_n('-', self.length - filled))
            .collect();
        format!("\rProgress: |{bar}| {percent:.1}% Complete")
    }
}

impl ProgressReporter for TerminalProgress {
    fn report(&self, progress: Progress) {
        let line = self.render(&progress);
        let mut stderr = std::io::stderr().lock();
        // best effort
        let _ = stderr.write_all(line.as_bytes());
        if progress.is_complete() && !self.finished.swap(true, Ordering::Relaxed) {
            let _ = stderr.write_all(b"\n");
        }
        let _ = stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_partial_bar() {
        let bar = TerminalProgress::new(8);
        let line = bar.render(&Progress {
            batches_submitted: 1,
            records_submitted: 1,
            total_records: Some(8),
        });
        assert_eq!(line, "\rProgress: |█-------| 12.5% Complete");
    }

    #[test]
    fn test_render_clamps_overshoot() {
        let bar = TerminalProgress::new(4);
        let line = bar.render(&Progress {
            batches_submitted: 3,
            records_submitted: 12,
            total_records: Some(10),
        });
        assert_eq!(line, "\rProgress: |████| 100.0% Complete");
    }

    #[test]
    fn test_render_without_total() {
        let bar = TerminalProgress::default();
        let line = bar.render(&Progress {
            batches_submitted: 2,
            records_submitted: 16000,
            total_records: None,
        });
        assert!(line.contains("16000 records in 2 batches"));
    }

    #[test]
    fn test_percent_and_completion() {
        let p = Progress {
            batches_submitted: 1,
            records_submitted: 5,
            total_records: Some(10),
        };
        assert_eq!(p.percent(), Some(50.0));
        assert!(!p.is_complete());
        assert_eq!(Progress::default().percent(), None);
    }
}
