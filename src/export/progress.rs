//! Progress tracking for export operations
//!
//! The writer is the only place that knows how many rows actually reached the
//! file, so it drives the tracker; scan workers never touch it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};

/// Refresh the bar message every this many rows
const MESSAGE_EVERY: u64 = 1024;

/// Progress tracker for export operations
///
/// Counts lines written and optionally displays a spinner with the write
/// rate. Cloning shares the same counter and bar.
#[derive(Clone)]
pub struct ProgressTracker {
    /// Number of lines written so far
    processed: Arc<AtomicU64>,
    /// Start time of the operation
    start_time: Instant,
    /// Spinner (optional, can be disabled)
    bar: Option<ProgressBar>,
}

impl ProgressTracker {
    /// Create a new progress tracker
    ///
    /// # Arguments
    /// * `enable_bar` - Whether to display a spinner
    ///
    /// # Returns
    /// * `Self` - New progress tracker instance
    pub fn new(enable_bar: bool) -> Self {
        let bar = enable_bar.then(|| {
            let bar = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {pos} rows {msg}") {
                bar.set_style(style);
            }
            bar
        });

        Self {
            processed: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
            bar,
        }
    }

    /// A tracker that only counts
    pub fn disabled() -> Self {
        Self::new(false)
    }

    /// Record `count` more lines written
    pub fn increment(&self, count: u64) {
        let total = self.processed.fetch_add(count, Ordering::Relaxed) + count;

        if let Some(ref bar) = self.bar {
            bar.set_position(total);

            if total % MESSAGE_EVERY < count {
                let elapsed = self.start_time.elapsed().as_secs_f64();
                if elapsed > 0.0 {
                    bar.set_message(format!("({:.0} rows/sec)", total as f64 / elapsed));
                }
            }
        }
    }

    /// Lines recorded so far
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Finish and clear the spinner
    pub fn finish(&self) {
        if let Some(ref bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_tracker_counts() {
        let tracker = ProgressTracker::disabled();
        tracker.increment(3);
        tracker.increment(2);
        assert_eq!(tracker.processed(), 5);
    }

    #[test]
    fn test_clones_share_counter() {
        let tracker = ProgressTracker::new(false);
        let clone = tracker.clone();
        clone.increment(10);
        assert_eq!(tracker.processed(), 10);
        tracker.finish();
    }
}
