//! Progress tracking for batch execution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A progress update event.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    /// Execution has started.
    Started {
        total_tasks: usize,
    },
    /// One file's task has completed.
    TaskCompleted {
        file: String,
        completed: usize,
        total: usize,
        duration_ms: u64,
    },
    /// Overall progress.
    Progress {
        percent: f32,
        elapsed_ms: u64,
        estimated_remaining_ms: Option<u64>,
    },
    /// Execution has completed.
    Completed {
        total_duration_ms: u64,
        tasks_completed: usize,
    },
    /// An error occurred.
    Error {
        file: Option<String>,
        message: String,
    },
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Tracks batch progress across workers.
///
/// The tracker is shared by reference into every worker, so its state is
/// atomics plus a lock-protected list of per-task durations used for the
/// remaining-time estimate. There is deliberately no cancellation hook:
/// once dispatched, a batch runs to its end (or to its first error).
pub struct ProgressTracker {
    /// Total number of tasks in this batch.
    total_tasks: usize,
    /// Number of tasks completed.
    completed_tasks: AtomicU64,
    /// Start time.
    start_time: Instant,
    /// Progress callback.
    callback: Option<Arc<ProgressCallback>>,
    /// Task completion times for estimation.
    task_times: parking_lot::Mutex<Vec<u64>>,
}

impl ProgressTracker {
    /// Create a new progress tracker.
    pub fn new(total_tasks: usize) -> Self {
        Self {
            total_tasks,
            completed_tasks: AtomicU64::new(0),
            start_time: Instant::now(),
            callback: None,
            task_times: parking_lot::Mutex::new(Vec::new()),
        }
    }

    /// Set a callback for progress updates.
    pub fn with_callback(mut self, callback: Arc<ProgressCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Announce the start of the batch.
    pub fn start(&self) {
        self.send_update(ProgressUpdate::Started {
            total_tasks: self.total_tasks,
        });
    }

    /// Report that one file's task has completed.
    pub fn task_completed(&self, file: &str, duration_ms: u64) {
        let completed = self.completed_tasks.fetch_add(1, Ordering::Relaxed) as usize + 1;
        self.task_times.lock().push(duration_ms);

        self.send_update(ProgressUpdate::TaskCompleted {
            file: file.to_string(),
            completed,
            total: self.total_tasks,
            duration_ms,
        });
        self.send_progress_update();
    }

    /// Report an error.
    pub fn report_error(&self, file: Option<&str>, message: String) {
        self.send_update(ProgressUpdate::Error {
            file: file.map(str::to_string),
            message,
        });
    }

    /// Announce the end of the batch.
    pub fn complete(&self) {
        self.send_update(ProgressUpdate::Completed {
            total_duration_ms: self.start_time.elapsed().as_millis() as u64,
            tasks_completed: self.completed_tasks.load(Ordering::Relaxed) as usize,
        });
    }

    /// Get current progress percentage.
    pub fn progress_percent(&self) -> f32 {
        if self.total_tasks == 0 {
            return 100.0;
        }
        let completed = self.completed_tasks.load(Ordering::Relaxed);
        (completed as f32 / self.total_tasks as f32) * 100.0
    }

    /// Estimate remaining time in milliseconds.
    pub fn estimated_remaining_ms(&self) -> Option<u64> {
        let times = self.task_times.lock();
        if times.is_empty() {
            return None;
        }
        let avg_time: u64 = times.iter().sum::<u64>() / times.len() as u64;
        let completed = self.completed_tasks.load(Ordering::Relaxed) as usize;
        let remaining = self.total_tasks.saturating_sub(completed);
        Some(avg_time * remaining as u64)
    }

    fn send_update(&self, update: ProgressUpdate) {
        if let Some(ref callback) = self.callback {
            callback(update);
        }
    }

    fn send_progress_update(&self) {
        self.send_update(ProgressUpdate::Progress {
            percent: self.progress_percent(),
            elapsed_ms: self.start_time.elapsed().as_millis() as u64,
            estimated_remaining_ms: self.estimated_remaining_ms(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_progress_calculation() {
        let tracker = ProgressTracker::new(10);
        assert_eq!(tracker.progress_percent(), 0.0);

        tracker.completed_tasks.store(5, Ordering::Relaxed);
        assert_eq!(tracker.progress_percent(), 50.0);
    }

    #[test]
    fn test_empty_batch_reads_complete() {
        let tracker = ProgressTracker::new(0);
        assert_eq!(tracker.progress_percent(), 100.0);
        assert_eq!(tracker.estimated_remaining_ms(), None);
    }

    #[test]
    fn test_one_update_per_completed_task() {
        let completions = Arc::new(AtomicUsize::new(0));
        let completions_clone = completions.clone();
        let callback: Arc<ProgressCallback> = Arc::new(Box::new(move |update| {
            if matches!(update, ProgressUpdate::TaskCompleted { .. }) {
                completions_clone.fetch_add(1, Ordering::Relaxed);
            }
        }));

        let tracker = ProgressTracker::new(3).with_callback(callback);
        tracker.start();
        tracker.task_completed("a.txt", 5);
        tracker.task_completed("b.txt", 7);
        tracker.task_completed("c.txt", 6);
        tracker.complete();

        assert_eq!(completions.load(Ordering::Relaxed), 3);
        assert!(tracker.estimated_remaining_ms().is_some());
    }
}
