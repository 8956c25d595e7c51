//! Per-file transfer progress: atomic running total plus a
//! carriage-return-updated status line

use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running progress for one in-flight transfer.
///
/// Part uploads run on parallel tasks, so `record` may be called
/// concurrently; the running total is an atomic fetch-add and never loses
/// updates. The rendered line is cosmetic only.
pub struct ProgressTracker {
    filename: String,
    total_size: u64,
    transferred: AtomicU64,
    render: bool,
}

impl ProgressTracker {
    pub fn new(filename: impl Into<String>, total_size: u64) -> Self {
        Self {
            filename: filename.into(),
            total_size,
            transferred: AtomicU64::new(0),
            render: true,
        }
    }

    /// Tracker that accumulates without writing to stdout.
    pub fn silent(filename: impl Into<String>, total_size: u64) -> Self {
        Self {
            render: false,
            ..Self::new(filename, total_size)
        }
    }

    /// Add `bytes` to the running total and redraw the status line.
    /// Returns the new total.
    pub fn record(&self, bytes: u64) -> u64 {
        let transferred = self.transferred.fetch_add(bytes, Ordering::SeqCst) + bytes;
        if self.render {
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\r{}", self.status_line(transferred));
            let _ = stdout.flush();
        }
        transferred
    }

    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    pub fn percent(&self) -> f64 {
        if self.total_size == 0 {
            return 100.0;
        }
        self.transferred() as f64 / self.total_size as f64 * 100.0
    }

    fn status_line(&self, transferred: u64) -> String {
        let percent = if self.total_size == 0 {
            100.0
        } else {
            transferred as f64 / self.total_size as f64 * 100.0
        };
        format!(
            "{}  {} / {}  ({:.2}%)",
            self.filename, transferred, self.total_size, percent
        )
    }

    /// Terminate the overwritable line so subsequent log output starts fresh.
    pub fn finish(&self) {
        if self.render {
            println!();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ProgressTracker;
    use std::sync::Arc;

    #[test]
    fn status_line_matches_expected_format() {
        let tracker = ProgressTracker::silent("video.mp4", 200);
        assert_eq!(tracker.status_line(50), "video.mp4  50 / 200  (25.00%)");
    }

    #[test]
    fn percent_is_exactly_one_hundred_at_completion() {
        let tracker = ProgressTracker::silent("big.bin", 3);
        tracker.record(1);
        tracker.record(1);
        tracker.record(1);
        assert_eq!(tracker.percent(), 100.0);
    }

    #[test]
    fn zero_byte_file_reports_one_hundred_percent() {
        let tracker = ProgressTracker::silent("empty", 0);
        assert_eq!(tracker.percent(), 100.0);
    }

    #[test]
    fn concurrent_records_lose_no_updates() {
        let total: u64 = 64 * 100;
        let tracker = Arc::new(ProgressTracker::silent("big.bin", total));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tracker = tracker.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        tracker.record(8);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(tracker.transferred(), total);
        assert_eq!(tracker.percent(), 100.0);
    }
}
