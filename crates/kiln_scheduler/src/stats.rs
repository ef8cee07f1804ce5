//! Progress counters and their human-readable form.

use std::fmt;
use std::time::Duration;

/// A snapshot of compilation progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompilationStats {
    /// Tasks that produced an artifact.
    pub completed: u64,
    /// Tasks whose compile failed.
    pub failed: u64,
    /// Tasks enqueued since the last clear.
    pub total: u64,
    /// Requests satisfied without invoking the compiler.
    pub cache_hits: u64,
    /// Time spent with work in flight.
    pub elapsed: Duration,
    /// Estimated time until the queue drains.
    pub eta: Duration,
}

impl CompilationStats {
    /// Tasks neither completed nor failed.
    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.completed + self.failed)
    }

    /// `remaining / (completed / elapsed)`, or zero without a known rate.
    pub fn estimate_eta(completed: u64, total: u64, failed: u64, elapsed: Duration) -> Duration {
        let remaining = total.saturating_sub(completed + failed);
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
        if completed == 0 || elapsed_ms <= 0.0 {
            return Duration::ZERO;
        }
        // remaining / (completed / elapsed), rearranged to keep precision
        let eta_ms = remaining as f64 * elapsed_ms / completed as f64;
        Duration::from_secs_f64(eta_ms.max(0.0) / 1000.0)
    }

    /// `HH:MM:SS/HH:MM:SS`, elapsed over estimated total.
    pub fn time_only(&self) -> String {
        format!(
            "{}/{}",
            format_hms(self.elapsed),
            format_hms(self.elapsed + self.eta)
        )
    }
}

/// Formats a duration as zero-padded `HH:MM:SS`, truncating sub-seconds.
pub fn format_hms(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

impl fmt::Display for CompilationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} (successful/total)\tfailed: {}\tcachehits: {}\nElapsed/Estimated Time: {}",
            self.completed,
            self.total,
            self.failed,
            self.cache_hits,
            self.time_only()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hms_formatting() {
        assert_eq!(format_hms(Duration::ZERO), "00:00:00");
        assert_eq!(format_hms(Duration::from_millis(61_999)), "00:01:01");
        assert_eq!(format_hms(Duration::from_secs(3 * 3600 + 7)), "03:00:07");
    }

    #[test]
    fn eta_from_rate() {
        // 10 done in 10s, 5 left
        let eta = CompilationStats::estimate_eta(10, 16, 1, Duration::from_secs(10));
        assert_eq!(eta.as_secs(), 5);
        assert_eq!(
            CompilationStats::estimate_eta(0, 10, 0, Duration::from_secs(3)),
            Duration::ZERO
        );
        assert_eq!(CompilationStats::estimate_eta(3, 3, 0, Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn display_format() {
        let stats = CompilationStats {
            completed: 3,
            failed: 1,
            total: 8,
            cache_hits: 2,
            elapsed: Duration::from_secs(65),
            eta: Duration::from_secs(60),
        };
        assert_eq!(
            stats.to_string(),
            "3/8 (successful/total)\tfailed: 1\tcachehits: 2\nElapsed/Estimated Time: 00:01:05/00:02:05"
        );
        assert_eq!(stats.time_only(), "00:01:05/00:02:05");
        assert_eq!(stats.remaining(), 4);
    }
}
