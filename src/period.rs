//! # Sampling Period Statistics
//!
//! Records the instants at which a recurring event fires (one mark per ADC
//! tick) and summarizes the gaps between consecutive marks as min/max/avg
//! jitter in milliseconds. The sampler clears the statistics at each second
//! boundary and keeps the last summary around for the status display.

use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Inter-event timing summary for one collection window.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PeriodStats {
    /// Shortest gap between consecutive events, in ms
    pub min_ms: f64,
    /// Longest gap between consecutive events, in ms
    pub max_ms: f64,
    /// Mean gap between consecutive events, in ms
    pub avg_ms: f64,
    /// Number of gaps summarized
    pub count: usize,
}

impl fmt::Display for PeriodStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Smpl ms[{:.3}, {:.3}] avg {:.3}/{}",
            self.min_ms, self.max_ms, self.avg_ms, self.count
        )
    }
}

#[derive(Debug, Default)]
struct PeriodInner {
    last_mark: Option<Instant>,
    min: Duration,
    max: Duration,
    total: Duration,
    count: usize,
}

impl PeriodInner {
    fn record(&mut self, now: Instant) {
        if let Some(prev) = self.last_mark {
            let gap = now - prev;
            if self.count == 0 {
                self.min = gap;
                self.max = gap;
            } else {
                self.min = self.min.min(gap);
                self.max = self.max.max(gap);
            }
            self.total += gap;
            self.count += 1;
        }
        self.last_mark = Some(now);
    }

    fn take_stats(&mut self) -> Option<PeriodStats> {
        if self.count == 0 {
            return None;
        }
        let to_ms = |d: Duration| d.as_secs_f64() * 1000.0;
        let stats = PeriodStats {
            min_ms: to_ms(self.min),
            max_ms: to_ms(self.max),
            avg_ms: to_ms(self.total) / self.count as f64,
            count: self.count,
        };
        // Keep the last mark so the next window's first gap spans the clear.
        self.min = Duration::ZERO;
        self.max = Duration::ZERO;
        self.total = Duration::ZERO;
        self.count = 0;
        Some(stats)
    }
}

/// Records event timestamps and computes jitter statistics over a window.
///
/// Safe to mark from one thread and query from another; all state sits
/// behind an internal mutex held only for constant-time updates.
#[derive(Debug, Default)]
pub struct PeriodTimer {
    inner: Mutex<PeriodInner>,
}

impl PeriodTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of the event at the current instant.
    pub fn mark(&self) {
        self.mark_at(Instant::now());
    }

    fn mark_at(&self, now: Instant) {
        self.inner.lock().expect("period lock poisoned").record(now);
    }

    /// Summarize the gaps recorded since the last clear, then clear.
    ///
    /// Returns `None` when fewer than two marks landed in the window.
    pub fn statistics_and_clear(&self) -> Option<PeriodStats> {
        self.inner
            .lock()
            .expect("period lock poisoned")
            .take_stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_marks_yields_no_stats() {
        let timer = PeriodTimer::new();
        assert_eq!(timer.statistics_and_clear(), None);
    }

    #[test]
    fn single_mark_yields_no_stats() {
        let timer = PeriodTimer::new();
        timer.mark();
        assert_eq!(timer.statistics_and_clear(), None);
    }

    #[test]
    fn gaps_are_summarized_in_ms() {
        let timer = PeriodTimer::new();
        let start = Instant::now();
        timer.mark_at(start);
        timer.mark_at(start + Duration::from_millis(1));
        timer.mark_at(start + Duration::from_millis(4));

        let stats = timer.statistics_and_clear().unwrap();
        assert_eq!(stats.count, 2);
        assert!((stats.min_ms - 1.0).abs() < 1e-9);
        assert!((stats.max_ms - 3.0).abs() < 1e-9);
        assert!((stats.avg_ms - 2.0).abs() < 1e-9);
    }

    #[test]
    fn clear_preserves_the_last_mark() {
        let timer = PeriodTimer::new();
        let start = Instant::now();
        timer.mark_at(start);
        timer.mark_at(start + Duration::from_millis(2));
        timer.statistics_and_clear();

        // The first gap of the new window spans from the pre-clear mark.
        timer.mark_at(start + Duration::from_millis(5));
        let stats = timer.statistics_and_clear().unwrap();
        assert_eq!(stats.count, 1);
        assert!((stats.min_ms - 3.0).abs() < 1e-9);
    }

    #[test]
    fn stats_format_matches_status_line_shape() {
        let stats = PeriodStats {
            min_ms: 0.921,
            max_ms: 1.504,
            avg_ms: 1.102,
            count: 987,
        };
        assert_eq!(stats.to_string(), "Smpl ms[0.921, 1.504] avg 1.102/987");
    }
}
