use std::collections::HashMap;
use std::time::Duration;
use std::time::Instant;

use crate::error::QueryError;

/// Optional sampling of queued -> dispatch -> result latencies.
///
/// Disabled instances turn every operation into a no-op and report no
/// summary. All state lives on the event loop; no synchronization.
#[derive(Debug)]
pub struct LatencyTelemetry {
    enabled: bool,

    pending: HashMap<u64, LatencySpan>,

    queued_to_result: Vec<Duration>,
    queued_to_dispatch: Vec<Duration>,
    run_time: Vec<Duration>,

    dropped_debounce: u64,
    stale_results: u64,
    cancelled_results: u64,
}

#[derive(Debug, Clone, Copy)]
struct LatencySpan {
    queued_at: Instant,
    dispatched_at: Option<Instant>,
}

impl LatencyTelemetry {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            pending: HashMap::new(),
            queued_to_result: Vec::new(),
            queued_to_dispatch: Vec::new(),
            run_time: Vec::new(),
            dropped_debounce: 0,
            stale_results: 0,
            cancelled_results: 0,
        }
    }

    pub fn on_queued(&mut self, seq: u64) {
        if !self.enabled {
            return;
        }
        self.pending.insert(
            seq,
            LatencySpan {
                queued_at: Instant::now(),
                dispatched_at: None,
            },
        );
    }

    pub fn on_dispatch(&mut self, seq: u64) {
        if !self.enabled {
            return;
        }
        let now = Instant::now();
        let span = self.pending.entry(seq).or_insert(LatencySpan {
            queued_at: now,
            dispatched_at: None,
        });
        span.dispatched_at = Some(now);
        self.queued_to_dispatch.push(now - span.queued_at);
    }

    pub fn on_debounce_dropped(&mut self, seq: u64) {
        if !self.enabled {
            return;
        }
        if self.pending.remove(&seq).is_some() {
            self.dropped_debounce += 1;
        }
    }

    pub fn on_result(&mut self, seq: u64, result: &Result<String, QueryError>, accepted: bool) {
        if !self.enabled {
            return;
        }
        let cancelled = matches!(result, Err(err) if err.is_cancelled());

        let Some(span) = self.pending.remove(&seq) else {
            if cancelled {
                self.cancelled_results += 1;
            }
            if !accepted {
                self.stale_results += 1;
            }
            return;
        };

        let now = Instant::now();
        if accepted && !cancelled {
            self.queued_to_result.push(now - span.queued_at);
            if let Some(dispatched_at) = span.dispatched_at {
                self.run_time.push(now - dispatched_at);
            }
        }
        if cancelled {
            self.cancelled_results += 1;
        }
        if !accepted {
            self.stale_results += 1;
        }
    }

    /// Formatted snapshot of sample counts, percentiles, and counters.
    /// `None` when telemetry is disabled (not merely empty).
    pub fn summary(&self) -> Option<String> {
        if !self.enabled {
            return None;
        }
        if self.queued_to_result.is_empty() {
            return Some("telemetry: no completed samples yet".to_string());
        }

        let (frame_p50, frame_p95, frame_p99) = percentiles(&self.queued_to_result);
        let (start_p50, start_p95, start_p99) = percentiles(&self.queued_to_dispatch);
        let (run_p50, run_p95, run_p99) = percentiles(&self.run_time);

        Some(format!(
            "telemetry keypress->frame samples={} p50={frame_p50:?} p95={frame_p95:?} p99={frame_p99:?} \
             | keypress->dispatch p50={start_p50:?} p95={start_p95:?} p99={start_p99:?} \
             | execute p50={run_p50:?} p95={run_p95:?} p99={run_p99:?} \
             | dropped(debounce)={} stale={} cancelled={}",
            self.queued_to_result.len(),
            self.dropped_debounce,
            self.stale_results,
            self.cancelled_results,
        ))
    }

    pub fn dropped_debounce(&self) -> u64 {
        self.dropped_debounce
    }

    pub fn stale_results(&self) -> u64 {
        self.stale_results
    }

    pub fn cancelled_results(&self) -> u64 {
        self.cancelled_results
    }
}

/// (p50, p95, p99) over a sample set, selecting index
/// `floor((n - 1) * p / 100)` of a sorted copy.
fn percentiles(samples: &[Duration]) -> (Duration, Duration, Duration) {
    if samples.is_empty() {
        return (Duration::ZERO, Duration::ZERO, Duration::ZERO);
    }
    let mut sorted = samples.to_vec();
    sorted.sort();
    (
        percentile(&sorted, 50),
        percentile(&sorted, 95),
        percentile(&sorted, 99),
    )
}

fn percentile(sorted: &[Duration], p: u32) -> Duration {
    let idx = (sorted.len() - 1) * p as usize / 100;
    sorted[idx.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn percentiles_select_by_sorted_index() {
        let samples = vec![ms(10), ms(20), ms(30), ms(40), ms(50)];
        let (p50, p95, p99) = percentiles(&samples);
        assert_eq!(p50, ms(30));
        assert_eq!(p95, ms(40));
        assert_eq!(p99, ms(40));
    }

    #[test]
    fn percentiles_single_sample() {
        let samples = vec![ms(7)];
        let (p50, p95, p99) = percentiles(&samples);
        assert_eq!((p50, p95, p99), (ms(7), ms(7), ms(7)));
    }

    #[test]
    fn disabled_telemetry_has_no_summary() {
        let mut t = LatencyTelemetry::new(false);
        t.on_queued(1);
        t.on_dispatch(1);
        t.on_result(1, &Ok(String::new()), true);
        assert_eq!(t.summary(), None);
    }

    #[test]
    fn enabled_but_empty_reports_no_samples() {
        let t = LatencyTelemetry::new(true);
        assert_eq!(
            t.summary().expect("enabled"),
            "telemetry: no completed samples yet"
        );
    }

    #[test]
    fn accepted_result_records_samples() {
        let mut t = LatencyTelemetry::new(true);
        t.on_queued(1);
        t.on_dispatch(1);
        t.on_result(1, &Ok(String::new()), true);
        assert_eq!(t.queued_to_result.len(), 1);
        assert_eq!(t.queued_to_dispatch.len(), 1);
        assert_eq!(t.run_time.len(), 1);
        assert!(t.summary().expect("enabled").contains("samples=1"));
    }

    #[test]
    fn debounce_drop_removes_pending_span() {
        let mut t = LatencyTelemetry::new(true);
        t.on_queued(1);
        t.on_debounce_dropped(1);
        assert_eq!(t.dropped_debounce(), 1);
        // A second drop for the same sequence is not double counted.
        t.on_debounce_dropped(1);
        assert_eq!(t.dropped_debounce(), 1);
    }

    #[test]
    fn stale_and_cancelled_results_only_count() {
        let mut t = LatencyTelemetry::new(true);
        t.on_queued(1);
        t.on_dispatch(1);
        t.on_result(1, &Ok(String::new()), false);
        assert_eq!(t.stale_results(), 1);
        assert_eq!(t.queued_to_result.len(), 0);

        t.on_queued(2);
        t.on_dispatch(2);
        t.on_result(2, &Err(QueryError::Cancelled), true);
        assert_eq!(t.cancelled_results(), 1);
        assert_eq!(t.queued_to_result.len(), 0);
    }
}
