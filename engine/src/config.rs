use std::time::Duration;

/// Tunables for one engine session.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// How long input must settle before a queued execution dispatches.
    pub debounce: Duration,
    /// Capacity of the styled-line render cache.
    pub render_cache_capacity: usize,
    /// Collect latency telemetry.
    pub telemetry: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(30),
            render_cache_capacity: 4096,
            telemetry: false,
        }
    }
}
