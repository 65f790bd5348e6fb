use std::collections::HashMap;
use std::collections::VecDeque;

use crate::colorize::colorize_json;

/// Bounded mapping of clipped raw lines to their styled counterparts, so
/// lines that stay in view are not re-colorized every frame.
///
/// Eviction is strict FIFO by insertion order: once capacity is exceeded the
/// oldest inserted key goes, regardless of how recently it was hit. The key
/// is the text after horizontal clipping, so scrolling sideways produces new
/// keys; that churn is expected and bounded by the capacity.
pub struct LineColorCache {
    max_entries: usize,
    lines: HashMap<String, String>,
    order: VecDeque<String>,
}

impl LineColorCache {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            max_entries,
            lines: HashMap::with_capacity(max_entries),
            order: VecDeque::with_capacity(max_entries),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Styled text for `line`, computed on first sight and cached after.
    pub fn colorize(&mut self, line: &str) -> String {
        if line.is_empty() {
            return String::new();
        }
        if let Some(colored) = self.lines.get(line) {
            return colored.clone();
        }

        let colored = colorize_json(line);
        self.lines.insert(line.to_string(), colored.clone());
        self.order.push_back(line.to_string());

        if self.order.len() > self.max_entries
            && let Some(evicted) = self.order.pop_front()
        {
            self.lines.remove(&evicted);
        }

        colored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repeated_lines_hit_the_cache() {
        let mut cache = LineColorCache::new(8);
        let first = cache.colorize(r#""a": 1"#);
        let second = cache.colorize(r#""a": 1"#);
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn size_never_exceeds_capacity() {
        let mut cache = LineColorCache::new(3);
        for i in 0..10 {
            cache.colorize(&format!(r#""k": {i}"#));
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn eviction_is_first_in_first_out_not_recency() {
        let mut cache = LineColorCache::new(2);
        cache.colorize("oldest");
        cache.colorize("middle");
        // A hit on the oldest entry does not protect it.
        cache.colorize("oldest");
        cache.colorize("newest");
        assert!(!cache.lines.contains_key("oldest"));
        assert!(cache.lines.contains_key("middle"));
        assert!(cache.lines.contains_key("newest"));
    }

    #[test]
    fn empty_lines_are_not_cached() {
        let mut cache = LineColorCache::new(2);
        assert_eq!(cache.colorize(""), "");
        assert!(cache.is_empty());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let mut cache = LineColorCache::new(0);
        cache.colorize("a");
        cache.colorize("b");
        assert_eq!(cache.len(), 1);
    }
}
