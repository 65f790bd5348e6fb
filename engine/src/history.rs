const MAX_ENTRIES: usize = 50;

/// In-memory history of submitted filters for the current session, most
/// recent first. Re-submitting an existing filter moves it to the front
/// instead of duplicating it.
#[derive(Debug, Default)]
pub struct FilterHistory {
    entries: Vec<String>,
}

impl FilterHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, filter: &str) {
        if filter.trim().is_empty() {
            return;
        }
        if let Some(pos) = self.entries.iter().position(|e| e == filter) {
            self.entries.remove(pos);
        }
        self.entries.insert(0, filter.to_string());
        self.entries.truncate(MAX_ENTRIES);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn most_recent_first() {
        let mut h = FilterHistory::new();
        h.add(".a");
        h.add(".b");
        assert_eq!(h.entries(), [".b", ".a"]);
    }

    #[test]
    fn resubmission_moves_to_front_without_duplicating() {
        let mut h = FilterHistory::new();
        h.add(".a");
        h.add(".b");
        h.add(".a");
        assert_eq!(h.entries(), [".a", ".b"]);
    }

    #[test]
    fn blank_filters_are_ignored() {
        let mut h = FilterHistory::new();
        h.add("   ");
        h.add("");
        assert!(h.is_empty());
    }

    #[test]
    fn capped_at_fifty_entries() {
        let mut h = FilterHistory::new();
        for i in 0..60 {
            h.add(&format!(".k{i}"));
        }
        assert_eq!(h.len(), 50);
        assert_eq!(h.entries()[0], ".k59");
        assert_eq!(h.entries()[49], ".k10");
    }
}
