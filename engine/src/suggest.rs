use std::sync::Arc;

use crate::context::AutocompleteContext;
use crate::query::QueryService;

/// Key-name suggestions for the current filter text, layered on the context
/// parser and the keys cache.
pub struct Suggester {
    query: Arc<QueryService>,
}

impl Suggester {
    pub fn new(query: Arc<QueryService>) -> Self {
        Self { query }
    }

    /// Parse the context for `filter` without resolving any keys. Cheap
    /// enough for every keystroke.
    pub fn parse_context(&self, filter: &str) -> AutocompleteContext {
        AutocompleteContext::parse(filter, self.query.as_ref())
    }

    /// Matching key names for the current incomplete token: case-insensitive
    /// prefix match, lexicographically sorted.
    pub fn suggest(&self, filter: &str) -> (Vec<String>, AutocompleteContext) {
        let ctx = self.parse_context(filter);

        // When the filter contains a pipe, keys come from the left side's
        // output rather than the document root.
        let mut keys = None;
        if let Some(pipe_idx) = filter.rfind('|') {
            let left = filter[..pipe_idx].trim();
            if !left.is_empty() {
                keys = self.resolve_keys_after_pipe(left, &ctx.path);
            }
        }

        let keys = match keys {
            Some(keys) => keys,
            None => match self.query.keys_at(&ctx.path) {
                Ok(keys) => keys,
                Err(_) => return (Vec::new(), ctx),
            },
        };

        let mut matches = filter_keys_by_prefix(&keys, &ctx.incomplete);
        matches.sort();
        (matches, ctx)
    }

    /// Splice `selected` into `filter` at the context's insertion offset.
    pub fn apply(&self, filter: &str, ctx: &AutocompleteContext, selected: &str) -> String {
        let cut = ctx.start_pos.min(filter.len());
        format!("{}{selected}", &filter[..cut])
    }

    fn resolve_keys_after_pipe(&self, left: &str, right_path: &str) -> Option<Vec<String>> {
        let eval_path = if right_path.is_empty() || right_path == "." {
            left.to_string()
        } else {
            format!("{left} | {right_path}")
        };

        // For array iterators like `.users[]`, probe the first element so
        // the fallback does not have to stream the whole iteration.
        if let Some(base) = left.strip_suffix("[]") {
            let probe = if right_path.is_empty() || right_path == "." {
                format!("{base}[0]")
            } else {
                format!("{base}[0] | {right_path}")
            };
            if let Ok(keys) = self.query.keys_at(&probe)
                && !keys.is_empty()
            {
                return Some(keys);
            }
        }

        self.query.keys_at(&eval_path).ok()
    }
}

/// Case-insensitive prefix filter over `keys`.
pub fn filter_keys_by_prefix(keys: &[String], incomplete: &str) -> Vec<String> {
    if incomplete.is_empty() {
        return keys.to_vec();
    }
    let prefix = incomplete.to_lowercase();
    keys.iter()
        .filter(|key| key.to_lowercase().starts_with(&prefix))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::structural::PathEvaluator;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn suggester() -> Suggester {
        let doc = json!({
            "meta": {"Version": 2},
            "users": [{"name": "ada", "Nick": "al"}]
        });
        Suggester::new(Arc::new(QueryService::new(doc, Arc::new(PathEvaluator))))
    }

    #[test]
    fn suggests_root_keys_for_empty_filter() {
        let (keys, ctx) = suggester().suggest("");
        assert_eq!(keys, vec!["meta", "users"]);
        assert_eq!(ctx.path, ".");
    }

    #[test]
    fn prefix_match_is_case_insensitive() {
        let (keys, _) = suggester().suggest(".users[0].n");
        assert_eq!(keys, vec!["Nick", "name"]);
    }

    #[test]
    fn resolves_keys_through_a_pipe() {
        let (keys, ctx) = suggester().suggest(".users[0] | .");
        assert_eq!(keys, vec!["Nick", "name"]);
        assert_eq!(ctx.path, ".");
    }

    #[test]
    fn iterator_pipe_probes_first_element() {
        let (keys, _) = suggester().suggest(".users[] | .");
        assert_eq!(keys, vec!["Nick", "name"]);
    }

    #[test]
    fn apply_splices_at_start_pos() {
        let s = suggester();
        let (keys, ctx) = s.suggest(".users[0].n");
        assert_eq!(s.apply(".users[0].n", &ctx, &keys[1]), ".users[0].name");
    }

    #[test]
    fn unresolvable_path_suggests_nothing() {
        let (keys, _) = suggester().suggest(".users[0].name.");
        assert_eq!(keys, Vec::<String>::new());
    }
}
