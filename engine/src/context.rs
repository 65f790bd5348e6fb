/// Answers "does this text parse as a filter on its own?" during context
/// splitting. Implemented by [`crate::query::QueryService`] on top of the
/// program cache.
pub trait PathValidator {
    fn is_valid_path(&self, path: &str) -> bool;
}

impl<T: PathValidator + ?Sized> PathValidator for &T {
    fn is_valid_path(&self, path: &str) -> bool {
        (**self).is_valid_path(path)
    }
}

/// The parsed autocomplete context for the current filter text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutocompleteContext {
    /// Valid filter prefix to resolve keys against ("." if none).
    pub path: String,
    /// Partial key being typed.
    pub incomplete: String,
    /// Byte offset in the filter where a selected suggestion is spliced in.
    pub start_pos: usize,
}

impl AutocompleteContext {
    fn root() -> Self {
        Self {
            path: ".".to_string(),
            incomplete: String::new(),
            start_pos: 0,
        }
    }

    /// Extract the autocomplete context from `filter`.
    ///
    /// Invoked on every keystroke, independently of query execution. The
    /// working segment is everything right of the rightmost `|`; the scan
    /// deliberately ignores bracket nesting around the pipe itself, so a
    /// pipe inside a bracketed sub-expression still resets context. This
    /// mirrors long-standing behavior and is relied upon by callers.
    pub fn parse(filter: &str, validator: impl PathValidator) -> Self {
        if filter.is_empty() {
            return Self::root();
        }

        // Only the pipe branch trims; without a pipe, trailing whitespace
        // stays inside `incomplete`. The offset counts every trimmed byte.
        let (working, offset) = match filter.rfind('|') {
            Some(pipe_idx) => {
                let right = &filter[pipe_idx + 1..];
                let trimmed = right.trim();
                (trimmed, pipe_idx + 1 + (right.len() - trimmed.len()))
            }
            None => (filter, 0),
        };

        let Some(last_dot) = find_last_key_dot(working, &validator) else {
            if working.is_empty() || working == "." {
                return Self {
                    path: ".".to_string(),
                    incomplete: String::new(),
                    start_pos: offset + working.len(),
                };
            }
            let incomplete = working.strip_prefix('.').unwrap_or(working);
            return Self {
                path: ".".to_string(),
                incomplete: incomplete.to_string(),
                start_pos: offset + (working.len() - incomplete.len()),
            };
        };

        let path = &working[..last_dot];
        let incomplete = &working[last_dot + 1..];

        let path = if path.is_empty() { "." } else { path };
        if !validator.is_valid_path(path) {
            // Path invalid; surface the whole segment as the incomplete
            // token rooted at ".".
            return Self {
                path: ".".to_string(),
                incomplete: working.to_string(),
                start_pos: offset,
            };
        }

        Self {
            path: path.to_string(),
            incomplete: incomplete.to_string(),
            start_pos: offset + last_dot + 1,
        }
    }
}

/// Rightmost depth-zero `.` whose left side is itself a valid filter prefix
/// (empty counts as valid). Depth is tracked right to left, so `]`
/// increments and `[` decrements. Falls back to the last depth-zero dot
/// seen when no prefix validates.
fn find_last_key_dot(s: &str, validator: &impl PathValidator) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut bracket_depth: i32 = 0;
    let mut last_dot: Option<usize> = None;

    for i in (0..bytes.len()).rev() {
        match bytes[i] {
            b']' => bracket_depth += 1,
            b'[' => bracket_depth -= 1,
            b'.' if bracket_depth == 0 => {
                last_dot = Some(i);
                let path = &s[..i];
                if path.is_empty() || validator.is_valid_path(path) {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    last_dot
}
