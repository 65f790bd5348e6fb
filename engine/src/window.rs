use unicode_width::UnicodeWidthChar;

/// Result of horizontally clipping one raw output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClippedLine {
    pub text: String,
    /// Content was cut off to the left of the visible window.
    pub left_cut: bool,
    /// Content continues past the right edge of the visible window.
    pub right_cut: bool,
}

/// Display-cell width of a single code point. Every code point counts at
/// least one cell, including zero-width combining marks; terminals are
/// inconsistent enough about those that under-counting breaks alignment
/// worse than over-counting.
pub fn cell_width(c: char) -> usize {
    c.width().unwrap_or(0).max(1)
}

/// Display-cell width of a string under [`cell_width`].
pub fn display_width(s: &str) -> usize {
    s.chars().map(cell_width).sum()
}

/// Extract the substring of `line` visible in a window of `max_width` cells
/// starting `x_offset` cells in. Offsets past the end clamp to the end. A
/// wide character straddling the left edge is kept whole.
pub fn clip_line(line: &str, x_offset: usize, max_width: usize) -> ClippedLine {
    if max_width == 0 {
        return ClippedLine {
            text: String::new(),
            left_cut: x_offset > 0,
            right_cut: !line.is_empty(),
        };
    }
    if line.is_empty() {
        return ClippedLine {
            text: String::new(),
            left_cut: x_offset > 0,
            right_cut: false,
        };
    }

    let total_width = display_width(line);
    let x_offset_clamped = x_offset.min(total_width);

    let mut start = line.len();
    let mut width_so_far = 0;
    for (idx, c) in line.char_indices() {
        let w = cell_width(c);
        if width_so_far + w > x_offset_clamped {
            start = idx;
            break;
        }
        width_so_far += w;
    }

    let mut end = start;
    let mut visible_width = 0;
    for (idx, c) in line[start..].char_indices() {
        let w = cell_width(c);
        if visible_width + w > max_width {
            break;
        }
        visible_width += w;
        end = start + idx + c.len_utf8();
    }

    ClippedLine {
        text: line[start..end].to_string(),
        left_cut: x_offset > 0,
        right_cut: x_offset_clamped + visible_width < total_width,
    }
}

/// Re-trim a clipped line so that ellipsis markers fit and the total
/// displayed width is exactly `max_width` cells on the truncated sides.
pub fn with_ellipsis(line: &str, max_width: usize, left_cut: bool, right_cut: bool) -> String {
    if max_width == 0 {
        return String::new();
    }
    if !left_cut && !right_cut {
        return line.to_string();
    }

    let trimmed = trim_to_display_width(line, max_width);

    if left_cut && right_cut && max_width >= 2 {
        let inner = trim_to_display_width(trimmed, max_width - 2);
        return format!("\u{2026}{inner}\u{2026}");
    }

    if left_cut {
        if max_width == 1 {
            return "\u{2026}".to_string();
        }
        let inner = trim_to_display_width(trimmed, max_width - 1);
        return format!("\u{2026}{inner}");
    }

    // Right cut only.
    if max_width == 1 {
        return "\u{2026}".to_string();
    }
    let inner = trim_to_display_width(trimmed, max_width - 1);
    format!("{inner}\u{2026}")
}

/// Longest prefix of `s` whose display width does not exceed `max_width`.
fn trim_to_display_width(s: &str, max_width: usize) -> &str {
    if max_width == 0 || s.is_empty() {
        return "";
    }
    let mut width = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let w = cell_width(c);
        if width + w > max_width {
            break;
        }
        width += w;
        end = idx + c.len_utf8();
    }
    &s[..end]
}
