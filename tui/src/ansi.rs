use ansi_to_tui::IntoText;
use ratatui::text::Line;

/// Convert one line of ANSI-styled text into a ratatui [`Line`]. Falls back
/// to the unstyled text if the escape sequences fail to parse.
pub(crate) fn ansi_escape_line(s: &str) -> Line<'static> {
    match s.into_text() {
        Ok(text) => text.lines.into_iter().next().unwrap_or_default(),
        Err(err) => {
            tracing::error!("failed to parse ansi escapes: {err}");
            Line::from(s.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Color;

    #[test]
    fn styled_span_carries_its_color() {
        let line = ansi_escape_line("\x1b[36mname\x1b[0m");
        assert_eq!(line.spans.len(), 1);
        assert_eq!(line.spans[0].content, "name");
        assert_eq!(line.spans[0].style.fg, Some(Color::Cyan));
    }

    #[test]
    fn plain_text_passes_through() {
        let line = ansi_escape_line("plain");
        assert_eq!(line.spans[0].content, "plain");
    }
}
