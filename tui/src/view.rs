use jex_engine::clip_line;
use jex_engine::display_width;
use jex_engine::with_ellipsis;
use ratatui::Frame;
use ratatui::layout::Constraint;
use ratatui::layout::Layout;
use ratatui::layout::Rect;
use ratatui::style::Color;
use ratatui::style::Modifier;
use ratatui::style::Style;
use ratatui::style::Stylize;
use ratatui::text::Line;
use ratatui::text::Span;
use ratatui::widgets::Block;
use ratatui::widgets::Borders;
use ratatui::widgets::Clear;
use ratatui::widgets::Paragraph;

use crate::ansi::ansi_escape_line;
use crate::app::App;
use crate::app::Mode;

pub(crate) fn draw(frame: &mut Frame, app: &mut App) {
    let area = frame.area();
    app.width = area.width as usize;
    app.height = area.height as usize;

    let [header_area, content_area, footer_area] = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(3),
    ])
    .areas(area);

    draw_header(frame, header_area, app);
    if app.mode == Mode::Help {
        draw_help(frame, content_area);
    } else {
        draw_content(frame, content_area, app);
    }
    draw_footer(frame, footer_area, app);

    if app.mode == Mode::History {
        draw_history_overlay(frame, area, app);
    }
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let title = Span::styled(
        "jex",
        Style::default()
            .fg(Color::Magenta)
            .add_modifier(Modifier::BOLD),
    );
    let file = Span::styled(format!("  {}", app.filename), Style::default().dim());
    let help = Span::styled(
        "  tab autocomplete · ctrl+h history · ? help",
        Style::default().dim(),
    );

    let status = if app.is_running() {
        Line::from(Span::styled("Running...", Style::default().dim()))
    } else if let Some(err) = &app.error {
        Line::from(Span::styled(
            format!("Error: {err}"),
            Style::default().fg(Color::Red),
        ))
    } else {
        Line::default()
    };

    let text = vec![Line::from(vec![title, file, help]), status];
    frame.render_widget(Paragraph::new(text), area);
}

fn draw_content(frame: &mut Frame, area: Rect, app: &mut App) {
    let show_suggest = app.show_suggestion_pane();
    let (output_area, suggest_area) = if show_suggest {
        let [output_area, _, suggest_area] = Layout::horizontal([
            Constraint::Min(10),
            Constraint::Length(1),
            Constraint::Length(app.suggest_width() as u16),
        ])
        .areas(area);
        (output_area, Some(suggest_area))
    } else {
        (area, None)
    };

    draw_output(frame, output_area, app);
    if let Some(suggest_area) = suggest_area {
        draw_suggestions(frame, suggest_area, app);
    }
}

fn draw_output(frame: &mut Frame, area: Rect, app: &mut App) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let output_width = inner.width as usize;
    let is_error = app.error.is_some();

    let start = app.y_offset.min(app.lines.len());
    let end = (start + inner.height as usize).min(app.lines.len());

    let mut rendered: Vec<Line> = Vec::with_capacity(end - start);
    for idx in start..end {
        let clipped = clip_line(&app.lines[idx], app.x_offset, output_width);
        let visible = with_ellipsis(
            &clipped.text,
            output_width,
            clipped.left_cut,
            clipped.right_cut,
        );
        if is_error {
            rendered.push(Line::from(Span::styled(
                visible,
                Style::default().fg(Color::Red),
            )));
        } else {
            let colored = app.color_cache.colorize(&visible);
            rendered.push(ansi_escape_line(&colored));
        }
    }

    frame.render_widget(Paragraph::new(rendered), inner);
}

fn draw_suggestions(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let mut lines: Vec<Line> = Vec::new();
    if app.mode == Mode::Autocomplete && !app.suggestions.is_empty() {
        lines.push(Line::from(Span::styled("Keys:", Style::default().bold())));
        for (i, suggestion) in app.suggestions.iter().enumerate() {
            if i == app.selected_idx {
                lines.push(Line::from(Span::styled(
                    format!("\u{2192} {suggestion}"),
                    Style::default().fg(Color::Magenta),
                )));
            } else {
                lines.push(Line::from(format!("  {suggestion}")));
            }
        }
    } else if !app.available_keys.is_empty() {
        lines.push(Line::from(Span::styled(
            "Available:",
            Style::default().bold(),
        )));
        for key in &app.available_keys {
            lines.push(Line::from(Span::styled(
                format!("  {key}"),
                Style::default().dim(),
            )));
        }
    }

    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_footer(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title("filter");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let text = app.input.text();
    let prefix_cells = 2 + display_width(&text.chars().take(app.input.cursor()).collect::<String>());

    let mut spans = vec![Span::styled("> ", Style::default().fg(Color::Magenta))];
    spans.push(Span::raw(text));
    if app.x_offset > 0 {
        spans.push(Span::styled(
            format!("   [x: {}]", app.x_offset),
            Style::default().dim(),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), inner);

    // Place the terminal cursor at the edit position.
    let cursor_x = inner.x + (prefix_cells as u16).min(inner.width.saturating_sub(1));
    frame.set_cursor_position((cursor_x, inner.y));
}

fn draw_help(frame: &mut Frame, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("help");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let lines = vec![
        Line::from("enter        print result and exit"),
        Line::from("esc          exit without printing"),
        Line::from("tab          autocomplete keys at the current path"),
        Line::from("ctrl+h       filter history"),
        Line::from("up/down      scroll output (shift: faster)"),
        Line::from("shift+←/→    scroll output horizontally"),
        Line::from("home/end     jump to line start/end"),
        Line::from("alt+b/f      move by word"),
        Line::from("ctrl+w       delete previous word"),
        Line::from("?            toggle this help"),
    ];
    frame.render_widget(Paragraph::new(lines), inner);
}

fn draw_history_overlay(frame: &mut Frame, area: Rect, app: &App) {
    let width = area.width.saturating_sub(8).clamp(20, 60).min(area.width);
    let max_height = area.height.saturating_sub(4).max(3);
    let height = (app.history_items.len() as u16 + 2).clamp(3, max_height);
    let overlay = Rect {
        x: area.width.saturating_sub(width) / 2,
        y: area.height.saturating_sub(height) / 2,
        width,
        height,
    };

    frame.render_widget(Clear, overlay);
    let block = Block::default().borders(Borders::ALL).title("history");
    let inner = block.inner(overlay);
    frame.render_widget(block, overlay);

    let mut lines: Vec<Line> = Vec::new();
    if app.history_items.is_empty() {
        lines.push(Line::from(Span::styled(
            "no filters submitted yet",
            Style::default().dim(),
        )));
    }
    for (i, item) in app.history_items.iter().enumerate() {
        if i == app.history_idx {
            lines.push(Line::from(Span::styled(
                format!("\u{2192} {item}"),
                Style::default().fg(Color::Magenta),
            )));
        } else {
            lines.push(Line::from(format!("  {item}")));
        }
    }
    frame.render_widget(Paragraph::new(lines), inner);
}
