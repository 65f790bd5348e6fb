use std::sync::Arc;

use anyhow::Result;
use crossterm::event::Event;
use crossterm::event::EventStream;
use crossterm::event::KeyCode;
use crossterm::event::KeyEvent;
use crossterm::event::KeyEventKind;
use crossterm::event::KeyModifiers;
use jex_engine::AutocompleteContext;
use jex_engine::EngineConfig;
use jex_engine::EngineEvent;
use jex_engine::FilterEvaluator;
use jex_engine::FilterHistory;
use jex_engine::LineColorCache;
use jex_engine::QueryError;
use jex_engine::QueryOrchestrator;
use jex_engine::QueryService;
use jex_engine::Suggester;
use jex_engine::display_width;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::unbounded_channel;
use tokio_stream::StreamExt;

use crate::input::FilterInput;
use crate::terminal::Tui;
use crate::view;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    Normal,
    Autocomplete,
    History,
    Help,
}

pub struct AppConfig {
    pub filename: String,
    pub engine: EngineConfig,
}

/// What the session leaves behind once the terminal is restored.
pub struct AppExit {
    /// Committed output to print to stdout, if the user accepted a result.
    pub output: Option<String>,
    pub telemetry_summary: Option<String>,
}

enum ExitRequest {
    /// Quit and print the accepted result.
    Commit,
    /// Quit without printing anything.
    Discard,
}

pub(crate) struct App {
    orchestrator: QueryOrchestrator,
    suggester: Suggester,
    history: FilterHistory,

    pub(crate) input: FilterInput,
    pub(crate) ctx: AutocompleteContext,

    // Last accepted result.
    pub(crate) raw_output: String,
    pub(crate) lines: Vec<String>,
    pub(crate) error: Option<QueryError>,

    // Output pane geometry.
    pub(crate) color_cache: LineColorCache,
    pub(crate) max_line_width: usize,
    pub(crate) x_offset: usize,
    pub(crate) y_offset: usize,
    pub(crate) width: usize,
    pub(crate) height: usize,

    // Suggestion panel state.
    pub(crate) suggestions: Vec<String>,
    pub(crate) selected_idx: usize,
    pub(crate) available_keys: Vec<String>,
    keys_path: String,
    keys_in_flight: String,

    // History overlay state.
    pub(crate) history_items: Vec<String>,
    pub(crate) history_idx: usize,

    pub(crate) mode: Mode,
    pub(crate) filename: String,
}

impl App {
    /// Build the app plus the receiving half of the engine channel; the
    /// caller owns the receiver so the run loop can select on it without
    /// borrowing the app.
    pub(crate) fn new(
        document: Value,
        evaluator: Arc<dyn FilterEvaluator>,
        config: AppConfig,
    ) -> (Self, UnboundedReceiver<EngineEvent>) {
        let query = Arc::new(QueryService::new(document, evaluator));
        let (tx, engine_rx) = unbounded_channel();
        let orchestrator = QueryOrchestrator::new(
            query.clone(),
            tx,
            config.engine.debounce,
            config.engine.telemetry,
        );
        let suggester = Suggester::new(query);

        let input = FilterInput::new(".");
        let ctx = suggester.parse_context(&input.text());

        let app = Self {
            orchestrator,
            suggester,
            history: FilterHistory::new(),
            input,
            keys_in_flight: ctx.path.clone(),
            ctx,
            raw_output: String::new(),
            lines: vec![String::new()],
            error: None,
            color_cache: LineColorCache::new(config.engine.render_cache_capacity),
            max_line_width: 0,
            x_offset: 0,
            y_offset: 0,
            width: 0,
            height: 0,
            suggestions: Vec::new(),
            selected_idx: 0,
            available_keys: Vec::new(),
            keys_path: String::new(),
            history_items: Vec::new(),
            history_idx: 0,
            mode: Mode::Normal,
            filename: config.filename,
        };
        (app, engine_rx)
    }

    pub(crate) async fn run(
        mut self,
        tui: &mut Tui,
        mut engine_rx: UnboundedReceiver<EngineEvent>,
    ) -> Result<AppExit> {
        let mut events = EventStream::new();

        // Initial render of the identity filter and root keys.
        self.orchestrator.execute_now(&self.input.text());
        self.orchestrator.fetch_keys(self.current_path());

        let exit = loop {
            tui.draw(|frame| view::draw(frame, &mut self))?;

            tokio::select! {
                Some(event) = engine_rx.recv() => {
                    self.handle_engine_event(event);
                }
                maybe_event = events.next() => {
                    match maybe_event {
                        Some(Ok(event)) => {
                            if let Some(exit) = self.handle_terminal_event(event) {
                                break exit;
                            }
                        }
                        Some(Err(err)) => {
                            tracing::error!("terminal event stream error: {err}");
                            break ExitRequest::Discard;
                        }
                        None => break ExitRequest::Discard,
                    }
                }
            }
        };

        self.orchestrator.cancel_inflight();

        let output = match exit {
            ExitRequest::Commit if self.error.is_none() && !self.raw_output.is_empty() => {
                Some(std::mem::take(&mut self.raw_output))
            }
            _ => None,
        };
        Ok(AppExit {
            output,
            telemetry_summary: self.orchestrator.telemetry().summary(),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.orchestrator.is_running()
    }

    fn handle_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::DebounceElapsed { seq } => {
                self.orchestrator.on_debounce_elapsed(seq);
            }
            EngineEvent::QueryResult { seq, result } => {
                let Some(outcome) = self.orchestrator.on_result(seq, result) else {
                    return;
                };
                match outcome {
                    Ok(raw) => {
                        self.lines = raw.split('\n').map(str::to_string).collect();
                        self.raw_output = raw;
                        self.error = None;
                    }
                    Err(err) => {
                        self.raw_output.clear();
                        self.lines = err.to_string().split('\n').map(str::to_string).collect();
                        self.error = Some(err);
                    }
                }
                self.max_line_width = max_display_line_width(&self.lines);
                self.clamp_offsets();
            }
            EngineEvent::Keys { path, result } => {
                if self.keys_in_flight == path {
                    self.keys_in_flight.clear();
                }
                if path != self.current_path() {
                    return;
                }
                self.keys_path = path;
                self.available_keys = result.unwrap_or_default();
            }
        }
    }

    fn handle_terminal_event(&mut self, event: Event) -> Option<ExitRequest> {
        match event {
            Event::Key(key) if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) => {
                self.handle_key(key)
            }
            Event::Resize(width, height) => {
                self.width = width as usize;
                self.height = height as usize;
                self.clamp_offsets();
                None
            }
            _ => None,
        }
    }

    fn handle_key(&mut self, key: KeyEvent) -> Option<ExitRequest> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        // Global keys, before mode dispatch.
        match key.code {
            KeyCode::Char('c') if ctrl => return Some(ExitRequest::Discard),
            KeyCode::Char('?') => {
                self.mode = if self.mode == Mode::Help {
                    Mode::Normal
                } else {
                    Mode::Help
                };
                return None;
            }
            KeyCode::Esc => {
                if self.mode != Mode::Normal {
                    self.mode = Mode::Normal;
                    self.suggestions.clear();
                    return None;
                }
                return Some(ExitRequest::Discard);
            }
            KeyCode::Char('h') if ctrl => {
                self.mode = Mode::History;
                self.history_items = self.history.entries().to_vec();
                self.history_idx = 0;
                return None;
            }
            _ => {}
        }

        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Autocomplete => self.handle_autocomplete_key(key),
            Mode::History => self.handle_history_key(key),
            Mode::Help => self.handle_help_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Option<ExitRequest> {
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        let alt = key.modifiers.contains(KeyModifiers::ALT);
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        match key.code {
            KeyCode::Enter => {
                if self.error.is_none() && !self.raw_output.is_empty() {
                    self.history.add(&self.input.text());
                    return Some(ExitRequest::Commit);
                }
                Some(ExitRequest::Discard)
            }

            KeyCode::Tab => {
                self.enter_autocomplete();
                None
            }

            KeyCode::Up => {
                self.scroll_lines(if shift { -8 } else { -1 });
                None
            }
            KeyCode::Down => {
                self.scroll_lines(if shift { 8 } else { 1 });
                None
            }
            KeyCode::PageUp => {
                self.scroll_lines(-(self.content_height() as isize / 2));
                None
            }
            KeyCode::PageDown => {
                self.scroll_lines(self.content_height() as isize / 2);
                None
            }

            KeyCode::Left if shift => {
                self.scroll_horizontal(-8);
                None
            }
            KeyCode::Right if shift => {
                self.scroll_horizontal(8);
                None
            }
            KeyCode::Home => {
                self.x_offset = 0;
                None
            }
            KeyCode::End => {
                self.x_offset = self.max_horizontal_offset();
                None
            }

            KeyCode::Left if ctrl || alt => {
                self.input.move_prev_word();
                None
            }
            KeyCode::Right if ctrl || alt => {
                self.input.move_next_word();
                None
            }
            KeyCode::Char('b') if alt => {
                self.input.move_prev_word();
                None
            }
            KeyCode::Char('f') if alt => {
                self.input.move_next_word();
                None
            }
            KeyCode::Left => {
                self.input.move_left();
                None
            }
            KeyCode::Right => {
                self.input.move_right();
                None
            }
            KeyCode::Char('a') if ctrl => {
                self.input.move_home();
                None
            }
            KeyCode::Char('e') if ctrl => {
                self.input.move_end();
                None
            }

            KeyCode::Char('w') if ctrl => {
                if self.input.delete_prev_word() {
                    self.after_edit();
                }
                None
            }
            KeyCode::Backspace if alt || ctrl => {
                if self.input.delete_prev_word() {
                    self.after_edit();
                }
                None
            }
            KeyCode::Char('d') if alt => {
                if self.input.delete_next_word() {
                    self.after_edit();
                }
                None
            }
            KeyCode::Delete if alt || ctrl => {
                if self.input.delete_next_word() {
                    self.after_edit();
                }
                None
            }

            KeyCode::Backspace => {
                if self.input.backspace() {
                    self.after_edit();
                }
                None
            }
            KeyCode::Delete => {
                if self.input.delete() {
                    self.after_edit();
                }
                None
            }
            KeyCode::Char(c) if !ctrl && !alt => {
                self.input.insert(c);
                self.after_edit();
                None
            }
            _ => None,
        }
    }

    fn handle_autocomplete_key(&mut self, key: KeyEvent) -> Option<ExitRequest> {
        match key.code {
            KeyCode::Tab | KeyCode::Down => {
                if !self.suggestions.is_empty() {
                    self.selected_idx = (self.selected_idx + 1) % self.suggestions.len();
                }
                None
            }
            KeyCode::Up | KeyCode::BackTab => {
                if !self.suggestions.is_empty() {
                    self.selected_idx = self
                        .selected_idx
                        .checked_sub(1)
                        .unwrap_or(self.suggestions.len() - 1);
                }
                None
            }
            KeyCode::Enter => {
                if let Some(selected) = self.suggestions.get(self.selected_idx) {
                    let applied = self
                        .suggester
                        .apply(&self.input.text(), &self.ctx, selected);
                    self.input.set_text(&applied);
                }
                self.mode = Mode::Normal;
                self.suggestions.clear();
                self.ctx = self.suggester.parse_context(&self.input.text());
                self.orchestrator.execute_now(&self.input.text());
                self.maybe_fetch_keys();
                None
            }
            // Any other key leaves autocomplete and is handled normally.
            _ => {
                self.mode = Mode::Normal;
                self.suggestions.clear();
                self.handle_normal_key(key)
            }
        }
    }

    fn handle_history_key(&mut self, key: KeyEvent) -> Option<ExitRequest> {
        match key.code {
            KeyCode::Down | KeyCode::Tab => {
                if !self.history_items.is_empty() {
                    self.history_idx = (self.history_idx + 1) % self.history_items.len();
                }
                None
            }
            KeyCode::Up | KeyCode::BackTab => {
                if !self.history_items.is_empty() {
                    self.history_idx = self
                        .history_idx
                        .checked_sub(1)
                        .unwrap_or(self.history_items.len() - 1);
                }
                None
            }
            KeyCode::Enter => {
                if let Some(item) = self.history_items.get(self.history_idx) {
                    self.input.set_text(item);
                }
                self.mode = Mode::Normal;
                self.ctx = self.suggester.parse_context(&self.input.text());
                self.orchestrator.execute_now(&self.input.text());
                self.maybe_fetch_keys();
                None
            }
            _ => {
                self.mode = Mode::Normal;
                None
            }
        }
    }

    fn handle_help_key(&mut self, key: KeyEvent) -> Option<ExitRequest> {
        match key.code {
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.mode = Mode::Normal;
                None
            }
            _ => None,
        }
    }

    fn enter_autocomplete(&mut self) {
        self.mode = Mode::Autocomplete;
        let mut filter = self.input.text();

        // A filter ending on an index drills into the element's keys.
        if filter.ends_with(']') {
            filter.push('.');
            self.input.set_text(&filter);
        }

        let (suggestions, ctx) = self.suggester.suggest(&filter);
        self.suggestions = suggestions;
        self.ctx = ctx;
        self.selected_idx = 0;

        // A single suggestion equal to what is already typed means the key
        // is complete; drill one level deeper instead of offering it again.
        if self.suggestions.len() == 1
            && self.suggestions[0] == self.ctx.incomplete
            && !self.ctx.incomplete.is_empty()
        {
            let new_filter = format!(
                "{}{}.",
                &filter[..self.ctx.start_pos.min(filter.len())],
                self.suggestions[0]
            );
            self.input.set_text(&new_filter);
            let (suggestions, ctx) = self.suggester.suggest(&new_filter);
            self.suggestions = suggestions;
            self.ctx = ctx;
            self.selected_idx = 0;
        }
    }

    /// After any text change: reparse the context, debounce an execution,
    /// and refresh the key panel if the path moved.
    fn after_edit(&mut self) {
        let filter = self.input.text();
        self.ctx = self.suggester.parse_context(&filter);
        self.orchestrator.queue(&filter);
        self.maybe_fetch_keys();
    }

    fn current_path(&self) -> String {
        if self.ctx.path.is_empty() {
            ".".to_string()
        } else {
            self.ctx.path.clone()
        }
    }

    fn maybe_fetch_keys(&mut self) {
        let path = self.current_path();
        if path == self.keys_path || path == self.keys_in_flight {
            return;
        }
        self.available_keys.clear();
        self.keys_in_flight = path.clone();
        self.orchestrator.fetch_keys(path);
    }

    fn scroll_lines(&mut self, delta: isize) {
        let max = self.lines.len().saturating_sub(self.content_height());
        self.y_offset = self.y_offset.saturating_add_signed(delta).min(max);
    }

    fn scroll_horizontal(&mut self, delta: isize) {
        self.x_offset = self
            .x_offset
            .saturating_add_signed(delta)
            .min(self.max_horizontal_offset());
    }

    fn clamp_offsets(&mut self) {
        self.x_offset = self.x_offset.min(self.max_horizontal_offset());
        self.y_offset = self
            .y_offset
            .min(self.lines.len().saturating_sub(self.content_height()));
    }

    // Header, footer, and borders claim eight rows.
    pub(crate) fn content_height(&self) -> usize {
        self.height.saturating_sub(8)
    }

    pub(crate) fn suggest_width(&self) -> usize {
        if self.width == 0 {
            return 24;
        }
        (self.width / 4).clamp(24, 32)
    }

    /// The right pane is dropped entirely when it would compress the output
    /// pane below a usable width.
    pub(crate) fn show_suggestion_pane(&self) -> bool {
        self.width >= 40 + self.suggest_width() + 5
    }

    pub(crate) fn output_content_width(&self) -> usize {
        let mut width = self.width.saturating_sub(5);
        if self.show_suggestion_pane() {
            width = width.saturating_sub(self.suggest_width());
        }
        width.max(10)
    }

    fn max_horizontal_offset(&self) -> usize {
        self.max_line_width.saturating_sub(self.output_content_width())
    }
}

fn max_display_line_width(lines: &[String]) -> usize {
    lines.iter().map(|l| display_width(l)).max().unwrap_or(0)
}
