//! Terminal front-end for the jex engine: a full-screen explorer with a
//! live filter line, autocomplete, history, and windowed JSON output.

use std::sync::Arc;

use anyhow::Result;
use jex_engine::FilterEvaluator;
use jex_engine::PathEvaluator;
use serde_json::Value;

mod ansi;
mod app;
mod input;
mod terminal;
mod view;

pub use app::AppConfig;
pub use app::AppExit;

use app::App;

/// Run the explorer over `document` until the user exits. The terminal is
/// restored before returning, so callers can print the exit output.
pub async fn run_main(document: Value, config: AppConfig) -> Result<AppExit> {
    let evaluator: Arc<dyn FilterEvaluator> = Arc::new(PathEvaluator);
    let mut tui = terminal::init()?;
    let (app, engine_rx) = App::new(document, evaluator, config);
    let result = app.run(&mut tui, engine_rx).await;
    terminal::restore()?;
    result
}
