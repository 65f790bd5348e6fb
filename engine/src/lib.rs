//! Live-query engine for interactive JSON exploration.
//!
//! The engine owns everything between a keystroke and a displayable result:
//! autocomplete context parsing, compiled-program and key caching, debounced
//! dispatch with cancel-and-replace sequencing, width-aware line windowing
//! with a bounded render cache, and optional latency telemetry. Rendering to
//! a terminal and the filter language itself live outside; evaluators plug
//! in through [`FilterEvaluator`].

pub mod colorize;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod history;
pub mod line_cache;
pub mod orchestrator;
pub mod query;
pub mod structural;
pub mod suggest;
pub mod telemetry;
pub mod window;

pub use config::EngineConfig;
pub use context::AutocompleteContext;
pub use context::PathValidator;
pub use error::QueryError;
pub use evaluator::CompiledFilter;
pub use evaluator::FilterEvaluator;
pub use history::FilterHistory;
pub use line_cache::LineColorCache;
pub use orchestrator::EngineEvent;
pub use orchestrator::QueryOrchestrator;
pub use query::QueryService;
pub use structural::PathEvaluator;
pub use suggest::Suggester;
pub use telemetry::LatencyTelemetry;
pub use window::ClippedLine;
pub use window::clip_line;
pub use window::display_width;
pub use window::with_ellipsis;
