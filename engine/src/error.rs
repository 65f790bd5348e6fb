use thiserror::Error;

/// Errors produced while resolving or executing a filter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The filter text failed to parse. Harmless; retried once the text
    /// changes. Never cached.
    #[error("parse error: {0}")]
    Parse(String),

    /// The evaluator surfaced an error value mid-stream. Aborts the current
    /// execution; previously displayed output stays until a newer accepted
    /// result arrives.
    #[error("error: {0}")]
    Eval(String),

    /// The execution observed its cancellation token. Not user-visible;
    /// discarded silently at the orchestrator boundary.
    #[error("query cancelled")]
    Cancelled,
}

impl QueryError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}
