use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;

/// The external filter engine seam.
///
/// The engine core never inspects evaluator internals: it compiles filter
/// text into an opaque [`CompiledFilter`] and consumes the lazy value stream
/// it produces. Implementations must be cheap to share across background
/// tasks.
pub trait FilterEvaluator: Send + Sync + 'static {
    /// Parse and compile filter text into an executable program.
    ///
    /// A malformed filter yields [`QueryError::Parse`]. Compilation must not
    /// depend on the document.
    fn compile(&self, filter: &str) -> Result<Arc<dyn CompiledFilter>, QueryError>;
}

/// An opaque compiled program, evaluated lazily against a document.
pub trait CompiledFilter: Send + Sync {
    /// Evaluate against `doc`, yielding values in emission order.
    ///
    /// Implementations are required to poll `cancel` at entry and between
    /// produced elements; once it is signalled the stream must end promptly
    /// with [`QueryError::Cancelled`]. An error element terminates the
    /// stream with that error.
    fn evaluate<'a>(
        &'a self,
        doc: &'a Value,
        cancel: &'a CancellationToken,
    ) -> Box<dyn Iterator<Item = Result<Value, QueryError>> + 'a>;
}
