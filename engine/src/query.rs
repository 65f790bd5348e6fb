use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::context::PathValidator;
use crate::error::QueryError;
use crate::evaluator::CompiledFilter;
use crate::evaluator::FilterEvaluator;

/// For large arrays, cap index hints to avoid huge allocations in the UI.
const MAX_ARRAY_HINTS: usize = 256;

/// Session-scoped query service: owns the parsed document and the two
/// caches in front of the external evaluator.
///
/// Compiled programs are cached by exact filter text because parsing and
/// compiling, not evaluation, is the expensive step when the same text
/// recurs (navigating back through history). Parse failures are never
/// cached. Key snapshots are cached per normalized path and handed out as
/// defensive copies.
pub struct QueryService {
    document: Arc<Value>,
    evaluator: Arc<dyn FilterEvaluator>,
    programs: RwLock<HashMap<String, Arc<dyn CompiledFilter>>>,
    keys: RwLock<HashMap<String, Arc<Vec<String>>>>,
}

impl QueryService {
    pub fn new(document: Value, evaluator: Arc<dyn FilterEvaluator>) -> Self {
        Self {
            document: Arc::new(document),
            evaluator,
            programs: RwLock::new(HashMap::new()),
            keys: RwLock::new(HashMap::new()),
        }
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Run `filter` against the document, consuming the evaluator's lazy
    /// output. Each produced value is pretty-printed and line-joined in
    /// emission order. An error element or a signalled cancellation token
    /// aborts immediately: partial output is discarded and the error is
    /// reported instead.
    pub fn execute(&self, filter: &str, cancel: &CancellationToken) -> Result<String, QueryError> {
        let program = self.compiled(filter)?;
        let mut rendered: Vec<String> = Vec::new();
        for item in program.evaluate(&self.document, cancel) {
            let value = item?;
            let pretty = serde_json::to_string_pretty(&value)
                .map_err(|err| QueryError::Eval(err.to_string()))?;
            rendered.push(pretty);
        }
        Ok(rendered.join("\n"))
    }

    /// Ordered key names (or array index hints) available at `path`.
    ///
    /// Simple paths are resolved by walking the document directly; anything
    /// the restricted grammar cannot express falls back to full evaluation
    /// of the first produced value. Both routes populate the cache
    /// identically.
    pub fn keys_at(&self, path: &str) -> Result<Vec<String>, QueryError> {
        let path = if path.is_empty() { "." } else { path };

        if let Some(keys) = self.keys.read().get(path) {
            return Ok(keys.as_ref().clone());
        }

        if let Some(keys) = keys_at_simple_path(&self.document, path) {
            return Ok(self.store_keys(path, keys));
        }

        tracing::debug!(path, "keys_at falling back to full evaluation");
        let program = self.compiled(path)?;
        let cancel = CancellationToken::new();
        let keys = match program.evaluate(&self.document, &cancel).next() {
            None => Vec::new(),
            Some(Err(err)) => return Err(err),
            Some(Ok(value)) => extract_keys(&value),
        };
        Ok(self.store_keys(path, keys))
    }

    /// True when `path` parses as a filter on its own. Empty text counts as
    /// valid. Successful probes land in the program cache; failures are not
    /// recorded.
    pub fn is_valid_path(&self, path: &str) -> bool {
        if path.is_empty() || path == "." {
            return true;
        }
        if self.programs.read().contains_key(path) {
            return true;
        }
        self.compiled(path).is_ok()
    }

    fn compiled(&self, filter: &str) -> Result<Arc<dyn CompiledFilter>, QueryError> {
        if let Some(program) = self.programs.read().get(filter) {
            return Ok(program.clone());
        }

        // Compile outside the lock; racing compiles are reconciled below.
        let program = self.evaluator.compile(filter)?;

        let mut programs = self.programs.write();
        if let Some(existing) = programs.get(filter) {
            // Another writer won the race; its program is the cached one and
            // ours is discarded.
            return Ok(existing.clone());
        }
        programs.insert(filter.to_string(), program.clone());
        Ok(program)
    }

    fn store_keys(&self, path: &str, keys: Vec<String>) -> Vec<String> {
        let mut cache = self.keys.write();
        let entry = cache
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(keys));
        entry.as_ref().clone()
    }
}

impl PathValidator for QueryService {
    fn is_valid_path(&self, path: &str) -> bool {
        QueryService::is_valid_path(self, path)
    }
}

fn extract_keys(value: &Value) -> Vec<String> {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<String> = map.keys().cloned().collect();
            keys.sort();
            keys
        }
        Value::Array(items) => (0..items.len().min(MAX_ARRAY_HINTS))
            .map(|i| format!("[{i}]"))
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, PartialEq, Eq)]
enum PathToken {
    Key(String),
    Index(usize),
    Iterate,
}

/// Direct structural walk for paths in the restricted grammar. Returns
/// `None` when the path is not expressible (pipes, functions, anything
/// beyond `.key`, `[n]`, `[]`); a shape mismatch along the walk yields
/// an empty key list rather than falling through to a different path.
fn keys_at_simple_path(document: &Value, path: &str) -> Option<Vec<String>> {
    let tokens = parse_simple_path(path)?;

    let mut current = document;
    for token in &tokens {
        match token {
            PathToken::Key(key) => match current {
                Value::Object(map) => current = map.get(key.as_str()).unwrap_or(&Value::Null),
                _ => return Some(Vec::new()),
            },
            PathToken::Index(idx) => match current {
                Value::Array(items) if *idx < items.len() => current = &items[*idx],
                _ => return Some(Vec::new()),
            },
            PathToken::Iterate => match current {
                Value::Array(items) if !items.is_empty() => current = &items[0],
                _ => return Some(Vec::new()),
            },
        }
    }

    Some(extract_keys(current))
}

fn parse_simple_path(path: &str) -> Option<Vec<PathToken>> {
    if path.is_empty() || path == "." {
        return Some(Vec::new());
    }
    let bytes = path.as_bytes();
    if bytes[0] != b'.' {
        return None;
    }

    let mut tokens = Vec::new();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => i += 1,
            b'[' => {
                i += 1;
                if i >= bytes.len() {
                    return None;
                }
                if bytes[i] == b']' {
                    tokens.push(PathToken::Iterate);
                    i += 1;
                    continue;
                }
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if start == i || i >= bytes.len() || bytes[i] != b']' {
                    return None;
                }
                let index: usize = path[start..i].parse().ok()?;
                tokens.push(PathToken::Index(index));
                i += 1;
            }
            _ => {
                let start = i;
                while i < bytes.len() && is_simple_identifier_byte(bytes[i]) {
                    i += 1;
                }
                if start == i {
                    return None;
                }
                tokens.push(PathToken::Key(path[start..i].to_string()));
            }
        }
    }
    Some(tokens)
}

fn is_simple_identifier_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}
