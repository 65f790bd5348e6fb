use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::evaluator::CompiledFilter;
use crate::evaluator::FilterEvaluator;

/// Built-in evaluator for the structural subset of the filter grammar:
/// identity, `.key` chains, `[n]` indexing, `[]` iteration, and top-level
/// pipes. The full filter language is an injection point behind
/// [`FilterEvaluator`]; this covers enough for plain-path exploration and
/// for tests to run end to end.
#[derive(Debug, Default)]
pub struct PathEvaluator;

impl FilterEvaluator for PathEvaluator {
    fn compile(&self, filter: &str) -> Result<Arc<dyn CompiledFilter>, QueryError> {
        let program = parse_program(filter)?;
        Ok(Arc::new(program))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathStep {
    Key(String),
    Index(usize),
    Iterate,
}

/// One pipe-separated segment, applied left to right.
type Segment = Vec<PathStep>;

#[derive(Debug)]
struct PathProgram {
    segments: Vec<Segment>,
}

impl CompiledFilter for PathProgram {
    fn evaluate<'a>(
        &'a self,
        doc: &'a Value,
        cancel: &'a CancellationToken,
    ) -> Box<dyn Iterator<Item = Result<Value, QueryError>> + 'a> {
        Box::new(EvalIter {
            segments: &self.segments,
            cancel,
            stack: vec![(0, doc.clone())],
            done: false,
        })
    }
}

/// Depth-first walker over the pipe pipeline. Each stack entry carries the
/// index of the next segment to apply, so emission order matches the order a
/// streaming evaluator would produce.
struct EvalIter<'a> {
    segments: &'a [Segment],
    cancel: &'a CancellationToken,
    stack: Vec<(usize, Value)>,
    done: bool,
}

impl Iterator for EvalIter<'_> {
    type Item = Result<Value, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            if self.cancel.is_cancelled() {
                self.done = true;
                return Some(Err(QueryError::Cancelled));
            }
            let (seg_idx, value) = self.stack.pop()?;
            if seg_idx == self.segments.len() {
                return Some(Ok(value));
            }
            match apply_segment(&self.segments[seg_idx], value) {
                Ok(outputs) => {
                    // Reversed so the first output is popped first.
                    for out in outputs.into_iter().rev() {
                        self.stack.push((seg_idx + 1, out));
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
    }
}

fn apply_segment(segment: &Segment, value: Value) -> Result<Vec<Value>, QueryError> {
    let mut current = vec![value];
    for step in segment {
        let mut next = Vec::with_capacity(current.len());
        for value in current {
            apply_step(step, value, &mut next)?;
        }
        current = next;
    }
    Ok(current)
}

fn apply_step(step: &PathStep, value: Value, out: &mut Vec<Value>) -> Result<(), QueryError> {
    match step {
        PathStep::Key(key) => match value {
            Value::Object(mut map) => {
                out.push(map.remove(key.as_str()).unwrap_or(Value::Null));
                Ok(())
            }
            Value::Null => {
                out.push(Value::Null);
                Ok(())
            }
            other => Err(QueryError::Eval(format!(
                "cannot index {} with \"{key}\"",
                type_name(&other)
            ))),
        },
        PathStep::Index(idx) => match value {
            Value::Array(mut items) => {
                if *idx < items.len() {
                    out.push(items.swap_remove(*idx));
                } else {
                    out.push(Value::Null);
                }
                Ok(())
            }
            Value::Null => {
                out.push(Value::Null);
                Ok(())
            }
            other => Err(QueryError::Eval(format!(
                "cannot index {} with number",
                type_name(&other)
            ))),
        },
        PathStep::Iterate => match value {
            Value::Array(items) => {
                out.extend(items);
                Ok(())
            }
            Value::Object(map) => {
                out.extend(map.into_iter().map(|(_, v)| v));
                Ok(())
            }
            other => Err(QueryError::Eval(format!(
                "cannot iterate over {}",
                type_name(&other)
            ))),
        },
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn parse_program(filter: &str) -> Result<PathProgram, QueryError> {
    let trimmed = filter.trim();
    if trimmed.is_empty() {
        return Err(QueryError::Parse("empty filter".to_string()));
    }
    let mut segments = Vec::new();
    for part in trimmed.split('|') {
        segments.push(parse_segment(part.trim())?);
    }
    Ok(PathProgram { segments })
}

fn parse_segment(segment: &str) -> Result<Segment, QueryError> {
    if segment.is_empty() {
        return Err(QueryError::Parse("empty pipe segment".to_string()));
    }
    if segment == "." {
        return Ok(Vec::new());
    }
    let bytes = segment.as_bytes();
    if bytes[0] != b'.' {
        return Err(QueryError::Parse(format!(
            "filter must start with '.': {segment}"
        )));
    }

    let mut steps = Vec::new();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'.' => i += 1,
            b'[' => {
                i += 1;
                if i < bytes.len() && bytes[i] == b']' {
                    steps.push(PathStep::Iterate);
                    i += 1;
                    continue;
                }
                let start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                if start == i || i >= bytes.len() || bytes[i] != b']' {
                    return Err(QueryError::Parse(format!(
                        "invalid index at byte {start} in {segment}"
                    )));
                }
                let index: usize = segment[start..i]
                    .parse()
                    .map_err(|_| QueryError::Parse(format!("invalid index in {segment}")))?;
                steps.push(PathStep::Index(index));
                i += 1;
            }
            _ => {
                let start = i;
                while i < bytes.len() && is_identifier_byte(bytes[i]) {
                    i += 1;
                }
                if start == i {
                    return Err(QueryError::Parse(format!(
                        "unexpected character {:?} in {segment}",
                        segment[i..].chars().next().unwrap_or('?')
                    )));
                }
                steps.push(PathStep::Key(segment[start..i].to_string()));
            }
        }
    }
    Ok(steps)
}

fn is_identifier_byte(b: u8) -> bool {
    b == b'_' || b.is_ascii_alphanumeric()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn run(filter: &str, doc: &Value) -> Result<Vec<Value>, QueryError> {
        let program = PathEvaluator.compile(filter)?;
        let cancel = CancellationToken::new();
        program.evaluate(doc, &cancel).collect()
    }

    #[test]
    fn identity_returns_document() {
        let doc = json!({"a": 1});
        assert_eq!(run(".", &doc), Ok(vec![doc.clone()]));
    }

    #[test]
    fn key_chain_and_index() {
        let doc = json!({"users": [{"name": "ada"}, {"name": "bob"}]});
        assert_eq!(run(".users[1].name", &doc), Ok(vec![json!("bob")]));
    }

    #[test]
    fn iterate_streams_every_element() {
        let doc = json!({"users": [{"name": "ada"}, {"name": "bob"}]});
        assert_eq!(
            run(".users[].name", &doc),
            Ok(vec![json!("ada"), json!("bob")])
        );
    }

    #[test]
    fn pipe_applies_segments_in_order() {
        let doc = json!({"users": [{"name": "ada"}]});
        assert_eq!(run(".users | .[0] | .name", &doc), Ok(vec![json!("ada")]));
    }

    #[test]
    fn missing_key_yields_null() {
        let doc = json!({"a": 1});
        assert_eq!(run(".b", &doc), Ok(vec![Value::Null]));
    }

    #[test]
    fn indexing_a_scalar_is_an_error() {
        let doc = json!({"a": 1});
        let err = run(".a.b", &doc).expect_err("scalar index must fail");
        assert_eq!(
            err,
            QueryError::Eval("cannot index number with \"b\"".to_string())
        );
    }

    #[test]
    fn malformed_filter_is_a_parse_error() {
        let doc = json!({});
        assert!(matches!(run(".a[", &doc), Err(QueryError::Parse(_))));
        assert!(matches!(run("foo", &doc), Err(QueryError::Parse(_))));
    }

    #[test]
    fn cancelled_token_ends_the_stream() {
        let doc = json!({"users": [1, 2, 3]});
        let program = PathEvaluator.compile(".users[]").expect("compile");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let results: Vec<_> = program.evaluate(&doc, &cancel).collect();
        assert_eq!(results, vec![Err(QueryError::Cancelled)]);
    }
}
