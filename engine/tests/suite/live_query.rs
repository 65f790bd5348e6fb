#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use jex_engine::EngineEvent;
use jex_engine::LineColorCache;
use jex_engine::PathEvaluator;
use jex_engine::QueryError;
use jex_engine::QueryOrchestrator;
use jex_engine::QueryService;
use jex_engine::Suggester;
use jex_engine::clip_line;
use jex_engine::display_width;
use jex_engine::with_ellipsis;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedReceiver;

fn sample_doc() -> Value {
    json!({
        "meta": {"generated": true, "version": 3},
        "users": [
            {"name": "ada", "langs": ["rust", "go"]},
            {"name": "bob", "langs": ["c"]}
        ]
    })
}

fn service() -> Arc<QueryService> {
    Arc::new(QueryService::new(sample_doc(), Arc::new(PathEvaluator)))
}

async fn next_query_result(
    rx: &mut UnboundedReceiver<EngineEvent>,
) -> (u64, Result<String, QueryError>) {
    loop {
        match rx.recv().await.expect("engine channel open") {
            EngineEvent::QueryResult { seq, result } => return (seq, result),
            _ => continue,
        }
    }
}

/// The whole keystroke-to-result pipeline: edits are queued, the debounce
/// collapses them, the last filter executes, and the accepted result is the
/// pretty-printed output of that filter.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn edits_flow_through_debounce_to_an_accepted_result() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orch = QueryOrchestrator::new(service(), tx, Duration::from_millis(5), true);

    orch.queue(".users");
    orch.queue(".users[0]");
    orch.queue(".users[0].name");

    let mut accepted = None;
    while accepted.is_none() {
        match rx.recv().await.expect("engine channel open") {
            EngineEvent::DebounceElapsed { seq } => orch.on_debounce_elapsed(seq),
            EngineEvent::QueryResult { seq, result } => {
                accepted = orch.on_result(seq, result);
            }
            EngineEvent::Keys { .. } => {}
        }
    }

    assert_eq!(accepted.unwrap(), Ok("\"ada\"".to_string()));
    assert_eq!(orch.telemetry().dropped_debounce(), 2);
}

/// Suggest, apply, and re-execute: the autocomplete flow a Tab-Enter
/// sequence drives in the UI.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn suggestion_apply_produces_an_executable_filter() {
    let svc = service();
    let suggester = Suggester::new(svc.clone());

    let (suggestions, ctx) = suggester.suggest(".users[0].l");
    assert_eq!(suggestions, vec!["langs"]);

    let applied = suggester.apply(".users[0].l", &ctx, &suggestions[0]);
    assert_eq!(applied, ".users[0].langs");

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orch = QueryOrchestrator::new(svc, tx, Duration::from_millis(5), false);
    orch.execute_now(&applied);

    let (seq, result) = next_query_result(&mut rx).await;
    let shown = orch.on_result(seq, result).expect("accepted");
    assert_eq!(shown, Ok("[\n  \"rust\",\n  \"go\"\n]".to_string()));
}

/// Executed output rendered through the windowing pipeline: clip, ellipsis,
/// and the bounded color cache.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn executed_output_renders_through_the_window_pipeline() {
    let svc = service();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut orch = QueryOrchestrator::new(svc, tx, Duration::from_millis(5), false);
    orch.execute_now(".users[0]");

    let (seq, result) = next_query_result(&mut rx).await;
    let raw = orch
        .on_result(seq, result)
        .expect("accepted")
        .expect("no error");

    let mut cache = LineColorCache::new(64);
    let width = 12;
    for line in raw.split('\n') {
        let clipped = clip_line(line, 0, width);
        let visible = with_ellipsis(&clipped.text, width, clipped.left_cut, clipped.right_cut);
        assert!(display_width(&visible) <= width);
        if clipped.right_cut {
            assert_eq!(display_width(&visible), width);
        }
        let styled = cache.colorize(&visible);
        // Styling only ever adds escape sequences around the same text.
        assert!(styled.len() >= visible.len());
    }
    assert!(cache.len() <= 64);
}

/// Key lookups arrive asynchronously tagged with their path, so a panel can
/// drop answers for paths the user has already left.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn key_lookups_report_their_path() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let orch = QueryOrchestrator::new(service(), tx, Duration::from_millis(5), false);

    orch.fetch_keys(".".to_string());
    orch.fetch_keys(".users[0]".to_string());

    let mut seen = Vec::new();
    while seen.len() < 2 {
        if let EngineEvent::Keys { path, result } = rx.recv().await.expect("engine channel open") {
            seen.push((path, result.expect("keys")));
        }
    }
    seen.sort();
    assert_eq!(
        seen,
        vec![
            (".".to_string(), vec!["meta".to_string(), "users".to_string()]),
            (
                ".users[0]".to_string(),
                vec!["langs".to_string(), "name".to_string()]
            ),
        ]
    );
}
