use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::error::QueryError;
use crate::query::QueryService;
use crate::telemetry::LatencyTelemetry;

/// Events the orchestrator sends back to the host event loop. The loop owns
/// the `&mut QueryOrchestrator` and feeds each event back into the matching
/// `on_*` handler, which keeps all sequencing decisions single-threaded.
#[derive(Debug)]
pub enum EngineEvent {
    /// The debounce timer armed for `seq` elapsed. Superseded timers still
    /// deliver this; the orchestrator decides whether `seq` is current.
    DebounceElapsed { seq: u64 },
    /// A query execution finished (possibly cancelled or stale).
    QueryResult {
        seq: u64,
        result: Result<String, QueryError>,
    },
    /// An asynchronous key lookup finished.
    Keys {
        path: String,
        result: Result<Vec<String>, QueryError>,
    },
}

/// Serializes filter edits into at most one in-flight query execution.
///
/// Every edit mints a fresh sequence number and arms a debounce timer;
/// execution only starts when the timer fires and the sequence is still the
/// newest. Dispatching cancels whatever was running before. Results are
/// accepted only when their sequence matches the active one, so the
/// displayed output can never move backwards to an older filter's result.
pub struct QueryOrchestrator {
    query: Arc<QueryService>,
    tx: UnboundedSender<EngineEvent>,
    debounce: Duration,

    /// Newest sequence handed out by `queue`/`execute_now`.
    query_seq: u64,
    /// Sequence of the execution currently in flight (or last dispatched).
    active_seq: u64,
    /// Filter text belonging to `query_seq`, captured at queue time.
    latest_filter: String,

    cancel: Option<CancellationToken>,
    running: bool,

    telemetry: LatencyTelemetry,
}

impl QueryOrchestrator {
    pub fn new(
        query: Arc<QueryService>,
        tx: UnboundedSender<EngineEvent>,
        debounce: Duration,
        telemetry_enabled: bool,
    ) -> Self {
        Self {
            query,
            tx,
            debounce,
            query_seq: 0,
            active_seq: 0,
            latest_filter: String::new(),
            cancel: None,
            running: false,
            telemetry: LatencyTelemetry::new(telemetry_enabled),
        }
    }

    pub fn query(&self) -> &Arc<QueryService> {
        &self.query
    }

    /// True while a dispatched execution has not reported back yet.
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn telemetry(&self) -> &LatencyTelemetry {
        &self.telemetry
    }

    /// Record a filter edit and arm the debounce timer for it. Rapid edits
    /// each mint a new sequence; earlier timers fire into
    /// [`Self::on_debounce_elapsed`] and get dropped there.
    pub fn queue(&mut self, filter: &str) {
        let seq = self.mint(filter);
        self.telemetry.on_queued(seq);

        let tx = self.tx.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            let _ = tx.send(EngineEvent::DebounceElapsed { seq });
        });
    }

    /// Run `filter` immediately, bypassing the debounce window. Used for
    /// explicit submission (Enter) and the initial render.
    pub fn execute_now(&mut self, filter: &str) {
        let seq = self.mint(filter);
        self.telemetry.on_queued(seq);
        self.dispatch(seq);
    }

    /// Handle [`EngineEvent::DebounceElapsed`]. A timer whose sequence has
    /// been superseded is dropped without touching the in-flight execution.
    pub fn on_debounce_elapsed(&mut self, seq: u64) {
        if seq != self.query_seq {
            self.telemetry.on_debounce_dropped(seq);
            return;
        }
        self.dispatch(seq);
    }

    /// Handle [`EngineEvent::QueryResult`]. Returns the result to display,
    /// or `None` when it must be discarded (stale sequence, or an accepted
    /// cancellation, which leaves the previous output in place).
    pub fn on_result(
        &mut self,
        seq: u64,
        result: Result<String, QueryError>,
    ) -> Option<Result<String, QueryError>> {
        let accepted = seq == self.active_seq;
        self.telemetry.on_result(seq, &result, accepted);
        if !accepted {
            tracing::debug!(seq, active = self.active_seq, "discarding stale result");
            return None;
        }

        self.running = false;
        self.cancel = None;

        match result {
            Err(err) if err.is_cancelled() => None,
            other => Some(other),
        }
    }

    /// Resolve keys for `path` off the event loop; the answer arrives as
    /// [`EngineEvent::Keys`].
    pub fn fetch_keys(&self, path: String) {
        let query = Arc::clone(&self.query);
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = query.keys_at(&path);
            let _ = tx.send(EngineEvent::Keys { path, result });
        });
    }

    /// Cancel the in-flight execution, if any. The execution still reports
    /// a result; `on_result` swallows the cancellation.
    pub fn cancel_inflight(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }

    fn mint(&mut self, filter: &str) -> u64 {
        self.query_seq += 1;
        self.latest_filter = filter.to_string();
        self.query_seq
    }

    fn dispatch(&mut self, seq: u64) {
        // A dispatch supersedes whatever was running.
        self.cancel_inflight();

        self.active_seq = seq;
        self.running = true;
        self.telemetry.on_dispatch(seq);

        let cancel = CancellationToken::new();
        self.cancel = Some(cancel.clone());

        let query = Arc::clone(&self.query);
        let filter = self.latest_filter.clone();
        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = query.execute(&filter, &cancel);
            let _ = tx.send(EngineEvent::QueryResult { seq, result });
        });
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use crate::evaluator::CompiledFilter;
    use crate::evaluator::FilterEvaluator;
    use crate::structural::PathEvaluator;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn orchestrator(
        debounce_ms: u64,
    ) -> (QueryOrchestrator, UnboundedReceiver<EngineEvent>) {
        orchestrator_with(Arc::new(PathEvaluator), debounce_ms)
    }

    fn orchestrator_with(
        evaluator: Arc<dyn FilterEvaluator>,
        debounce_ms: u64,
    ) -> (QueryOrchestrator, UnboundedReceiver<EngineEvent>) {
        let doc = json!({"users": [{"name": "ada"}]});
        let query = Arc::new(QueryService::new(doc, evaluator));
        let (tx, rx) = mpsc::unbounded_channel();
        let orch = QueryOrchestrator::new(query, tx, Duration::from_millis(debounce_ms), true);
        (orch, rx)
    }

    /// Streams values forever until the token is cancelled. Lets tests hold
    /// an execution open deterministically.
    struct EndlessEvaluator;

    struct EndlessFilter;

    impl FilterEvaluator for EndlessEvaluator {
        fn compile(&self, _filter: &str) -> Result<Arc<dyn CompiledFilter>, QueryError> {
            Ok(Arc::new(EndlessFilter))
        }
    }

    impl CompiledFilter for EndlessFilter {
        fn evaluate<'a>(
            &'a self,
            _doc: &'a Value,
            cancel: &'a CancellationToken,
        ) -> Box<dyn Iterator<Item = Result<Value, QueryError>> + 'a> {
            Box::new(std::iter::repeat_with(|| {
                if cancel.is_cancelled() {
                    Err(QueryError::Cancelled)
                } else {
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(Value::Null)
                }
            }))
        }
    }

    async fn next_query_result(
        rx: &mut UnboundedReceiver<EngineEvent>,
    ) -> (u64, Result<String, QueryError>) {
        loop {
            match rx.recv().await.expect("channel open") {
                EngineEvent::QueryResult { seq, result } => return (seq, result),
                _ => continue,
            }
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn rapid_edits_collapse_to_one_execution() {
        let (mut orch, mut rx) = orchestrator(10);
        orch.queue(".users");
        orch.queue(".users[0]");
        orch.queue(".users[0].name");

        // All three timers fire; only the newest sequence dispatches. The
        // dispatched execution's result may arrive interleaved, so it is
        // buffered rather than counted as a timer event.
        let mut dispatched = 0;
        let mut elapsed_seen = 0;
        let mut pending_result = None;
        while elapsed_seen < 3 {
            match rx.recv().await.expect("channel open") {
                EngineEvent::DebounceElapsed { seq } => {
                    elapsed_seen += 1;
                    let before = orch.is_running();
                    orch.on_debounce_elapsed(seq);
                    if !before && orch.is_running() {
                        dispatched += 1;
                    }
                }
                EngineEvent::QueryResult { seq, result } => {
                    pending_result = Some((seq, result));
                }
                EngineEvent::Keys { .. } => {}
            }
        }
        assert_eq!(dispatched, 1);
        assert_eq!(orch.telemetry().dropped_debounce(), 2);

        let (seq, result) = match pending_result {
            Some(pending) => pending,
            None => next_query_result(&mut rx).await,
        };
        let shown = orch.on_result(seq, result).expect("newest result shown");
        assert_eq!(shown, Ok("\"ada\"".to_string()));
        assert!(!orch.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stale_results_never_replace_newer_ones() {
        let (mut orch, mut rx) = orchestrator(1);
        orch.execute_now(".users[0].name");
        orch.execute_now(".users");

        // The first execution's result (whatever it was) is stale by now.
        assert_eq!(orch.on_result(1, Ok("\"ada\"".to_string())), None);
        assert_eq!(orch.telemetry().stale_results(), 1);

        // The active sequence's result is displayed.
        let shown = orch
            .on_result(2, Ok("old-but-active".to_string()))
            .expect("active result shown");
        assert_eq!(shown, Ok("old-but-active".to_string()));

        // Drain the real executions so the tasks finish.
        let _ = next_query_result(&mut rx).await;
        let _ = next_query_result(&mut rx).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatch_cancels_previous_execution() {
        let (mut orch, mut rx) = orchestrator_with(Arc::new(EndlessEvaluator), 1);
        orch.execute_now(".a");
        orch.execute_now(".b");

        // The superseded execution observes its token and reports Cancelled;
        // that result is stale and silently discarded.
        let (seq, result) = next_query_result(&mut rx).await;
        assert_eq!(seq, 1);
        assert_eq!(result, Err(QueryError::Cancelled));
        assert_eq!(orch.on_result(seq, result), None);

        // The active execution can be cancelled explicitly; its result is
        // accepted but produces nothing to display.
        orch.cancel_inflight();
        let (seq, result) = next_query_result(&mut rx).await;
        assert_eq!(seq, 2);
        assert_eq!(orch.on_result(seq, result), None);
        assert!(!orch.is_running());
        assert_eq!(orch.telemetry().cancelled_results(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn parse_errors_are_reported_to_the_caller() {
        let (mut orch, mut rx) = orchestrator(1);
        orch.execute_now(".users[");
        let (seq, result) = next_query_result(&mut rx).await;
        let shown = orch.on_result(seq, result).expect("error is displayable");
        assert_matches!(shown, Err(QueryError::Parse(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fetch_keys_reports_back_with_the_path() {
        let (orch, mut rx) = orchestrator(1);
        orch.fetch_keys(".users[0]".to_string());
        loop {
            if let EngineEvent::Keys { path, result } = rx.recv().await.expect("channel open") {
                assert_eq!(path, ".users[0]");
                assert_eq!(result, Ok(vec!["name".to_string()]));
                break;
            }
        }
    }
}
