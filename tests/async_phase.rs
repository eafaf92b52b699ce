use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use phasecuter::{AsyncPhase, BoxError, PhaseError, Runnable, define_async_phase};

#[derive(Default)]
struct Trace {
    calls: Mutex<HashMap<String, usize>>,
    spans: Mutex<HashMap<String, (Instant, Instant)>>,
}

impl Trace {
    fn calls(&self, id: &str) -> usize {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    fn span(&self, id: &str) -> (Instant, Instant) {
        self.spans.lock().unwrap()[id]
    }
}

type Ctx = Arc<Trace>;

/// A task that records how often it ran and when its body started/ended.
struct Timed {
    id: &'static str,
    after: Vec<String>,
    delay: Duration,
    fail: bool,
}

impl Timed {
    fn new(id: &'static str, after: &[&str], delay_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            after: after.iter().map(|s| s.to_string()).collect(),
            delay: Duration::from_millis(delay_ms),
            fail: false,
        })
    }

    fn failing(id: &'static str, after: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            id,
            after: after.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
            fail: true,
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0} failed on purpose")]
struct Boom(String);

#[async_trait]
impl Runnable<Ctx> for Timed {
    fn id(&self) -> &str {
        self.id
    }

    fn run_after(&self) -> Vec<String> {
        self.after.clone()
    }

    async fn run(&self, trace: Ctx) -> Result<(), BoxError> {
        let started = Instant::now();
        *trace.calls.lock().unwrap().entry(self.id.to_string()).or_default() += 1;
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(Box::new(Boom(self.id.to_string())));
        }
        trace.spans.lock().unwrap().insert(self.id.to_string(), (started, Instant::now()));
        Ok(())
    }
}

fn phase(tasks: Vec<Arc<Timed>>) -> AsyncPhase<Ctx> {
    let mut phase = define_async_phase("on-load");
    for task in tasks {
        phase.register_runnable(task);
    }
    phase
}

#[tokio::test]
async fn fan_out_runs_root_first_and_each_task_once() {
    let phase = phase(vec![
        Timed::new("b", &["a"], 5),
        Timed::new("c", &["a"], 5),
        Timed::new("a", &[], 10),
    ]);
    let trace = Ctx::default();

    phase.run(trace.clone()).await.unwrap();

    for id in ["a", "b", "c"] {
        assert_eq!(trace.calls(id), 1, "{id}");
    }
    let (_, a_end) = trace.span("a");
    assert!(a_end <= trace.span("b").0);
    assert!(a_end <= trace.span("c").0);
}

#[tokio::test]
async fn predecessors_finish_before_dependents_start() {
    let phase = phase(vec![
        Timed::new("config", &[], 15),
        Timed::new("cluster", &["config"], 5),
        Timed::new("theme", &[], 1),
        Timed::new("window", &["cluster", "theme"], 0),
        Timed::new("tray", &["window", "config"], 0),
    ]);
    let trace = Ctx::default();

    phase.run(trace.clone()).await.unwrap();

    for (before, after) in [
        ("config", "cluster"),
        ("cluster", "window"),
        ("theme", "window"),
        ("window", "tray"),
        ("config", "tray"),
    ] {
        assert!(trace.span(before).1 <= trace.span(after).0, "{before} -> {after}");
    }
}

#[tokio::test]
async fn cycle_is_rejected_before_any_body_runs() {
    let phase = phase(vec![
        Timed::new("free", &[], 0),
        Timed::new("a", &["b"], 0),
        Timed::new("b", &["a"], 0),
    ]);
    let trace = Ctx::default();

    let err = phase.run(trace.clone()).await.unwrap_err();

    match err {
        PhaseError::CycleDetected {
            phase_id,
            mut involved_task_ids,
        } => {
            involved_task_ids.sort();
            assert_eq!(phase_id, "on-load");
            assert_eq!(involved_task_ids, vec!["a", "b"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(trace.calls("free"), 0);
    assert_eq!(trace.calls("a") + trace.calls("b"), 0);
}

#[tokio::test]
async fn self_cycle_is_rejected() {
    let phase = phase(vec![Timed::new("a", &["a"], 0)]);
    let trace = Ctx::default();

    let err = phase.run(trace.clone()).await.unwrap_err();

    assert!(matches!(err, PhaseError::CycleDetected { ref involved_task_ids, .. } if involved_task_ids == &["a"]));
    assert_eq!(trace.calls("a"), 0);
}

#[tokio::test]
async fn unknown_predecessor_is_rejected() {
    let phase = phase(vec![Timed::new("ok", &[], 0), Timed::new("a", &["ghost"], 0)]);
    let trace = Ctx::default();

    let err = phase.run(trace.clone()).await.unwrap_err();

    match err {
        PhaseError::UnresolvedPredecessor {
            phase_id,
            task_id,
            missing_predecessor_id,
        } => {
            assert_eq!(phase_id, "on-load");
            assert_eq!(task_id, "a");
            assert_eq!(missing_predecessor_id, "ghost");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(trace.calls("ok"), 0);
}

#[tokio::test]
async fn duplicate_id_is_rejected() {
    let phase = phase(vec![Timed::new("a", &[], 0), Timed::new("a", &[], 0)]);

    let err = phase.run(Ctx::default()).await.unwrap_err();

    assert!(err.is_configuration());
    assert!(matches!(err, PhaseError::DuplicateTaskId { ref task_id, .. } if task_id == "a"));
}

#[tokio::test]
async fn failure_skips_dependents_and_returns_the_task_error() {
    let phase = phase(vec![
        Timed::failing("a", &[]),
        Timed::new("b", &["a"], 0),
        Timed::new("c", &["b"], 0),
    ]);
    let trace = Ctx::default();

    let err = phase.run(trace.clone()).await.unwrap_err();

    assert!(!err.is_configuration());
    let source = err.into_task_error().unwrap();
    assert_eq!(source.downcast_ref::<Boom>().map(|b| b.0.as_str()), Some("a"));
    assert_eq!(trace.calls("a"), 1);

    // Dependents observe the dropped signal and never run, even later on.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(trace.calls("b"), 0);
    assert_eq!(trace.calls("c"), 0);
}

#[tokio::test]
async fn failure_does_not_stop_independent_siblings() {
    let finished = Arc::new(Notify::new());
    let sibling_calls = Arc::new(AtomicUsize::new(0));

    let mut phase = define_async_phase::<()>("on-load");
    phase
        .register("a", |_| async { Err::<(), BoxError>("a broke".into()) }, &[])
        .register("b", |_| async { Ok::<(), BoxError>(()) }, &["a"])
        .register(
            "independent",
            {
                let finished = finished.clone();
                let sibling_calls = sibling_calls.clone();
                move |_| {
                    let finished = finished.clone();
                    let sibling_calls = sibling_calls.clone();
                    async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        sibling_calls.fetch_add(1, Ordering::SeqCst);
                        finished.notify_one();
                        Ok::<(), BoxError>(())
                    }
                }
            },
            &[],
        );

    let err = phase.run(()).await.unwrap_err();
    assert_eq!(err.to_string(), "a broke");

    tokio::time::timeout(Duration::from_secs(1), finished.notified())
        .await
        .unwrap();
    assert_eq!(sibling_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn consecutive_runs_each_execute_every_task_once() {
    let phase = phase(vec![
        Timed::new("a", &[], 1),
        Timed::new("b", &["a"], 1),
        Timed::new("c", &["b"], 1),
    ]);

    let first = Ctx::default();
    phase.run(first.clone()).await.unwrap();
    let second = Ctx::default();
    phase.run(second.clone()).await.unwrap();

    for id in ["a", "b", "c"] {
        assert_eq!(first.calls(id), 1, "{id}");
        assert_eq!(second.calls(id), 1, "{id}");
    }
    assert!(second.span("b").1 <= second.span("c").0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn ordering_holds_on_a_multi_threaded_runtime() {
    let mut tasks = vec![Timed::new("root", &[], 5)];
    let ids: Vec<&'static str> = vec!["n1", "n2", "n3", "n4", "n5", "n6"];
    let mut previous = "root";
    for &id in &ids {
        tasks.push(Timed::new(id, &[previous, "root"], 1));
        previous = id;
    }
    let phase = phase(tasks);
    let trace = Ctx::default();

    phase.run(trace.clone()).await.unwrap();

    let mut previous = "root";
    for id in ids {
        assert_eq!(trace.calls(id), 1);
        assert!(trace.span(previous).1 <= trace.span(id).0, "{previous} -> {id}");
        previous = id;
    }
}
