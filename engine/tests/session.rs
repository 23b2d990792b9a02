//! End-to-end coordinator tests against a scripted backend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use atelier_engine::{
    Begin, DropReason, EngineConfig, NoticeLevel, ProjectIdentity, ProjectStore, RequestOrigin,
    Session, SubmitOutcome,
};
use atelier_providers::{BackendError, GenerationBackend};
use atelier_types::{ChatMessage, GenerationRequest, GenerationResult, ProjectConfig};

// ============================================================================
// Test doubles
// ============================================================================

/// Replays a fixed sequence of responses and records every request.
#[derive(Default)]
struct ScriptedBackend {
    responses: Mutex<VecDeque<Result<GenerationResult, String>>>,
    requests: Mutex<Vec<GenerationRequest>>,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(responses: Vec<Result<GenerationResult, String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn request(&self, index: usize) -> GenerationRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

impl GenerationBackend for ScriptedBackend {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(BackendError::Api {
                status: 500,
                message,
            }),
            None => Ok(GenerationResult::answering("nothing scripted")),
        }
    }
}

/// Records persistence calls instead of writing anywhere.
#[derive(Default)]
struct RecordingStore {
    updates: Mutex<Vec<(String, String, BTreeMap<String, String>)>>,
    snapshots: Mutex<Vec<(String, String)>>,
}

impl ProjectStore for RecordingStore {
    async fn update_project(
        &self,
        user_id: String,
        project_id: String,
        files: BTreeMap<String, String>,
        _config: ProjectConfig,
    ) -> anyhow::Result<()> {
        self.updates.lock().unwrap().push((user_id, project_id, files));
        Ok(())
    }

    async fn create_snapshot(
        &self,
        project_id: String,
        _files: BTreeMap<String, String>,
        label: String,
    ) -> anyhow::Result<()> {
        self.snapshots.lock().unwrap().push((project_id, label));
        Ok(())
    }
}

fn session() -> Session {
    Session::new(
        EngineConfig::default().without_advance_delay(),
        ProjectConfig::default(),
    )
}

fn genesis_result() -> GenerationResult {
    GenerationResult::answering("Locked in a build strategy.")
        .with_plan(vec![
            "scaffold the layout".to_owned(),
            "wire up state".to_owned(),
            "style the app".to_owned(),
        ])
        .with_file("app/index.html", "<div id=\"app\"></div>")
}

// ============================================================================
// Manual requests
// ============================================================================

#[tokio::test]
async fn manual_request_merges_files_and_appends_messages() {
    let backend = ScriptedBackend::new(vec![Ok(GenerationResult::answering("Built it.")
        .with_file("app/index.html", "<div>hi</div>"))]);
    let mut session = session();

    let outcome = session.submit(&backend, "make a landing page").await;

    assert!(matches!(outcome, SubmitOutcome::Completed(_)));
    assert_eq!(session.files().get("app/index.html"), Some("<div>hi</div>"));
    assert!(!session.is_generating());

    let messages = session.transcript().messages();
    assert_eq!(messages.len(), 2);
    assert!(matches!(&messages[0], ChatMessage::User(m) if m.content() == "make a landing page"));
    assert!(matches!(&messages[1], ChatMessage::Assistant(m) if m.content() == "Built it."));
}

#[tokio::test]
async fn blank_input_never_reaches_the_backend() {
    let backend = ScriptedBackend::default();
    let mut session = session();

    let outcome = session.submit(&backend, "   ").await;

    assert!(matches!(
        outcome,
        SubmitOutcome::Dropped(DropReason::BlankPrompt)
    ));
    assert_eq!(backend.calls(), 0);
    assert!(session.transcript().is_empty());
}

#[tokio::test]
async fn thought_is_captured_for_diagnostics() {
    let backend = ScriptedBackend::new(vec![Ok(GenerationResult {
        thought: Some("keep it minimal".to_owned()),
        ..GenerationResult::answering("ok")
    })]);
    let mut session = session();
    session.submit(&backend, "something small").await;
    assert_eq!(session.last_thought(), Some("keep it minimal"));
}

// ============================================================================
// Single flight
// ============================================================================

#[test]
fn duplicate_manual_send_is_dropped_while_in_flight() {
    let mut session = session();

    let first = session.begin("make an app", RequestOrigin::Manual);
    assert!(matches!(first, Begin::Started(_)));
    assert!(session.is_generating());

    let second = session.begin("make it again", RequestOrigin::Manual);
    assert!(matches!(second, Begin::Rejected(DropReason::InFlight)));

    // The duplicate left no trace: one user message, no file effects.
    assert_eq!(session.transcript().len(), 1);
    assert!(session.files().is_empty());

    session.finish_success(
        GenerationResult::answering("done").with_file("app/app.js", "let x = 1;"),
    );
    assert_eq!(session.files().get("app/app.js"), Some("let x = 1;"));
    assert!(!session.is_generating());
}

// ============================================================================
// Plan / queue machine
// ============================================================================

#[tokio::test]
async fn genesis_plan_gates_on_approval() {
    let backend = ScriptedBackend::new(vec![
        Ok(genesis_result()),
        Ok(GenerationResult::answering("Wired up state.")
            .with_file("app/app.js", "const state = {};")),
    ]);
    let mut session = session();

    // Genesis: plan installed, gate opens naming step 2.
    let outcome = session.submit(&backend, "build a habit tracker").await;
    let SubmitOutcome::Completed(report) = outcome else {
        panic!("genesis should complete");
    };
    assert!(report.plan_installed);
    let approval = report.approval.expect("multi-step plan waits for approval");
    assert_eq!(approval.next_step, "wire up state");
    assert_eq!((approval.step_number, approval.total_steps), (2, 3));
    assert_eq!(session.mission().state_name(), "awaiting_approval");
    assert_eq!(session.mission().queue_len(), 2);
    assert!(session.transcript().messages().last().unwrap().is_approval());

    let notices = session.drain_notices();
    assert!(
        notices
            .iter()
            .any(|n| n.level == NoticeLevel::Success && n.text.contains("3 steps"))
    );

    // Approval runs exactly one automatic step, then waits again.
    let outcome = session.submit(&backend, "yes").await;
    let SubmitOutcome::Completed(report) = outcome else {
        panic!("approved step should complete");
    };
    assert_eq!(backend.calls(), 2);
    let approval = report.approval.expect("one step still queued");
    assert_eq!(approval.next_step, "style the app");
    assert_eq!((approval.step_number, approval.total_steps), (3, 3));
    assert_eq!(session.mission().queue_len(), 1);

    // The automatic step was recorded as a directive, not user text.
    let directive = session
        .transcript()
        .messages()
        .iter()
        .find_map(|m| match m {
            ChatMessage::Directive(d) => Some(d.content().to_owned()),
            _ => None,
        })
        .expect("automatic step leaves a directive in the transcript");
    assert!(directive.contains("wire up state"));
    assert!(directive.contains("build a habit tracker"));
}

#[tokio::test]
async fn declining_cancels_everything_without_a_generation_call() {
    let backend = ScriptedBackend::new(vec![Ok(genesis_result())]);
    let mut session = session();

    session.submit(&backend, "build a habit tracker").await;
    assert_eq!(backend.calls(), 1);

    let outcome = session.submit(&backend, "hold on, change the colors first").await;

    assert!(matches!(outcome, SubmitOutcome::Cancelled { dropped: 2 }));
    assert_eq!(backend.calls(), 1, "a decline must not consume a call");
    assert!(session.mission().is_idle());
    assert_eq!(session.mission().queue_len(), 0);

    // A cancellation acknowledgement was appended.
    let last = session.transcript().messages().last().unwrap();
    assert!(matches!(last, ChatMessage::Assistant(m) if m.content().contains("cancelled")));
}

#[tokio::test]
async fn single_step_plan_never_creates_a_queue() {
    let backend = ScriptedBackend::new(vec![Ok(GenerationResult::answering("All done in one.")
        .with_plan(vec!["do the whole thing".to_owned()]))]);
    let mut session = session();

    let outcome = session.submit(&backend, "tiny tweak").await;
    let SubmitOutcome::Completed(report) = outcome else {
        panic!("should complete");
    };
    assert!(report.approval.is_none());
    assert!(session.mission().is_idle());
    assert_eq!(session.mission().queue_len(), 0);
}

#[tokio::test]
async fn plan_from_an_automatic_step_is_ignored() {
    let backend = ScriptedBackend::new(vec![
        Ok(GenerationResult::answering("planned").with_plan(vec![
            "first".to_owned(),
            "second".to_owned(),
        ])),
        // The automatic step tries to smuggle in a fresh plan.
        Ok(GenerationResult::answering("done").with_plan(vec![
            "x".to_owned(),
            "y".to_owned(),
            "z".to_owned(),
        ])),
    ]);
    let mut session = session();

    session.submit(&backend, "build it").await;
    let outcome = session.submit(&backend, "ok").await;

    let SubmitOutcome::Completed(report) = outcome else {
        panic!("should complete");
    };
    assert!(!report.plan_installed);
    assert!(session.mission().is_idle(), "queue drained; smuggled plan discarded");
}

#[tokio::test]
async fn affirmative_text_outside_the_gate_is_just_a_prompt() {
    let backend = ScriptedBackend::new(vec![Ok(GenerationResult::answering("sure"))]);
    let mut session = session();

    let outcome = session.submit(&backend, "yes").await;
    assert!(matches!(outcome, SubmitOutcome::Completed(_)));
    assert_eq!(backend.calls(), 1);
}

// ============================================================================
// Failure handling
// ============================================================================

#[tokio::test]
async fn failed_step_clears_the_queue_and_surfaces_one_error() {
    let backend = ScriptedBackend::new(vec![
        Ok(genesis_result()),
        Err("quota exhausted".to_owned()),
    ]);
    let mut session = session();

    session.submit(&backend, "build a habit tracker").await;
    session.drain_notices();
    let files_before = session.files().snapshot();

    let outcome = session.submit(&backend, "proceed").await;

    let SubmitOutcome::Failed { error } = outcome else {
        panic!("backend error should fail the step");
    };
    assert!(error.contains("quota exhausted"));
    assert!(session.mission().is_idle(), "no silent stall, no silent continue");
    assert_eq!(session.files().snapshot(), files_before, "store untouched");

    let notices = session.drain_notices();
    let errors: Vec<_> = notices
        .iter()
        .filter(|n| n.level == NoticeLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].text.contains("quota exhausted"));
}

// ============================================================================
// Integrity guard (through the full coordinator path)
// ============================================================================

#[tokio::test]
async fn integrity_guard_holds_during_automatic_steps() {
    let long_body = "const app = 1;\n".repeat(40);
    let backend = ScriptedBackend::new(vec![
        Ok(GenerationResult::answering("scaffolded")
            .with_plan(vec!["scaffold".to_owned(), "refine".to_owned()])
            .with_file("app/app.js", long_body.clone())),
        Ok(GenerationResult::answering("refined").with_file("app/app.js", "// trimmed")),
    ]);
    let mut session = session();

    session.submit(&backend, "build something real").await;
    session.drain_notices();
    session.submit(&backend, "yes").await;

    assert_eq!(
        session.files().get("app/app.js"),
        Some(long_body.as_str()),
        "suspiciously short automatic overwrite must be rejected"
    );
    let notices = session.drain_notices();
    assert!(notices.iter().any(|n| n.text.contains("Held back 1")));
}

// ============================================================================
// Snapshot freshness
// ============================================================================

#[tokio::test]
async fn each_request_carries_the_previous_steps_output() {
    let backend = ScriptedBackend::new(vec![
        Ok(GenerationResult::answering("step one")
            .with_plan(vec!["write data".to_owned(), "read data".to_owned()])
            .with_file("app/data.js", "export const v = 'v1';")),
        Ok(GenerationResult::answering("step two")),
    ]);
    let mut session = session();

    session.submit(&backend, "start").await;
    session.submit(&backend, "yes").await;

    let second = backend.request(1);
    assert_eq!(
        second.current_files.get("app/data.js").map(String::as_str),
        Some("export const v = 'v1';"),
        "the automatic request must see step one's merged output"
    );
    // History window excludes the outgoing prompt but includes everything
    // before it, with the genesis prompt still visible.
    assert!(second.recent_history.iter().any(|h| h.content == "start"));
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test]
async fn successful_steps_persist_without_blocking() {
    let store = Arc::new(RecordingStore::default());
    let mut session = Session::with_persistence(
        EngineConfig::default().without_advance_delay(),
        ProjectConfig::default(),
        ProjectIdentity {
            user_id: "user-1".to_owned(),
            project_id: "proj-1".to_owned(),
        },
        Arc::clone(&store),
    );
    let backend = ScriptedBackend::new(vec![Ok(GenerationResult::answering("saved")
        .with_file("app/index.html", "<div>persisted</div>"))]);

    session.submit(&backend, "make it").await;
    session.flush_persistence().await;

    let updates = store.updates.lock().unwrap();
    assert_eq!(updates.len(), 1);
    let (user, project, files) = &updates[0];
    assert_eq!((user.as_str(), project.as_str()), ("user-1", "proj-1"));
    assert_eq!(
        files.get("app/index.html").map(String::as_str),
        Some("<div>persisted</div>")
    );
    drop(updates);

    session.snapshot_project("before restyle").await;
    let snapshots = store.snapshots.lock().unwrap();
    assert_eq!(
        snapshots.as_slice(),
        &[("proj-1".to_owned(), "before restyle".to_owned())]
    );
}

// ============================================================================
// Preview surface
// ============================================================================

#[tokio::test]
async fn preview_synthesizes_the_current_store() {
    let mut session = session();
    session.add_file("app/index.html", "<div>preview me</div>");
    session.add_file("app/style.css", "body{color:red}");

    let html = session.preview();
    assert!(html.contains("preview me"));
    assert!(html.contains("color:red"));
}
