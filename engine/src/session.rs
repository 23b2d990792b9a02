//! The generation request coordinator.
//!
//! A [`Session`] owns every piece of orchestration state: the authoritative
//! file store, the transcript, the mission machine, the single-flight
//! guard, and the notice queue. It is single-threaded and cooperative; the
//! only suspension point is the outbound generation call (plus the
//! deliberate auto-advance pause).
//!
//! The coordinator is split into a pure state layer and an async driver:
//!
//! - [`Session::begin`] / [`Session::finish_success`] /
//!   [`Session::finish_failure`] mutate state synchronously and never
//!   suspend, so ordering properties (single-flight, snapshot freshness)
//!   are testable without a live backend;
//! - [`Session::submit`] ties them together around the actual backend call
//!   and interprets approval replies first.
//!
//! Requests are strictly sequential: a request snapshot is taken from the
//! owned store inside `begin`, after the previous call has fully resolved,
//! so step N+1 always builds on step N's merged output.

use std::sync::Arc;

use atelier_providers::GenerationBackend;
use atelier_store::{ApplyReport, FileStore, StoreUpdate, UpdateOrigin};
use atelier_types::{
    ApprovalPrompt, ApprovalVerdict, AssistantMessage, GenerationRequest, GenerationResult,
    ImageAttachment, MessageId, NonEmptyString, Plan, ProjectConfig,
};

use crate::config::EngineConfig;
use crate::mission::{MissionState, StepTicket};
use crate::notices::{Notice, NoticeLevel, NoticeQueue};
use crate::persistence::{FsProjectStore, ProjectDocument, ProjectStore};
use crate::transcript::Transcript;

// ============================================================================
// Coordinator vocabulary
// ============================================================================

/// Who initiated a generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOrigin {
    /// Direct user text.
    Manual,
    /// Issued by the queue machine without new user text.
    Automatic,
}

impl RequestOrigin {
    fn store_origin(self) -> UpdateOrigin {
        match self {
            Self::Manual => UpdateOrigin::UserInitiated,
            Self::Automatic => UpdateOrigin::Automatic,
        }
    }
}

/// Why a request did not start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// A generation is already in flight; the duplicate action is dropped
    /// silently.
    InFlight,
    /// Blank prompt text.
    BlankPrompt,
}

/// Outcome of [`Session::begin`].
#[derive(Debug)]
pub enum Begin {
    Started(GenerationRequest),
    Rejected(DropReason),
}

#[derive(Debug)]
struct PendingGeneration {
    origin: RequestOrigin,
    prompt: String,
}

#[derive(Debug, Default)]
enum FlightState {
    #[default]
    Idle,
    InFlight(PendingGeneration),
}

/// What one completed generation did to the session.
#[derive(Debug)]
pub struct StepReport {
    pub message_id: MessageId,
    pub apply: ApplyReport,
    /// Present when the machine is now waiting on a yes/no decision.
    pub approval: Option<ApprovalPrompt>,
    pub plan_installed: bool,
}

/// Outcome of one [`Session::submit`] turn.
#[derive(Debug)]
pub enum SubmitOutcome {
    Completed(StepReport),
    /// The input did not start a generation (duplicate or blank).
    Dropped(DropReason),
    /// Backend failure: queue cleared, error notice posted, store untouched.
    Failed { error: String },
    /// Approval declined: remaining steps cancelled, no generation call made.
    Cancelled { dropped: usize },
}

/// How a user reply should be handled, decided before any call is made.
#[derive(Debug)]
pub enum ReplyDisposition {
    /// Treat as a fresh manual prompt.
    Manual,
    /// Approval granted: run this automatic step.
    Advance(StepTicket),
    /// Approval declined: everything already handled, nothing to send.
    Cancelled { dropped: usize },
}

/// Identity under which the session persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub user_id: String,
    pub project_id: String,
}

// ============================================================================
// Session
// ============================================================================

pub struct Session<P: ProjectStore = FsProjectStore> {
    files: FileStore,
    transcript: Transcript,
    mission: MissionState,
    flight: FlightState,
    notices: NoticeQueue,
    last_thought: Option<String>,
    draft: String,
    staged_image: Option<ImageAttachment>,
    config: EngineConfig,
    project_config: ProjectConfig,
    project: Option<ProjectIdentity>,
    store: Option<Arc<P>>,
    pending_persist: Option<tokio::task::JoinHandle<()>>,
}

impl Session<FsProjectStore> {
    /// A session with no persistence attached.
    #[must_use]
    pub fn new(config: EngineConfig, project_config: ProjectConfig) -> Self {
        Self {
            files: FileStore::new(),
            transcript: Transcript::new(),
            mission: MissionState::new(),
            flight: FlightState::Idle,
            notices: NoticeQueue::new(),
            last_thought: None,
            draft: String::new(),
            staged_image: None,
            config,
            project_config,
            project: None,
            store: None,
            pending_persist: None,
        }
    }
}

impl<P: ProjectStore> Session<P> {
    /// A session that persists after every successful generation.
    #[must_use]
    pub fn with_persistence(
        config: EngineConfig,
        project_config: ProjectConfig,
        identity: ProjectIdentity,
        store: Arc<P>,
    ) -> Self {
        Self {
            files: FileStore::new(),
            transcript: Transcript::new(),
            mission: MissionState::new(),
            flight: FlightState::Idle,
            notices: NoticeQueue::new(),
            last_thought: None,
            draft: String::new(),
            staged_image: None,
            config,
            project_config,
            project: Some(identity),
            store: Some(store),
            pending_persist: None,
        }
    }

    // ------------------------------------------------------------------
    // Read access
    // ------------------------------------------------------------------

    #[must_use]
    pub fn files(&self) -> &FileStore {
        &self.files
    }

    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub fn mission(&self) -> &MissionState {
        &self.mission
    }

    #[must_use]
    pub fn is_generating(&self) -> bool {
        matches!(self.flight, FlightState::InFlight(_))
    }

    #[must_use]
    pub fn last_thought(&self) -> Option<&str> {
        self.last_thought.as_deref()
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        self.notices.drain()
    }

    /// Synthesize the current project into a runnable document.
    ///
    /// Called on demand by the preview surface; the orchestration loop
    /// itself never invokes this.
    #[must_use]
    pub fn preview(&self) -> String {
        atelier_synth::build_document(&self.files, &self.config.entry_path, &self.project_config)
    }

    // ------------------------------------------------------------------
    // Input staging & direct edits
    // ------------------------------------------------------------------

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn stage_image(&mut self, image: ImageAttachment) {
        self.staged_image = Some(image);
    }

    #[must_use]
    pub fn staged_image(&self) -> Option<&ImageAttachment> {
        self.staged_image.as_ref()
    }

    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path, content);
    }

    pub fn delete_file(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    pub fn rename_file(&mut self, from: &str, to: impl Into<String>) -> bool {
        self.files.rename(from, to)
    }

    /// Seed the session from a persisted project document.
    pub fn load_project(&mut self, document: ProjectDocument) {
        self.files.replace_all(document.files);
        self.project_config = document.config;
    }

    /// Restore a historical file set (e.g. from a snapshot).
    pub fn rollback(&mut self, files: std::collections::BTreeMap<String, String>, label: &str) {
        self.files.replace_all(files);
        self.notices
            .push(NoticeLevel::Success, format!("Rolled back to: {label}"));
    }

    // ------------------------------------------------------------------
    // State layer: begin / finish
    // ------------------------------------------------------------------

    /// Start a generation: single-flight check, optimistic transcript
    /// append, and request construction from the authoritative store.
    ///
    /// The history window is captured before the new message is appended so
    /// the prompt is not duplicated into its own context.
    pub fn begin(&mut self, prompt: &str, origin: RequestOrigin) -> Begin {
        if matches!(self.flight, FlightState::InFlight(_)) {
            if origin == RequestOrigin::Automatic {
                // The queue machine only advances after the prior request
                // resolved; getting here means a driver bug.
                tracing::warn!("automatic step attempted while a generation is in flight");
            }
            return Begin::Rejected(DropReason::InFlight);
        }

        let Ok(content) = NonEmptyString::new(prompt) else {
            return Begin::Rejected(DropReason::BlankPrompt);
        };

        let recent_history = self.transcript.recent_history(self.config.history_window);

        let image = match origin {
            RequestOrigin::Manual => {
                let image = self.staged_image.take();
                self.draft.clear();
                self.transcript.push_user(content, image.clone());
                image
            }
            RequestOrigin::Automatic => {
                self.transcript.push_directive(content);
                None
            }
        };

        let request = GenerationRequest {
            prompt_text: prompt.to_owned(),
            current_files: self.files.snapshot(),
            recent_history,
            image,
            config: self.project_config.clone(),
        };

        self.flight = FlightState::InFlight(PendingGeneration {
            origin,
            prompt: prompt.to_owned(),
        });
        Begin::Started(request)
    }

    /// Merge a successful result into the session.
    ///
    /// Returns `None` (and logs) if no generation was in flight.
    pub fn finish_success(&mut self, result: GenerationResult) -> Option<StepReport> {
        match std::mem::take(&mut self.flight) {
            FlightState::InFlight(pending) => Some(self.complete_flight(&pending, result)),
            FlightState::Idle => {
                tracing::warn!("finish_success called with no generation in flight");
                None
            }
        }
    }

    fn complete_flight(
        &mut self,
        pending: &PendingGeneration,
        result: GenerationResult,
    ) -> StepReport {
        // 1. File effects, guarded for automatic steps.
        let update = StoreUpdate::from(&result);
        let had_updates = !update.is_empty();
        let apply = self
            .files
            .apply(update, pending.origin.store_origin(), &self.config.guard);
        if had_updates && apply.all_rejected() {
            self.notices.push(
                NoticeLevel::Info,
                format!(
                    "Held back {} suspicious file update(s); project files were left unchanged.",
                    apply.rejected.len()
                ),
            );
        }

        // 2. Diagnostics.
        if let Some(thought) = result.thought {
            self.last_thought = Some(thought);
        }

        // 3. A fresh plan is only honored on manual (genesis) requests.
        let mut installed_plan: Option<Plan> = None;
        if pending.origin == RequestOrigin::Manual
            && let Some(steps) = result.plan
            && !steps.is_empty()
        {
            match Plan::new(steps) {
                Ok(plan) => {
                    self.mission.install(plan.clone(), pending.prompt.clone());
                    if plan.is_multi_step() {
                        self.notices.push(
                            NoticeLevel::Success,
                            format!("Execution plan locked: {} steps to completion.", plan.len()),
                        );
                    }
                    installed_plan = Some(plan);
                }
                Err(e) => tracing::warn!("backend returned an unusable plan, ignoring it: {e}"),
            }
        }

        // 4. Step settled: open the approval gate or finish the mission.
        let approval = self.mission.settle_after_step();

        // 5. Assistant message, tagged with whatever remains pending.
        let display_plan = installed_plan
            .clone()
            .or_else(|| match pending.origin {
                RequestOrigin::Automatic => self.mission.plan().cloned(),
                RequestOrigin::Manual => None,
            });
        let content = NonEmptyString::new(result.answer)
            .unwrap_or_else(|_| NonEmptyString::new("(empty response)").expect("literal is non-empty"));
        let changes = apply.changes.clone();
        let approval_for_message = approval.clone();
        let message_id = self.transcript.push_assistant(move |id| {
            let mut message = AssistantMessage::new(id, content).with_changes(changes);
            if let Some(plan) = display_plan {
                message = message.with_plan(plan);
            }
            if let Some(prompt) = approval_for_message {
                message = message.with_approval(prompt);
            }
            message
        });

        // 6. Fire-and-forget persistence.
        self.spawn_persist();

        StepReport {
            message_id,
            apply,
            approval,
            plan_installed: installed_plan.is_some(),
        }
    }

    /// Record a failed generation: error notice, queue cleared, approval
    /// state cleared. The file store is untouched, and the system is left
    /// neither silently stalled nor silently auto-continuing.
    pub fn finish_failure(&mut self, error: &str) {
        if matches!(std::mem::take(&mut self.flight), FlightState::Idle) {
            tracing::warn!("finish_failure called with no generation in flight");
        }
        let dropped = self.mission.abort();
        if dropped > 0 {
            tracing::warn!(dropped, "cleared remaining queued steps after a failed step");
        }
        self.notices.push(NoticeLevel::Error, error);
    }

    // ------------------------------------------------------------------
    // Approval handling
    // ------------------------------------------------------------------

    /// Decide what a user reply means given the current mission state.
    ///
    /// Outside the approval gate every reply is a fresh manual prompt.
    /// Inside it, an affirmative token dequeues exactly one step; anything
    /// else cancels the remaining queue on the spot, appending an
    /// acknowledgement without consuming a generation call.
    pub fn interpret_reply(&mut self, reply: &str) -> ReplyDisposition {
        if !self.mission.is_awaiting_approval() {
            return ReplyDisposition::Manual;
        }

        match ApprovalVerdict::parse(reply) {
            ApprovalVerdict::Affirmed => match self.mission.approve() {
                Some(ticket) => {
                    self.notices.push(
                        NoticeLevel::Info,
                        format!(
                            "Working on step {}/{}: {}",
                            ticket.step_number,
                            ticket.total_steps,
                            ellipsize(&ticket.task, 48)
                        ),
                    );
                    ReplyDisposition::Advance(ticket)
                }
                None => ReplyDisposition::Manual,
            },
            ApprovalVerdict::Declined => {
                let dropped = self.mission.abort();
                let ack = NonEmptyString::new(format!(
                    "Understood. I cancelled the remaining {dropped} step(s); \
                     tell me what you would like to change."
                ))
                .expect("acknowledgement text is non-empty");
                self.transcript
                    .push_assistant(|id| AssistantMessage::new(id, ack));
                self.notices
                    .push(NoticeLevel::Info, "Remaining steps cancelled.");
                ReplyDisposition::Cancelled { dropped }
            }
        }
    }

    // ------------------------------------------------------------------
    // Async driver
    // ------------------------------------------------------------------

    /// Handle one user input end to end.
    ///
    /// Interprets approval replies first, pauses before an approved
    /// automatic step (so the host can render the intermediate state and
    /// back-to-back backend calls are throttled), then runs at most one
    /// generation.
    pub async fn submit<B: GenerationBackend>(
        &mut self,
        backend: &B,
        input: &str,
    ) -> SubmitOutcome {
        match self.interpret_reply(input) {
            ReplyDisposition::Cancelled { dropped } => SubmitOutcome::Cancelled { dropped },
            ReplyDisposition::Advance(ticket) => {
                let delay = self.config.advance_delay;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                self.run_step(backend, &ticket.directive, RequestOrigin::Automatic)
                    .await
            }
            ReplyDisposition::Manual => self.run_step(backend, input, RequestOrigin::Manual).await,
        }
    }

    /// Submit the staged draft text.
    pub async fn submit_draft<B: GenerationBackend>(&mut self, backend: &B) -> SubmitOutcome {
        let draft = self.draft.clone();
        self.submit(backend, &draft).await
    }

    /// Run exactly one generation request through begin → call → finish.
    pub async fn run_step<B: GenerationBackend>(
        &mut self,
        backend: &B,
        prompt: &str,
        origin: RequestOrigin,
    ) -> SubmitOutcome {
        let request = match self.begin(prompt, origin) {
            Begin::Started(request) => request,
            Begin::Rejected(reason) => return SubmitOutcome::Dropped(reason),
        };

        match backend.generate(&request).await {
            Ok(result) => match self.finish_success(result) {
                Some(report) => SubmitOutcome::Completed(report),
                // Unreachable: the flight was set by `begin` above and
                // nothing else ran while we held `&mut self`.
                None => SubmitOutcome::Dropped(DropReason::InFlight),
            },
            Err(error) => {
                let text = error.to_string();
                self.finish_failure(&text);
                SubmitOutcome::Failed { error: text }
            }
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    fn spawn_persist(&mut self) {
        let (Some(identity), Some(store)) = (&self.project, &self.store) else {
            return;
        };
        let store = Arc::clone(store);
        let user_id = identity.user_id.clone();
        let project_id = identity.project_id.clone();
        let files = self.files.snapshot();
        let config = self.project_config.clone();

        self.pending_persist = Some(tokio::spawn(async move {
            if let Err(e) = store
                .update_project(user_id, project_id, files, config)
                .await
            {
                tracing::warn!("project persistence failed (state kept in memory): {e:#}");
            }
        }));
    }

    /// Wait for the most recent persistence write to settle.
    ///
    /// The write itself never blocks orchestration; this exists for hosts
    /// that want a durability point (and for tests).
    pub async fn flush_persistence(&mut self) {
        if let Some(handle) = self.pending_persist.take() {
            let _ = handle.await;
        }
    }

    /// Label the current file set as a named snapshot (best-effort).
    ///
    /// Hosts typically call this before a multi-step mission starts so
    /// [`Session::rollback`] has somewhere to return to.
    pub async fn snapshot_project(&self, label: &str) {
        let (Some(identity), Some(store)) = (&self.project, &self.store) else {
            return;
        };
        if let Err(e) = store
            .create_snapshot(
                identity.project_id.clone(),
                self.files.snapshot(),
                label.to_owned(),
            )
            .await
        {
            tracing::warn!("snapshot creation failed: {e:#}");
        }
    }
}

fn ellipsize(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_owned()
    } else {
        let prefix: String = text.chars().take(max_chars).collect();
        format!("{prefix}...")
    }
}
