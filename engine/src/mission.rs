//! Plan/queue state machine.
//!
//! One explicit state tag owns the whole plan-execution lifecycle:
//!
//! ```text
//! Idle ──genesis plan──> Planned ──step settled──> AwaitingApproval
//!   ^                                                   │
//!   │  decline / failure / queue empty                  │ affirmative reply
//!   └───────────────────────────────────<── Advancing <─┘
//! ```
//!
//! `Idle` is both initial and terminal. Full autonomy is deliberately
//! disallowed: once more than one step remains, every automatic step is
//! separated from the next by an explicit approval. Inferring this from
//! flag combinations is exactly the bug class this enum exists to remove,
//! so state only ever changes through the methods below.

use std::collections::VecDeque;

use atelier_types::{ApprovalPrompt, Plan};

/// Everything a plan execution carries between steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mission {
    plan: Plan,
    queue: VecDeque<String>,
    /// The manual prompt that produced the plan; repeated inside every
    /// directive so automatic steps stay anchored to the user's objective.
    genesis_prompt: String,
}

impl Mission {
    fn new(plan: Plan, genesis_prompt: String) -> Self {
        let queue = plan.remaining_after_genesis().into();
        Self {
            plan,
            queue,
            genesis_prompt,
        }
    }

    fn approval_prompt(&self) -> Option<ApprovalPrompt> {
        let next_step = self.queue.front()?.clone();
        Some(ApprovalPrompt {
            next_step,
            step_number: self.plan.len() - self.queue.len() + 1,
            total_steps: self.plan.len(),
        })
    }
}

/// One dequeued step, ready to be issued as an automatic request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepTicket {
    pub task: String,
    /// 1-based position of this step within the plan.
    pub step_number: usize,
    pub total_steps: usize,
    /// The internal instruction text forwarded to the backend.
    pub directive: String,
}

/// The state machine tag. `Planned` is transient in practice: installation
/// and the settle that follows a completed step happen in the same response
/// handling pass, but it is a real state with its own data all the same.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MissionState {
    #[default]
    Idle,
    Planned(Mission),
    AwaitingApproval(Mission),
    Advancing(Mission),
}

impl MissionState {
    #[must_use]
    pub fn new() -> Self {
        Self::Idle
    }

    #[must_use]
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planned(_) => "planned",
            Self::AwaitingApproval(_) => "awaiting_approval",
            Self::Advancing(_) => "advancing",
        }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    #[must_use]
    pub fn is_awaiting_approval(&self) -> bool {
        matches!(self, Self::AwaitingApproval(_))
    }

    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        match self {
            Self::Idle => None,
            Self::Planned(m) | Self::AwaitingApproval(m) | Self::Advancing(m) => Some(&m.plan),
        }
    }

    /// Steps still pending autonomous execution.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        match self {
            Self::Idle => 0,
            Self::Planned(m) | Self::AwaitingApproval(m) | Self::Advancing(m) => m.queue.len(),
        }
    }

    /// Install a genesis plan, superseding whatever was underway.
    ///
    /// A single-step plan creates no queue and the machine stays `Idle`:
    /// the step was already consumed by the request that produced the plan,
    /// and approval gating only applies when more work is pending.
    pub fn install(&mut self, plan: Plan, genesis_prompt: String) {
        if plan.is_multi_step() {
            *self = Self::Planned(Mission::new(plan, genesis_prompt));
        } else {
            *self = Self::Idle;
        }
    }

    /// Settle after a completed step (genesis or automatic).
    ///
    /// Non-empty queue: enter `AwaitingApproval` and return the prompt that
    /// names the next step. Empty queue: return to `Idle`.
    pub fn settle_after_step(&mut self) -> Option<ApprovalPrompt> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::AwaitingApproval(m) => {
                // A step cannot complete while the gate is closed; keep waiting.
                let prompt = m.approval_prompt();
                *self = Self::AwaitingApproval(m);
                prompt
            }
            Self::Planned(m) | Self::Advancing(m) => match m.approval_prompt() {
                Some(prompt) => {
                    *self = Self::AwaitingApproval(m);
                    Some(prompt)
                }
                None => None, // queue drained; stay Idle
            },
        }
    }

    /// Approval granted: dequeue exactly one step and enter `Advancing`.
    ///
    /// Returns `None` unless the machine was awaiting approval.
    pub fn approve(&mut self) -> Option<StepTicket> {
        match std::mem::take(self) {
            Self::AwaitingApproval(mut m) => {
                let Some(task) = m.queue.pop_front() else {
                    return None;
                };
                let step_number = m.plan.len() - m.queue.len();
                let total_steps = m.plan.len();
                let ticket = StepTicket {
                    directive: directive_text(&m.genesis_prompt, &task, step_number, total_steps),
                    task,
                    step_number,
                    total_steps,
                };
                *self = Self::Advancing(m);
                Some(ticket)
            }
            other => {
                *self = other;
                None
            }
        }
    }

    /// Cancel all remaining work immediately (decline, failure, or abort).
    ///
    /// Returns how many queued steps were dropped.
    pub fn abort(&mut self) -> usize {
        let dropped = self.queue_len();
        *self = Self::Idle;
        dropped
    }
}

/// Internal instruction for one automatic step. Reads as system-originated
/// and anchors the backend to the original objective and exactly one task.
fn directive_text(genesis_prompt: &str, task: &str, step_number: usize, total_steps: usize) -> String {
    format!(
        "[autonomous step {step_number}/{total_steps}]\n\
         Objective: {genesis_prompt}\n\
         Task: {task}\n\n\
         Build on the current project files and implement this task completely. \
         Return the full content of every file you change."
    )
}

#[cfg(test)]
mod tests {
    use atelier_types::Plan;

    use super::MissionState;

    fn plan(steps: &[&str]) -> Plan {
        Plan::new(steps.iter().map(|s| (*s).to_owned()).collect()).expect("valid test plan")
    }

    fn installed(steps: &[&str]) -> MissionState {
        let mut state = MissionState::new();
        state.install(plan(steps), "build a habit tracker".to_owned());
        state
    }

    #[test]
    fn single_step_plan_never_leaves_idle() {
        let state = installed(&["do everything"]);
        assert!(state.is_idle());
        assert_eq!(state.queue_len(), 0);
    }

    #[test]
    fn multi_step_plan_queues_the_suffix() {
        let state = installed(&["scaffold", "wire state", "style"]);
        assert_eq!(state.state_name(), "planned");
        assert_eq!(state.queue_len(), 2);
        assert!(state.queue_len() <= state.plan().unwrap().len() - 1);
    }

    #[test]
    fn settle_enters_approval_and_names_the_next_step() {
        let mut state = installed(&["scaffold", "wire state", "style"]);
        let prompt = state.settle_after_step().expect("queue is non-empty");
        assert!(state.is_awaiting_approval());
        assert_eq!(prompt.next_step, "wire state");
        assert_eq!(prompt.step_number, 2);
        assert_eq!(prompt.total_steps, 3);
    }

    #[test]
    fn approve_dequeues_one_step_and_advances() {
        let mut state = installed(&["scaffold", "wire state", "style"]);
        state.settle_after_step();

        let ticket = state.approve().expect("approval was pending");
        assert_eq!(state.state_name(), "advancing");
        assert_eq!(ticket.task, "wire state");
        assert_eq!(ticket.step_number, 2);
        assert_eq!(state.queue_len(), 1);
        assert!(ticket.directive.contains("build a habit tracker"));
        assert!(ticket.directive.contains("wire state"));
        assert!(ticket.directive.contains("2/3"));
    }

    #[test]
    fn settle_after_final_step_returns_to_idle() {
        let mut state = installed(&["scaffold", "wire state"]);
        state.settle_after_step();
        state.approve();
        assert_eq!(state.settle_after_step(), None);
        assert!(state.is_idle());
    }

    #[test]
    fn approve_outside_the_gate_is_a_no_op() {
        let mut state = MissionState::new();
        assert!(state.approve().is_none());
        assert!(state.is_idle());

        let mut state = installed(&["a", "b"]);
        assert!(state.approve().is_none(), "planned but gate not open yet");
        assert_eq!(state.state_name(), "planned");
    }

    #[test]
    fn abort_clears_everything_from_any_state() {
        let mut state = installed(&["a", "b", "c"]);
        state.settle_after_step();
        assert_eq!(state.abort(), 2);
        assert!(state.is_idle());
        assert_eq!(state.abort(), 0);
    }

    #[test]
    fn install_supersedes_an_active_mission() {
        let mut state = installed(&["a", "b"]);
        state.settle_after_step();
        state.install(plan(&["x", "y", "z"]), "new objective".to_owned());
        assert_eq!(state.state_name(), "planned");
        assert_eq!(state.queue_len(), 2);
    }
}
