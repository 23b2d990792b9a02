//! Atelier orchestration core.
//!
//! Turns a single user request into a potentially long chain of generation
//! calls while keeping a human in the loop. The moving parts:
//!
//! - [`Session`]: the coordinator owning all orchestration state and the
//!   single-flight guard around the backend call;
//! - [`MissionState`]: the plan/queue state machine with its explicit
//!   approval gate between automatic steps;
//! - [`Transcript`] and [`NoticeQueue`]: the append-only chat log and the
//!   ephemeral toast sink;
//! - [`ProjectStore`]: the best-effort persistence collaborator, with a
//!   filesystem implementation in [`FsProjectStore`];
//! - [`EngineConfig`]: guard thresholds, auto-advance delay, history
//!   window, entry path.
//!
//! The file store itself lives in `atelier-store`, document synthesis in
//! `atelier-synth`, and the backend contract in `atelier-providers`; this
//! crate ties them together.

mod config;
mod mission;
mod notices;
mod persistence;
mod session;
mod transcript;

pub use config::{ConfigError, EngineConfig};
pub use mission::{Mission, MissionState, StepTicket};
pub use notices::{Notice, NoticeLevel, NoticeQueue};
pub use persistence::{FsProjectStore, ProjectDocument, ProjectStore};
pub use session::{
    Begin, DropReason, ProjectIdentity, ReplyDisposition, RequestOrigin, Session, StepReport,
    SubmitOutcome,
};
pub use transcript::Transcript;
