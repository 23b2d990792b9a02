//! Authoritative project file store.
//!
//! The store is the single source of truth for path → content during an
//! editing session. It is single-writer: generation results land here
//! through [`FileStore::apply`] (guarded against suspicious automatic
//! overwrites), direct user edits go through the explicit edit operations,
//! and everything else (the synthesizer, UI consumers) only reads.
//!
//! Consumers that need a copy take [`FileStore::snapshot`] at the moment
//! they need it; holding a snapshot across a suspension point and writing
//! requests from it is exactly the staleness bug this layer exists to
//! prevent.

mod guard;
mod patch;
mod store;

pub use guard::GuardPolicy;
pub use patch::{PatchOutcome, apply_edit_blocks};
pub use store::{ApplyReport, FileStore, PatchMiss, RejectedWrite, StoreUpdate, UpdateOrigin};
