//! Request/response contract spoken with the generation backend.
//!
//! Field names are camelCase on the wire. Every optional response field is
//! genuinely optional: absence means "no change in this dimension", never
//! "overwrite with nothing". Deserialization must not conflate a missing
//! `files` map with an empty one that erases the project.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ImageAttachment, ProjectConfig};

// ============================================================================
// Edit blocks
// ============================================================================

/// One textual substitution to apply to a named file's current content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditBlock {
    pub search: String,
    pub replace: String,
}

impl EditBlock {
    #[must_use]
    pub fn new(search: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            search: search.into(),
            replace: replace.into(),
        }
    }
}

// ============================================================================
// Request
// ============================================================================

/// Role tag for transcript entries serialized onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryRole {
    User,
    Assistant,
    /// Internal directives issued by the queue machine; the backend sees
    /// them for continuity but they are not user-originated.
    System,
}

/// One transcript entry as forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: HistoryRole,
    pub content: String,
}

impl HistoryEntry {
    #[must_use]
    pub fn new(role: HistoryRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Outbound generation request.
///
/// `current_files` is the snapshot taken from the authoritative store at the
/// moment the request is constructed, never a copy captured earlier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt_text: String,
    pub current_files: BTreeMap<String, String>,
    pub recent_history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageAttachment>,
    pub config: ProjectConfig,
}

// ============================================================================
// Response
// ============================================================================

/// Inbound generation result. Any field may be omitted by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationResult {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diffs: Option<BTreeMap<String, Vec<EditBlock>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub questions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl GenerationResult {
    /// A bare answer with no file effects (common in conversational replies).
    #[must_use]
    pub fn answering(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_plan(mut self, steps: Vec<String>) -> Self {
        self.plan = Some(steps);
        self
    }

    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files
            .get_or_insert_with(BTreeMap::new)
            .insert(path.into(), content.into());
        self
    }

    #[must_use]
    pub fn with_diff(mut self, path: impl Into<String>, blocks: Vec<EditBlock>) -> Self {
        self.diffs
            .get_or_insert_with(BTreeMap::new)
            .insert(path.into(), blocks);
        self
    }
}
