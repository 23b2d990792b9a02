//! Chat transcript model.
//!
//! Messages form an append-only log. This is a real sum type (not a `Role`
//! tag plus sometimes-meaningful fields): user messages can carry an image,
//! assistant messages can carry a plan, per-file change stats and an
//! approval prompt, and directive messages exist only so automatic steps
//! stay visible to the backend without masquerading as user input.

use std::time::SystemTime;

use base64::Engine as _;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{MessageId, NonEmptyString, Plan};

// ============================================================================
// Attachments & per-message payloads
// ============================================================================

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("image mime type must not be empty")]
    EmptyMimeType,
}

/// A staged image forwarded to the backend alongside a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageAttachment {
    data: String,
    mime_type: String,
}

impl ImageAttachment {
    /// Validate a base64 payload and mime type into an attachment.
    pub fn new(data: impl Into<String>, mime_type: impl Into<String>) -> Result<Self, ImageError> {
        let data = data.into();
        let mime_type = mime_type.into();
        if mime_type.trim().is_empty() {
            return Err(ImageError::EmptyMimeType);
        }
        base64::engine::general_purpose::STANDARD.decode(&data)?;
        Ok(Self { data, mime_type })
    }

    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }
}

/// Per-file change stats attached to an assistant message for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub additions: u32,
    pub deletions: u32,
}

/// Marks an assistant message as blocking on a yes/no decision, naming the
/// next queued step it would unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalPrompt {
    pub next_step: String,
    /// 1-based position the next step would occupy within the plan.
    pub step_number: usize,
    pub total_steps: usize,
}

// ============================================================================
// Message variants
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    id: MessageId,
    content: NonEmptyString,
    image: Option<ImageAttachment>,
    timestamp: SystemTime,
}

impl UserMessage {
    #[must_use]
    pub fn new(id: MessageId, content: NonEmptyString, image: Option<ImageAttachment>) -> Self {
        Self {
            id,
            content,
            image,
            timestamp: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    #[must_use]
    pub fn image(&self) -> Option<&ImageAttachment> {
        self.image.as_ref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantMessage {
    id: MessageId,
    content: NonEmptyString,
    plan: Option<Plan>,
    changes: Vec<FileChange>,
    approval: Option<ApprovalPrompt>,
    timestamp: SystemTime,
}

impl AssistantMessage {
    #[must_use]
    pub fn new(id: MessageId, content: NonEmptyString) -> Self {
        Self {
            id,
            content,
            plan: None,
            changes: Vec::new(),
            approval: None,
            timestamp: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn with_plan(mut self, plan: Plan) -> Self {
        self.plan = Some(plan);
        self
    }

    #[must_use]
    pub fn with_changes(mut self, changes: Vec<FileChange>) -> Self {
        self.changes = changes;
        self
    }

    #[must_use]
    pub fn with_approval(mut self, prompt: ApprovalPrompt) -> Self {
        self.approval = Some(prompt);
        self
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }

    #[must_use]
    pub fn plan(&self) -> Option<&Plan> {
        self.plan.as_ref()
    }

    #[must_use]
    pub fn changes(&self) -> &[FileChange] {
        &self.changes
    }

    #[must_use]
    pub fn approval(&self) -> Option<&ApprovalPrompt> {
        self.approval.as_ref()
    }
}

/// Internal control message issued for an automatic step.
///
/// Kept in the transcript so the backend sees the full chain of
/// instructions, but presented as system-originated, never as user input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectiveMessage {
    id: MessageId,
    content: NonEmptyString,
    timestamp: SystemTime,
}

impl DirectiveMessage {
    #[must_use]
    pub fn new(id: MessageId, content: NonEmptyString) -> Self {
        Self {
            id,
            content,
            timestamp: SystemTime::now(),
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        self.content.as_str()
    }
}

/// A complete transcript entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ChatMessage {
    User(UserMessage),
    Assistant(AssistantMessage),
    Directive(DirectiveMessage),
}

impl ChatMessage {
    #[must_use]
    pub fn id(&self) -> MessageId {
        match self {
            Self::User(m) => m.id,
            Self::Assistant(m) => m.id,
            Self::Directive(m) => m.id,
        }
    }

    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::User(m) => m.content(),
            Self::Assistant(m) => m.content(),
            Self::Directive(m) => m.content(),
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> SystemTime {
        match self {
            Self::User(m) => m.timestamp,
            Self::Assistant(m) => m.timestamp,
            Self::Directive(m) => m.timestamp,
        }
    }

    /// Whether this message is blocking on a yes/no decision.
    #[must_use]
    pub fn is_approval(&self) -> bool {
        matches!(self, Self::Assistant(m) if m.approval.is_some())
    }
}
