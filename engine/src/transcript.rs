//! Append-only chat transcript.
//!
//! Messages are never mutated after creation; the only operation is append.
//! The transcript also produces the recent-history window forwarded to the
//! backend, where directive entries surface as system-originated so the
//! model sees the full instruction chain without them reading as user text.

use atelier_types::{
    AssistantMessage, ChatMessage, DirectiveMessage, HistoryEntry, HistoryRole, ImageAttachment,
    MessageId, NonEmptyString, UserMessage,
};

#[derive(Debug, Default)]
pub struct Transcript {
    entries: Vec<ChatMessage>,
    next_id: u64,
}

impl Transcript {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&mut self) -> MessageId {
        self.next_id += 1;
        MessageId::new(self.next_id)
    }

    pub fn push_user(
        &mut self,
        content: NonEmptyString,
        image: Option<ImageAttachment>,
    ) -> MessageId {
        let id = self.allocate_id();
        self.entries
            .push(ChatMessage::User(UserMessage::new(id, content, image)));
        id
    }

    pub fn push_directive(&mut self, content: NonEmptyString) -> MessageId {
        let id = self.allocate_id();
        self.entries
            .push(ChatMessage::Directive(DirectiveMessage::new(id, content)));
        id
    }

    /// Append an assistant message built around a freshly assigned id.
    pub fn push_assistant(
        &mut self,
        build: impl FnOnce(MessageId) -> AssistantMessage,
    ) -> MessageId {
        let id = self.allocate_id();
        self.entries.push(ChatMessage::Assistant(build(id)));
        id
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `window` entries mapped onto wire roles.
    #[must_use]
    pub fn recent_history(&self, window: usize) -> Vec<HistoryEntry> {
        let start = self.entries.len().saturating_sub(window);
        self.entries[start..]
            .iter()
            .map(|message| {
                let role = match message {
                    ChatMessage::User(_) => HistoryRole::User,
                    ChatMessage::Assistant(_) => HistoryRole::Assistant,
                    ChatMessage::Directive(_) => HistoryRole::System,
                };
                HistoryEntry::new(role, message.content())
            })
            .collect()
    }
}
