//! Approval reply interpretation.
//!
//! While the mission machine is awaiting approval, the next user message is
//! interpreted as a yes/no decision. The affirmative vocabulary is an
//! explicit, testable enumeration rather than ad hoc string comparisons, so
//! it can be swapped for a localized set without touching control flow.

/// Replies accepted as approval, compared case-insensitively after trimming
/// surrounding whitespace and trailing punctuation.
pub const AFFIRMATIVE_TOKENS: &[&str] = &[
    "yes",
    "y",
    "yes please",
    "yep",
    "ok",
    "okay",
    "sure",
    "proceed",
    "continue",
    "go ahead",
    "do it",
    "approved",
];

/// Outcome of interpreting a reply to an approval prompt.
///
/// Anything that is not an affirmative token declines: a decline must never
/// be guessable, while an approval must be deliberate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalVerdict {
    Affirmed,
    Declined,
}

impl ApprovalVerdict {
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        let normalized = reply
            .trim()
            .trim_end_matches(['.', '!'])
            .trim()
            .to_lowercase();
        if AFFIRMATIVE_TOKENS.contains(&normalized.as_str()) {
            Self::Affirmed
        } else {
            Self::Declined
        }
    }

    #[must_use]
    pub fn is_affirmed(self) -> bool {
        matches!(self, Self::Affirmed)
    }
}
