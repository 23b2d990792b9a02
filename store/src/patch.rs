//! Search/replace patch application.
//!
//! Exact-text patches are fragile against content that has drifted since the
//! backend last saw it, so a missing `search` string is a recorded no-op,
//! never an error. The caller decides whether to surface misses.

use atelier_types::EditBlock;

/// Result of applying a list of edit blocks to one file's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOutcome {
    pub text: String,
    /// Indexes into the input block list whose `search` was not found
    /// (or was empty) at the time that block was applied.
    pub missed: Vec<usize>,
}

impl PatchOutcome {
    #[must_use]
    pub fn clean(&self) -> bool {
        self.missed.is_empty()
    }
}

/// Apply edit blocks in order against the progressively-updated text.
///
/// Each block replaces the first occurrence of its `search` string. Later
/// blocks see the output of earlier ones, so a block may legitimately match
/// text introduced by a previous `replace`. Pure: no side effects, input
/// untouched.
#[must_use]
pub fn apply_edit_blocks(current: &str, blocks: &[EditBlock]) -> PatchOutcome {
    let mut text = current.to_owned();
    let mut missed = Vec::new();

    for (index, block) in blocks.iter().enumerate() {
        // An empty search would "match" at offset 0 and splice content in
        // front of the file; treat it as a miss instead.
        if block.search.is_empty() || !text.contains(block.search.as_str()) {
            missed.push(index);
            continue;
        }
        text = text.replacen(block.search.as_str(), block.replace.as_str(), 1);
    }

    PatchOutcome { text, missed }
}
