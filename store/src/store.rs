//! The file store and its update path.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use similar::{ChangeTag, TextDiff};

use atelier_types::{EditBlock, FileChange, GenerationResult};

use crate::guard::GuardPolicy;
use crate::patch::apply_edit_blocks;

// ============================================================================
// Update inputs
// ============================================================================

/// Who asked for this update. Only automatic (queue-issued) updates pass
/// through the integrity guard; a user explicitly replacing a file with
/// something short is their call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOrigin {
    UserInitiated,
    Automatic,
}

/// The file effects of one generation response: whole-file replacements and
/// per-path edit blocks. Absent maps mean "no change of that kind".
#[derive(Debug, Clone, Default)]
pub struct StoreUpdate {
    pub files: Option<BTreeMap<String, String>>,
    pub diffs: Option<BTreeMap<String, Vec<EditBlock>>>,
}

impl StoreUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.as_ref().is_none_or(BTreeMap::is_empty)
            && self.diffs.as_ref().is_none_or(BTreeMap::is_empty)
    }
}

impl From<&GenerationResult> for StoreUpdate {
    fn from(result: &GenerationResult) -> Self {
        Self {
            files: result.files.clone(),
            diffs: result.diffs.clone(),
        }
    }
}

// ============================================================================
// Apply report
// ============================================================================

/// A whole-file replacement held back by the integrity guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedWrite {
    pub path: String,
    pub existing_len: usize,
    pub incoming_len: usize,
}

/// An edit block whose search text was not found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchMiss {
    pub path: String,
    pub block_index: usize,
}

/// What one [`FileStore::apply`] actually did.
#[derive(Debug, Clone, Default)]
pub struct ApplyReport {
    /// Paths whose content changed.
    pub written: Vec<String>,
    /// Guard rejections (automatic updates only).
    pub rejected: Vec<RejectedWrite>,
    /// Edit blocks that found nothing to replace.
    pub patch_misses: Vec<PatchMiss>,
    /// Per-file line stats for the written paths, for transcript display.
    pub changes: Vec<FileChange>,
}

impl ApplyReport {
    /// True when the batch carried updates and the guard held back every one
    /// of them. This is the only integrity outcome the coordinator surfaces
    /// to the user (as a soft toast); individual rejections stay in the logs.
    #[must_use]
    pub fn all_rejected(&self) -> bool {
        self.written.is_empty() && !self.rejected.is_empty()
    }
}

// ============================================================================
// File store
// ============================================================================

/// Mapping from relative forward-slash path to full file content.
///
/// Sorted iteration order makes downstream synthesis deterministic. A path's
/// value is always a complete file; edit fragments never leave the patch
/// merger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileStore {
    files: BTreeMap<String, String>,
}

impl FileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store from a loaded project snapshot.
    #[must_use]
    pub fn from_files(files: BTreeMap<String, String>) -> Self {
        Self { files }
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files.iter().map(|(p, c)| (p.as_str(), c.as_str()))
    }

    /// Copy of the current mapping, taken at the moment of the call.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.files.clone()
    }

    // ------------------------------------------------------------------
    // Direct user edits (no guard; the user is the authority here)
    // ------------------------------------------------------------------

    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.files.remove(path)
    }

    /// Move a file to a new path. Returns false if the source is missing.
    pub fn rename(&mut self, from: &str, to: impl Into<String>) -> bool {
        match self.files.remove(from) {
            Some(content) => {
                self.files.insert(to.into(), content);
                true
            }
            None => false,
        }
    }

    /// Replace the entire mapping (project load / rollback path).
    pub fn replace_all(&mut self, files: BTreeMap<String, String>) {
        self.files = files;
    }

    // ------------------------------------------------------------------
    // Generation-result updates
    // ------------------------------------------------------------------

    /// Merge one response's file effects into the store.
    ///
    /// Whole-file replacements land first, then edit blocks, so a diff that
    /// accompanies a full write for the same path patches the fresh content.
    /// Application is all-or-nothing per path: a rejected path keeps its
    /// previous content entirely, the rest of the batch still applies, and
    /// no intermediate state is ever observable.
    pub fn apply(
        &mut self,
        update: StoreUpdate,
        origin: UpdateOrigin,
        policy: &GuardPolicy,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();

        if let Some(files) = update.files {
            for (path, incoming) in files {
                let existing = self.files.get(&path);
                let guarded = origin == UpdateOrigin::Automatic
                    && existing.is_some_and(|current| policy.flags_truncation(current, &incoming));
                if guarded {
                    let existing_len = existing.map_or(0, String::len);
                    tracing::warn!(
                        path,
                        existing_len,
                        incoming_len = incoming.len(),
                        "integrity guard held back a suspiciously short overwrite"
                    );
                    report.rejected.push(RejectedWrite {
                        path,
                        existing_len,
                        incoming_len: incoming.len(),
                    });
                    continue;
                }

                let before = self.files.get(&path).cloned().unwrap_or_default();
                if before != incoming {
                    record_change(&mut report, &path, &before, &incoming);
                    self.files.insert(path, incoming);
                }
            }
        }

        if let Some(diffs) = update.diffs {
            for (path, blocks) in diffs {
                let Some(current) = self.files.get(&path) else {
                    // Patching a file that does not exist: every block is a
                    // miss and nothing is created.
                    for block_index in 0..blocks.len() {
                        report.patch_misses.push(PatchMiss {
                            path: path.clone(),
                            block_index,
                        });
                    }
                    continue;
                };

                let outcome = apply_edit_blocks(current, &blocks);
                for block_index in outcome.missed {
                    report.patch_misses.push(PatchMiss {
                        path: path.clone(),
                        block_index,
                    });
                }
                if outcome.text != *current {
                    let before = current.clone();
                    record_change(&mut report, &path, &before, &outcome.text);
                    self.files.insert(path, outcome.text);
                }
            }
        }

        if !report.patch_misses.is_empty() {
            tracing::debug!(
                misses = report.patch_misses.len(),
                "some edit blocks found no match"
            );
        }

        report
    }
}

fn record_change(report: &mut ApplyReport, path: &str, before: &str, after: &str) {
    let (additions, deletions) = line_stats(before, after);
    report.written.push(path.to_owned());
    report.changes.push(FileChange {
        path: path.to_owned(),
        additions,
        deletions,
    });
}

/// Added/removed line counts between two versions of a file.
fn line_stats(before: &str, after: &str) -> (u32, u32) {
    let diff = TextDiff::from_lines(before, after);
    let mut additions: u32 = 0;
    let mut deletions: u32 = 0;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => additions += 1,
            ChangeTag::Delete => deletions += 1,
            ChangeTag::Equal => {}
        }
    }
    (additions, deletions)
}
