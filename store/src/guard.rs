//! Truncation heuristic for unattended overwrites.
//!
//! During long autonomous chains a backend occasionally returns a
//! placeholder or summary ("// rest of file unchanged") where real content
//! should be. The guard flags a whole-file replacement as suspect when the
//! existing content is non-trivial and the replacement is drastically
//! shorter. The thresholds are policy, not constants: hosts tune them
//! through configuration.

use serde::{Deserialize, Serialize};

/// Length thresholds for the integrity guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct GuardPolicy {
    /// Existing content longer than this is worth protecting.
    pub min_protected_len: usize,
    /// Incoming content shorter than this looks like a placeholder.
    pub max_suspect_len: usize,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            min_protected_len: 300,
            max_suspect_len: 100,
        }
    }
}

impl GuardPolicy {
    /// Whether replacing `existing` with `incoming` looks like truncation.
    #[must_use]
    pub fn flags_truncation(&self, existing: &str, incoming: &str) -> bool {
        existing.len() > self.min_protected_len && incoming.len() < self.max_suspect_len
    }
}
