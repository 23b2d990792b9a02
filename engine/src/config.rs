//! Engine configuration.
//!
//! Everything tunable about the orchestration core lives here: the
//! integrity-guard thresholds, the auto-advance delay, the history window
//! forwarded to the backend, and the entry document for synthesis. Loaded
//! from TOML; every field has a default so an empty file is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use atelier_store::GuardPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Truncation thresholds for automatic overwrites.
    pub guard: GuardPolicy,
    /// Pause before an approved automatic step is issued. A scheduling
    /// choice, not a correctness requirement: it lets the host render the
    /// intermediate state and throttles back-to-back backend calls. Zero
    /// disables the pause.
    pub advance_delay: Duration,
    /// How many trailing transcript entries accompany each request.
    pub history_window: usize,
    /// Entry document for synthesis.
    pub entry_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            guard: GuardPolicy::default(),
            advance_delay: Duration::from_secs(2),
            history_window: 20,
            entry_path: atelier_synth::DEFAULT_ENTRY_PATH.to_owned(),
        }
    }
}

/// On-disk shape: all fields optional, kebab-case keys.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
struct EngineConfigFile {
    guard: Option<GuardPolicy>,
    advance_delay_ms: Option<u64>,
    history_window: Option<usize>,
    entry_path: Option<String>,
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        let file: EngineConfigFile = toml::from_str(raw)?;
        let defaults = Self::default();
        Ok(Self {
            guard: file.guard.unwrap_or(defaults.guard),
            advance_delay: file
                .advance_delay_ms
                .map_or(defaults.advance_delay, Duration::from_millis),
            history_window: file.history_window.unwrap_or(defaults.history_window),
            entry_path: file.entry_path.unwrap_or(defaults.entry_path),
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// A config with the auto-advance pause disabled.
    #[must_use]
    pub fn without_advance_delay(mut self) -> Self {
        self.advance_delay = Duration::ZERO;
        self
    }
}
