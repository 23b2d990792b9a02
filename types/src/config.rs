//! Project configuration pass-through.
//!
//! The orchestration core does not interpret this beyond forwarding it to
//! the generation backend and to the document synthesizer. Unknown fields
//! are preserved verbatim so host-added settings survive a round trip.

use serde::{Deserialize, Serialize};

/// Connectivity descriptor for the generated app's data backend.
///
/// Credentials are forwarded into the synthesized document, never validated
/// here. `Debug` redacts the key to keep it out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCredentials {
    pub url: String,
    pub key: String,
}

impl std::fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("url", &self.url)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Opaque project identity and credentials bag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    pub app_name: String,
    pub package_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendCredentials>,
    /// Host-defined settings carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ProjectConfig {
    #[must_use]
    pub fn new(app_name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
            package_name: package_name.into(),
            backend: None,
            extra: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with_backend(mut self, url: impl Into<String>, key: impl Into<String>) -> Self {
        self.backend = Some(BackendCredentials {
            url: url.into(),
            key: key.into(),
        });
        self
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self::new("Atelier App", "app.atelier.studio")
    }
}
