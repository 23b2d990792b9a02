//! Project persistence collaborator.
//!
//! Persistence is strictly best-effort from the orchestration core's point
//! of view: a failed write is logged and never rolls back in-memory state
//! or interrupts the generation chain. The trait is the consumed contract;
//! [`FsProjectStore`] is the shipped filesystem implementation, writing
//! JSON documents with a temp-file + rename so a crash mid-write can never
//! leave a half-written project behind.

use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use atelier_types::ProjectConfig;

/// Asynchronous project persistence.
pub trait ProjectStore: Send + Sync + 'static {
    fn update_project(
        &self,
        user_id: String,
        project_id: String,
        files: BTreeMap<String, String>,
        config: ProjectConfig,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn create_snapshot(
        &self,
        project_id: String,
        files: BTreeMap<String, String>,
        label: String,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// The persisted shape of a project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub files: BTreeMap<String, String>,
    pub config: ProjectConfig,
}

/// Filesystem-backed [`ProjectStore`].
///
/// Layout under the root:
/// `<root>/projects/<user>/<project>/project.json` and
/// `<root>/snapshots/<project>/<timestamp>-<label>.json`.
#[derive(Debug, Clone)]
pub struct FsProjectStore {
    root: PathBuf,
}

impl FsProjectStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn project_path(&self, user_id: &str, project_id: &str) -> anyhow::Result<PathBuf> {
        Ok(self
            .root
            .join("projects")
            .join(safe_component(user_id)?)
            .join(safe_component(project_id)?)
            .join("project.json"))
    }

    /// Read a previously persisted project back (session seeding).
    pub fn load_project(&self, user_id: &str, project_id: &str) -> anyhow::Result<ProjectDocument> {
        let path = self.project_path(user_id, project_id)?;
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
    }
}

impl ProjectStore for FsProjectStore {
    async fn update_project(
        &self,
        user_id: String,
        project_id: String,
        files: BTreeMap<String, String>,
        config: ProjectConfig,
    ) -> anyhow::Result<()> {
        let path = self.project_path(&user_id, &project_id)?;
        let document = ProjectDocument { files, config };
        let bytes = serde_json::to_vec_pretty(&document)?;
        atomic_write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(project_id, "project persisted");
        Ok(())
    }

    async fn create_snapshot(
        &self,
        project_id: String,
        files: BTreeMap<String, String>,
        label: String,
    ) -> anyhow::Result<()> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.3fZ");
        let file_name = format!("{stamp}-{}.json", slugify(&label));
        let path = self
            .root
            .join("snapshots")
            .join(safe_component(&project_id)?)
            .join(file_name);
        let document = ProjectDocument {
            files,
            config: ProjectConfig::default(),
        };
        let bytes = serde_json::to_vec_pretty(&document)?;
        atomic_write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// Reject identifiers that could escape the store's directory layout.
fn safe_component(value: &str) -> anyhow::Result<&str> {
    if value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\', '\0'])
    {
        anyhow::bail!("unsafe path component: {value:?}");
    }
    Ok(value)
}

/// Keep snapshot labels filesystem-friendly.
fn slugify(label: &str) -> String {
    let slug: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    if slug.is_empty() { "snapshot".to_owned() } else { slug }
}

/// Temp file in the destination directory, then rename over the target.
fn atomic_write(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
