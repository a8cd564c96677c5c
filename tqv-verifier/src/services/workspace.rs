//! Per-task working directory
//!
//! Layout: `{root}/work/{task_id}/{source|candidate}/` for downloaded assets,
//! with a `segments/` subdirectory for extracted segments. The whole task
//! directory is removed when the task ends, whatever the outcome.

use std::path::{Path, PathBuf};
use tqv_common::{Error, Result};

/// Which side of the comparison an asset belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRole {
    Source,
    Candidate,
}

impl AssetRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetRole::Source => "source",
            AssetRole::Candidate => "candidate",
        }
    }
}

/// Working directory owned by one pipeline run
#[derive(Debug)]
pub struct TaskWorkspace {
    task_dir: PathBuf,
}

impl TaskWorkspace {
    /// Create `{work_root}/{task_id}` and the role subdirectories
    pub async fn create(work_root: &Path, task_id: &str) -> Result<Self> {
        let task_dir = work_root.join(sanitize_component(task_id)?);

        // Leftovers from a crashed run must not leak into this one
        if tokio::fs::try_exists(&task_dir).await? {
            tracing::warn!(dir = %task_dir.display(), "Removing stale task workspace");
            tokio::fs::remove_dir_all(&task_dir).await?;
        }

        for role in [AssetRole::Source, AssetRole::Candidate] {
            tokio::fs::create_dir_all(task_dir.join(role.as_str()).join("segments")).await?;
        }

        Ok(Self { task_dir })
    }

    pub fn path(&self) -> &Path {
        &self.task_dir
    }

    /// Directory for a downloaded asset
    pub fn asset_dir(&self, role: AssetRole) -> PathBuf {
        self.task_dir.join(role.as_str())
    }

    /// Directory for an asset's extracted segments
    pub fn segments_dir(&self, role: AssetRole) -> PathBuf {
        self.asset_dir(role).join("segments")
    }

    /// Delete the task directory and everything in it
    pub async fn cleanup(self) {
        match tokio::fs::remove_dir_all(&self.task_dir).await {
            Ok(()) => tracing::debug!(dir = %self.task_dir.display(), "Task workspace removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                dir = %self.task_dir.display(),
                error = %e,
                "Failed to remove task workspace"
            ),
        }
    }
}

/// Make an external identifier safe to use as a single path component
pub fn sanitize_component(raw: &str) -> Result<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(Error::InvalidInput(format!(
            "identifier '{}' cannot be used as a path component",
            raw
        )));
    }
    Ok(cleaned)
}
