//! Verification task as assigned by the ledger

use super::marker::{union_markers, Marker};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Role this verifier plays for a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerifierRole {
    /// Originally assigned verifier
    #[default]
    Primary,
    /// Verifier added later; its proof augments or supersedes an earlier one
    Supplemental,
}

/// Verification task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Ledger task identifier
    pub id: String,

    /// Content identifier of the source (reference) asset
    pub source_locator: String,

    /// Content identifier of the transcoded (candidate) asset
    pub candidate_locator: String,

    /// Full set of content boundaries declared for the asset
    #[serde(default)]
    pub markers: Vec<Marker>,

    /// Markers selected for sampling (subset of `markers`, ideally)
    #[serde(default)]
    pub sample_markers: Vec<Marker>,

    /// Verifiers assigned to this task
    #[serde(default)]
    pub verifiers: Vec<String>,

    /// Role flag
    #[serde(default)]
    pub role: VerifierRole,
}

impl Task {
    /// Markers used to cut both assets
    ///
    /// The union of the declared marker set and the selected sample markers,
    /// so every scoring point is cut even when the task under-specifies its
    /// boundaries.
    pub fn extraction_markers(&self) -> Vec<Marker> {
        union_markers(&self.markers, &self.sample_markers)
    }

    /// Check the fields a pipeline run depends on
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidInput("task id is empty".to_string()));
        }
        if self.source_locator.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "task {} has no source asset locator",
                self.id
            )));
        }
        if self.candidate_locator.trim().is_empty() {
            return Err(Error::InvalidInput(format!(
                "task {} has no candidate asset locator",
                self.id
            )));
        }
        if self.sample_markers.is_empty() {
            return Err(Error::InvalidInput(format!(
                "task {} has no selected sample markers",
                self.id
            )));
        }
        Ok(())
    }

    pub fn is_supplemental(&self) -> bool {
        self.role == VerifierRole::Supplemental
    }
}
