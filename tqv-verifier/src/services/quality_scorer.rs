//! Segment quality scoring and fingerprinting
//!
//! Quality comes from the external media tool. Tool failures score the
//! floor value instead of failing, so one bad segment never aborts a task.

use crate::services::media_tool::MediaTool;
use crate::services::policy::Policies;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tqv_common::{AuxiliaryScores, Error, Result};

/// Score reported when the quality tool fails
pub const SCORE_FLOOR: f64 = 0.0;

/// Video score plus auxiliary scores for one sample pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub auxiliary: AuxiliaryScores,
}

/// Quality scorer service
pub struct QualityScorer {
    tool: Arc<dyn MediaTool>,
    policies: Policies,
}

impl QualityScorer {
    pub fn new(tool: Arc<dyn MediaTool>, policies: Policies) -> Self {
        Self { tool, policies }
    }

    /// Quality of `candidate` against `reference`, or `SCORE_FLOOR` on tool failure
    pub async fn score(&self, reference: &Path, candidate: &Path) -> f64 {
        match self.tool.quality(reference, candidate).await {
            Ok(score) if score.is_finite() => score,
            Ok(score) => {
                tracing::warn!(
                    candidate = %candidate.display(),
                    score,
                    "Quality tool returned a non-finite score, using floor"
                );
                SCORE_FLOOR
            }
            Err(e) => {
                tracing::warn!(
                    reference = %reference.display(),
                    candidate = %candidate.display(),
                    error = %e,
                    "Quality tool failed, using floor score"
                );
                SCORE_FLOOR
            }
        }
    }

    /// Video score plus audio/sync scores from the configured policies
    pub async fn evaluate(&self, reference: &Path, candidate: &Path) -> Evaluation {
        let score = self.score(reference, candidate).await;
        let audio = self.policies.audio.score(reference, candidate).await;
        let sync = self.policies.sync.score(reference, candidate).await;

        tracing::debug!(
            candidate = %candidate.display(),
            score,
            audio,
            sync,
            "Evaluated sample"
        );

        Evaluation {
            score,
            auxiliary: AuxiliaryScores { audio, sync },
        }
    }

    /// SHA-256 of the file bytes, hex encoded (64 characters)
    pub async fn fingerprint(&self, path: &Path) -> Result<String> {
        fingerprint_file(path).await
    }
}

/// SHA-256 of a file, hex encoded
///
/// Reads in 1MB chunks on the blocking pool.
pub async fn fingerprint_file(path: &Path) -> Result<String> {
    let path_buf = path.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<String> {
        use std::fs::File;
        use std::io::Read;

        let mut file = File::open(&path_buf).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to open {} for hashing: {}", path_buf.display(), e),
            ))
        })?;

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 1024 * 1024];

        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(|e| Error::Internal(format!("Hash calculation task failed: {}", e)))?
}
