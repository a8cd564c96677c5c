//! Verification pipeline
//!
//! One run per task:
//!
//! 1. Validate the task (no selected markers fails here, before any download)
//! 2. Fetch source and candidate into a fresh task workspace
//! 3. Split both at `union(markers, sample_markers)`
//! 4. Score every selected marker present on both sides
//! 5. Aggregate into a signed `Proof`
//! 6. Submit to the ledger, then broadcast to the committee
//!
//! The workspace is removed on every exit path.

use crate::committee::{BroadcastReport, CommitteeBroadcaster};
use crate::dispatcher::TaskProcessor;
use crate::ledger::Ledger;
use crate::services::{
    AssetRole, ContentStore, ContentStoreError, ExtractError, MediaTool, MediaToolError, Policies,
    QualityScorer, SampleExtractor, SegmentMap, Signer, TaskWorkspace,
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tqv_common::model::normalize_markers;
use tqv_common::{AuxiliaryScores, Proof, SampleScore, Task};

/// Reasons a task produces no proof
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Workspace error: {0}")]
    Workspace(String),

    #[error("Asset retrieval failed: {0}")]
    Content(#[from] ContentStoreError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("No sample could be scored for task {0}")]
    NoSamples(String),

    #[error("Probe failed: {0}")]
    Probe(#[from] MediaToolError),

    #[error("Proof encoding failed: {0}")]
    Encode(#[from] tqv_common::Error),
}

/// Per-verifier settings of the pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub verifier_id: String,
    /// Parent of the per-task workspaces
    pub work_root: PathBuf,
    /// Calibration offset added to every raw sample score; results below
    /// zero are clamped to zero
    pub score_offset: f64,
}

/// What a successful run produced and where it was delivered
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub proof: Proof,
    /// `None` when the ledger could not be reached
    pub ledger_accepted: Option<bool>,
    pub broadcast: BroadcastReport,
}

/// Verification pipeline service
pub struct VerificationPipeline {
    tool: Arc<dyn MediaTool>,
    extractor: SampleExtractor,
    scorer: QualityScorer,
    content_store: Arc<dyn ContentStore>,
    ledger: Arc<dyn Ledger>,
    broadcaster: Arc<CommitteeBroadcaster>,
    signer: Arc<dyn Signer>,
    settings: PipelineSettings,
}

impl VerificationPipeline {
    pub fn new(
        tool: Arc<dyn MediaTool>,
        content_store: Arc<dyn ContentStore>,
        ledger: Arc<dyn Ledger>,
        broadcaster: Arc<CommitteeBroadcaster>,
        policies: Policies,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            extractor: SampleExtractor::new(Arc::clone(&tool)),
            signer: Arc::clone(&policies.signer),
            scorer: QualityScorer::new(Arc::clone(&tool), policies),
            tool,
            content_store,
            ledger,
            broadcaster,
            settings,
        }
    }

    /// Run one task end to end
    pub async fn verify(&self, task: &Task) -> Result<PipelineOutcome, PipelineError> {
        task.validate()
            .map_err(|e| PipelineError::InvalidTask(e.to_string()))?;

        tracing::info!(
            task_id = %task.id,
            role = ?task.role,
            markers = task.markers.len(),
            samples = task.sample_markers.len(),
            "Verifying task"
        );

        let workspace = TaskWorkspace::create(&self.settings.work_root, &task.id)
            .await
            .map_err(|e| PipelineError::Workspace(e.to_string()))?;

        let result = self.build_proof(task, &workspace).await;
        workspace.cleanup().await;
        let proof = result?;

        let ledger_accepted = match self.ledger.submit_proof(&proof).await {
            Ok(accepted) => Some(accepted),
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "Ledger proof submission failed");
                None
            }
        };

        let broadcast = if task.is_supplemental() {
            self.broadcaster
                .submit_supplementary_proof(&task.id, &proof)
                .await
        } else {
            self.broadcaster.submit_proof(&proof).await
        };

        Ok(PipelineOutcome {
            proof,
            ledger_accepted,
            broadcast,
        })
    }

    async fn build_proof(
        &self,
        task: &Task,
        workspace: &TaskWorkspace,
    ) -> Result<Proof, PipelineError> {
        let reference = self
            .content_store
            .fetch(&task.source_locator, &workspace.asset_dir(AssetRole::Source))
            .await?;
        let candidate = self
            .content_store
            .fetch(&task.candidate_locator, &workspace.asset_dir(AssetRole::Candidate))
            .await?;

        let markers = task.extraction_markers();
        let reference_segments = self
            .extractor
            .split_asset(&reference, &markers, &workspace.segments_dir(AssetRole::Source))
            .await?;
        let candidate_segments = self
            .extractor
            .split_asset(&candidate, &markers, &workspace.segments_dir(AssetRole::Candidate))
            .await?;

        let (sample_scores, auxiliary) = self
            .score_samples(task, &reference_segments, &candidate_segments)
            .await;

        if sample_scores.is_empty() {
            return Err(PipelineError::NoSamples(task.id.clone()));
        }

        let media_spec = self.tool.probe(&candidate).await?;
        let overall_score = mean_score(&sample_scores);

        let mut proof = Proof {
            task_id: task.id.clone(),
            verifier_id: self.settings.verifier_id.clone(),
            timestamp: tqv_common::time::now_millis(),
            media_spec,
            overall_score,
            sample_scores,
            auxiliary,
            signature: String::new(),
        };
        proof.signature = self.signer.sign(&proof.signing_payload()?);

        tracing::info!(
            task_id = %task.id,
            overall_score,
            samples = proof.sample_scores.len(),
            "Proof built"
        );
        Ok(proof)
    }

    /// Score the selected markers, in ascending marker order
    async fn score_samples(
        &self,
        task: &Task,
        reference_segments: &SegmentMap,
        candidate_segments: &SegmentMap,
    ) -> (Vec<SampleScore>, AuxiliaryScores) {
        let mut scores = Vec::new();
        let mut auxiliary = Vec::new();

        for marker in normalize_markers(&task.sample_markers) {
            let (Some(reference), Some(candidate)) =
                (reference_segments.get(&marker), candidate_segments.get(&marker))
            else {
                tracing::warn!(
                    task_id = %task.id,
                    marker = %marker,
                    reference = reference_segments.contains_key(&marker),
                    candidate = candidate_segments.contains_key(&marker),
                    "Sample unavailable, skipping"
                );
                continue;
            };

            let fingerprint = match self.scorer.fingerprint(candidate).await {
                Ok(fingerprint) => fingerprint,
                Err(e) => {
                    tracing::warn!(task_id = %task.id, marker = %marker, error = %e, "Fingerprint failed, skipping sample");
                    continue;
                }
            };

            let evaluation = self.scorer.evaluate(reference, candidate).await;
            let score = calibrate(evaluation.score, self.settings.score_offset);

            tracing::debug!(task_id = %task.id, marker = %marker, score, "Sample scored");
            scores.push(SampleScore {
                marker,
                score,
                fingerprint,
            });
            auxiliary.push(evaluation.auxiliary);
        }

        (scores, mean_auxiliary(&auxiliary))
    }
}

#[async_trait]
impl TaskProcessor for VerificationPipeline {
    async fn process(&self, task: Task) {
        match self.verify(&task).await {
            Ok(outcome) => tracing::info!(
                task_id = %task.id,
                overall_score = outcome.proof.overall_score,
                ledger_accepted = ?outcome.ledger_accepted,
                committee_success = outcome.broadcast.success_count,
                committee_total = outcome.broadcast.total,
                accepted = outcome.broadcast.accepted(),
                "Task verified"
            ),
            Err(e) => tracing::error!(task_id = %task.id, error = %e, "Task dropped"),
        }
    }
}

fn calibrate(raw: f64, offset: f64) -> f64 {
    (raw + offset).max(0.0)
}

/// Arithmetic mean of the sample scores
///
/// Scores are summed in sorted order so the result does not depend on the
/// order samples were scored in.
pub fn mean_score(samples: &[SampleScore]) -> f64 {
    let mut values: Vec<f64> = samples.iter().map(|s| s.score).collect();
    sorted_mean(&mut values)
}

fn mean_auxiliary(values: &[AuxiliaryScores]) -> AuxiliaryScores {
    let mut audio: Vec<f64> = values.iter().map(|a| a.audio).collect();
    let mut sync: Vec<f64> = values.iter().map(|a| a.sync).collect();
    AuxiliaryScores {
        audio: sorted_mean(&mut audio),
        sync: sorted_mean(&mut sync),
    }
}

fn sorted_mean(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use tqv_common::Marker;

    fn sample(marker: f64, score: f64) -> SampleScore {
        SampleScore {
            marker: Marker::new(marker).unwrap(),
            score,
            fingerprint: String::new(),
        }
    }

    #[test]
    fn test_mean_score() {
        let samples = vec![sample(0.0, 92.0), sample(2.27, 95.0), sample(5.13, 97.0)];
        assert!((mean_score(&samples) - 94.667).abs() < 0.001);
    }

    #[test]
    fn test_mean_score_order_independent() {
        let a = vec![sample(0.0, 0.1), sample(1.0, 0.2), sample(2.0, 0.3), sample(3.0, 1e9)];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(mean_score(&a), mean_score(&b));
        // Idempotent
        assert_eq!(mean_score(&a), mean_score(&a));
    }

    #[test]
    fn test_calibrate_clamps_at_zero() {
        assert_eq!(calibrate(90.0, 0.0), 90.0);
        assert_eq!(calibrate(90.0, -5.0), 85.0);
        assert_eq!(calibrate(3.0, -5.0), 0.0);
    }

    #[test]
    fn test_mean_auxiliary() {
        let aux = mean_auxiliary(&[
            AuxiliaryScores { audio: 90.0, sync: 100.0 },
            AuxiliaryScores { audio: 100.0, sync: 100.0 },
        ]);
        assert_eq!(aux.audio, 95.0);
        assert_eq!(aux.sync, 100.0);
        assert_eq!(mean_auxiliary(&[]), AuxiliaryScores::default());
    }
}
