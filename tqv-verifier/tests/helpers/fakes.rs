//! In-memory stand-ins for the media tool, content store and ledger

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tqv_common::{MediaSpec, Proof, Task, VerificationStatus};
use tqv_verifier::ledger::{Ledger, LedgerError};
use tqv_verifier::services::{ContentStore, ContentStoreError, MediaTool, MediaToolError};

// ============================================================================
// Media tool
// ============================================================================

/// Writes `segment_NNNN.ts` files and scores candidates by file name
#[derive(Default)]
pub struct FakeMediaTool {
    /// Candidate segment file name -> score; unknown names fail the tool
    pub scores: HashMap<String, f64>,
    /// Input file name -> segment indices to leave out
    pub skip: HashMap<String, Vec<usize>>,
    pub segment_calls: AtomicUsize,
    pub quality_calls: AtomicUsize,
}

impl FakeMediaTool {
    pub fn with_scores(scores: &[(usize, f64)]) -> Self {
        Self {
            scores: scores
                .iter()
                .map(|&(index, score)| (format!("segment_{:04}.ts", index), score))
                .collect(),
            ..Default::default()
        }
    }

    pub fn skipping(mut self, input_name: &str, indices: &[usize]) -> Self {
        self.skip.insert(input_name.to_string(), indices.to_vec());
        self
    }
}

#[async_trait]
impl MediaTool for FakeMediaTool {
    async fn segment(
        &self,
        input: &Path,
        cut_points: &[f64],
        output_dir: &Path,
    ) -> Result<Vec<PathBuf>, MediaToolError> {
        self.segment_calls.fetch_add(1, Ordering::SeqCst);
        let bytes = tokio::fs::read(input).await?;
        let name = input
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let skip = self.skip.get(&name).cloned().unwrap_or_default();

        tokio::fs::create_dir_all(output_dir).await?;
        let mut produced = Vec::new();
        for index in 0..=cut_points.len() {
            if skip.contains(&index) {
                continue;
            }
            let path = output_dir.join(format!("segment_{:04}.ts", index));
            let mut content = bytes.clone();
            content.extend_from_slice(format!("|segment {}", index).as_bytes());
            tokio::fs::write(&path, content).await?;
            produced.push(path);
        }
        Ok(produced)
    }

    async fn quality(&self, _reference: &Path, candidate: &Path) -> Result<f64, MediaToolError> {
        self.quality_calls.fetch_add(1, Ordering::SeqCst);
        let name = candidate
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        self.scores
            .get(&name)
            .copied()
            .ok_or_else(|| MediaToolError::ToolFailed(format!("no score for {}", name)))
    }

    async fn probe(&self, _input: &Path) -> Result<MediaSpec, MediaToolError> {
        Ok(MediaSpec {
            codec: "h264".to_string(),
            resolution: "1920x1080".to_string(),
            bitrate: 5_000_000,
            framerate: 30.0,
        })
    }
}

// ============================================================================
// Content store
// ============================================================================

/// Serves every content id as a small asset file named after the id
#[derive(Default)]
pub struct FakeContentStore {
    pub fetches: Mutex<Vec<String>>,
}

impl FakeContentStore {
    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }
}

#[async_trait]
impl ContentStore for FakeContentStore {
    async fn fetch(&self, content_id: &str, dest_dir: &Path) -> Result<PathBuf, ContentStoreError> {
        self.fetches.lock().unwrap().push(content_id.to_string());
        tokio::fs::create_dir_all(dest_dir).await?;
        let path = dest_dir.join(content_id);
        tokio::fs::write(&path, format!("asset:{}", content_id)).await?;
        Ok(path)
    }
}

// ============================================================================
// Ledger
// ============================================================================

/// Ledger holding assigned tasks and recording submitted proofs
#[derive(Default)]
pub struct FakeLedger {
    pub tasks: Mutex<Vec<Task>>,
    pub submitted: Mutex<Vec<Proof>>,
    pub leader: Mutex<Option<String>>,
    pub supplemental_requests: Mutex<Vec<String>>,
    pub assigned_calls: AtomicUsize,
}

impl FakeLedger {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Default::default()
        }
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.task_id.clone())
            .collect()
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    async fn assigned_tasks(
        &self,
        _verifier_id: &str,
        unverified_only: bool,
    ) -> Result<Vec<Task>, LedgerError> {
        self.assigned_calls.fetch_add(1, Ordering::SeqCst);
        let submitted = self.submitted_ids();
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !unverified_only || !submitted.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn task(&self, task_id: &str) -> Result<Option<Task>, LedgerError> {
        Ok(self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == task_id)
            .cloned())
    }

    async fn verifier_proof(
        &self,
        task_id: &str,
        verifier_id: &str,
    ) -> Result<Option<Proof>, LedgerError> {
        Ok(self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.task_id == task_id && p.verifier_id == verifier_id)
            .cloned())
    }

    async fn task_proofs(&self, task_id: &str) -> Result<Vec<Proof>, LedgerError> {
        Ok(self
            .submitted
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.task_id == task_id)
            .cloned()
            .collect())
    }

    async fn verification_status(&self, task_id: &str) -> Result<VerificationStatus, LedgerError> {
        let proofs = self.task_proofs(task_id).await?;
        Ok(VerificationStatus {
            task_id: task_id.to_string(),
            verified: !proofs.is_empty(),
            proof_count: proofs.len() as u32,
            consensus_score: proofs.first().map(|p| p.overall_score),
        })
    }

    async fn consensus_proof(&self, task_id: &str) -> Result<Option<Proof>, LedgerError> {
        Ok(self.task_proofs(task_id).await?.into_iter().next())
    }

    async fn committee_leader(&self) -> Result<Option<String>, LedgerError> {
        Ok(self.leader.lock().unwrap().clone())
    }

    async fn submit_proof(&self, proof: &Proof) -> Result<bool, LedgerError> {
        self.submitted.lock().unwrap().push(proof.clone());
        Ok(true)
    }

    async fn request_supplemental_verifier(&self, task_id: &str) -> Result<(), LedgerError> {
        self.supplemental_requests
            .lock()
            .unwrap()
            .push(task_id.to_string());
        Ok(())
    }
}
