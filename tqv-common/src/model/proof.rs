//! Quality proofs and the committee wire payload

use super::marker::Marker;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Encoding parameters of the candidate asset
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MediaSpec {
    /// Codec name, e.g. "h264"
    pub codec: String,
    /// Resolution as "WIDTHxHEIGHT"
    pub resolution: String,
    /// Bits per second
    pub bitrate: u64,
    /// Frames per second
    pub framerate: f64,
}

/// Per-sample quality result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleScore {
    pub marker: Marker,
    pub score: f64,
    /// SHA-256 hex digest of the candidate segment bytes
    pub fingerprint: String,
}

/// Scores for dimensions other than video quality
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AuxiliaryScores {
    pub audio: f64,
    pub sync: f64,
}

/// Aggregate quality claim a verifier produces for a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    pub task_id: String,
    pub verifier_id: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub media_spec: MediaSpec,
    /// Arithmetic mean of `sample_scores[*].score`
    pub overall_score: f64,
    pub sample_scores: Vec<SampleScore>,
    pub auxiliary: AuxiliaryScores,
    /// Opaque signature produced by the configured signer
    pub signature: String,
}

impl Proof {
    /// Bytes covered by the signature: the proof serialized with an empty
    /// signature field
    pub fn signing_payload(&self) -> Result<Vec<u8>> {
        let mut unsigned = self.clone();
        unsigned.signature.clear();
        Ok(serde_json::to_vec(&unsigned)?)
    }
}

/// Body of `POST {member}/proof` and friends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofPayload {
    pub task_id: String,
    pub verifier_id: String,
    pub timestamp: i64,
    pub media_specs: MediaSpecsPayload,
    pub video_quality_data: VideoQualityPayload,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSpecsPayload {
    pub codec: String,
    pub resolution: String,
    pub bitrate: u64,
    pub framerate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoQualityPayload {
    pub overall_score: f64,
    pub gop_scores: Vec<GopScorePayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GopScorePayload {
    pub timestamp: f64,
    pub vmaf_score: f64,
    pub hash: String,
}

impl From<&Proof> for ProofPayload {
    fn from(proof: &Proof) -> Self {
        Self {
            task_id: proof.task_id.clone(),
            verifier_id: proof.verifier_id.clone(),
            timestamp: proof.timestamp,
            media_specs: MediaSpecsPayload {
                codec: proof.media_spec.codec.clone(),
                resolution: proof.media_spec.resolution.clone(),
                bitrate: proof.media_spec.bitrate,
                framerate: proof.media_spec.framerate,
            },
            video_quality_data: VideoQualityPayload {
                overall_score: proof.overall_score,
                gop_scores: proof
                    .sample_scores
                    .iter()
                    .map(|s| GopScorePayload {
                        timestamp: s.marker.seconds(),
                        vmaf_score: s.score,
                        hash: s.fingerprint.clone(),
                    })
                    .collect(),
            },
            signature: proof.signature.clone(),
        }
    }
}

/// Aggregate verification state of a task as reported by the ledger
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationStatus {
    pub task_id: String,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub proof_count: u32,
    #[serde(default)]
    pub consensus_score: Option<f64>,
}
