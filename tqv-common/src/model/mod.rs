//! Domain model shared by the verifier and its collaborators

pub mod committee;
pub mod marker;
pub mod proof;
pub mod task;

pub use committee::CommitteeMember;
pub use marker::{markers_from_seconds, normalize_markers, union_markers, Marker};
pub use proof::{
    AuxiliaryScores, GopScorePayload, MediaSpec, MediaSpecsPayload, Proof, ProofPayload,
    SampleScore, VerificationStatus, VideoQualityPayload,
};
pub use task::{Task, VerifierRole};
