//! # TQV Common Library
//!
//! Shared code for the transcode quality verifier:
//! - Domain model (tasks, markers, proofs, committee members)
//! - Committee wire payloads
//! - Configuration loading and root folder resolution
//! - Logging initialization
//! - Error types and time helpers

pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod time;

pub use error::{Error, Result};
pub use model::{
    AuxiliaryScores, CommitteeMember, Marker, MediaSpec, Proof, SampleScore, Task,
    VerificationStatus, VerifierRole,
};
