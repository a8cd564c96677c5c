//! # tqv-verifier
//!
//! Verification node for the transcoding marketplace. Pulls assigned tasks
//! from the ledger, samples source and transcoded assets at the task's
//! markers, scores each sample pair and delivers a signed proof to the
//! ledger and the consensus committee.

pub mod committee;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod ledger;
pub mod pipeline;
pub mod services;
pub mod utils;

pub use committee::{BroadcastReport, CommitteeBroadcaster};
pub use config::VerifierConfig;
pub use dispatcher::{PollOutcome, TaskDispatcher, TaskProcessor};
pub use pipeline::{PipelineError, PipelineOutcome, PipelineSettings, VerificationPipeline};
