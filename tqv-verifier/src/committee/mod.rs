//! Consensus committee client
//!
//! Proofs are delivered to every committee replica over HTTP; status reads
//! prefer the current leader.

pub mod broadcaster;
pub mod membership;

pub use broadcaster::{BroadcastReport, BroadcastSettings, CommitteeBroadcaster, MemberOutcome};
pub use membership::{LedgerMembership, MembershipSource, StaticMembership};

use thiserror::Error;

/// Committee errors
#[derive(Debug, Error)]
pub enum CommitteeError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Unexpected status {0}")]
    UnexpectedStatus(u16),

    #[error("Membership refresh failed: {0}")]
    Membership(String),

    #[error("Delivery task failed: {0}")]
    Join(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Payload encoding failed: {0}")]
    Encode(String),
}

impl CommitteeError {
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            CommitteeError::Timeout
        } else {
            CommitteeError::NetworkError(err.to_string())
        }
    }
}
