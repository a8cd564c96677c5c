//! Ledger contract bindings
//!
//! The ledger assigns tasks, records verifier proofs and names the current
//! committee leader. `Ledger` is the seam; `RestLedgerClient` talks to a
//! ledger gateway over HTTP.

pub mod rest_client;

pub use rest_client::RestLedgerClient;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tqv_common::{Proof, Task, VerificationStatus};

/// Ledger errors
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Ledger error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl LedgerError {
    /// Network failures and 5xx responses may succeed on a later attempt
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::NetworkError(_) => true,
            LedgerError::ApiError(status, _) => *status >= 500,
            LedgerError::ParseError(_) => false,
        }
    }
}

/// Read and write methods of the task ledger contract
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Tasks assigned to `verifier_id`, optionally only those it has not verified yet
    async fn assigned_tasks(
        &self,
        verifier_id: &str,
        unverified_only: bool,
    ) -> Result<Vec<Task>, LedgerError>;

    async fn task(&self, task_id: &str) -> Result<Option<Task>, LedgerError>;

    /// Proof another verifier submitted for a task
    async fn verifier_proof(
        &self,
        task_id: &str,
        verifier_id: &str,
    ) -> Result<Option<Proof>, LedgerError>;

    async fn task_proofs(&self, task_id: &str) -> Result<Vec<Proof>, LedgerError>;

    async fn verification_status(&self, task_id: &str) -> Result<VerificationStatus, LedgerError>;

    async fn consensus_proof(&self, task_id: &str) -> Result<Option<Proof>, LedgerError>;

    /// Id of the current committee leader, if one is elected
    async fn committee_leader(&self) -> Result<Option<String>, LedgerError>;

    /// Submit this verifier's proof; returns whether the ledger accepted it
    async fn submit_proof(&self, proof: &Proof) -> Result<bool, LedgerError>;

    async fn request_supplemental_verifier(&self, task_id: &str) -> Result<(), LedgerError>;
}

/// Where the dispatcher gets new work from
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// Newly assigned tasks this verifier has not verified yet
    async fn fetch_assigned(&self) -> Result<Vec<Task>, LedgerError>;
}

/// `TaskSource` backed by the ledger's assignment query
pub struct LedgerTaskSource {
    ledger: Arc<dyn Ledger>,
    verifier_id: String,
}

impl LedgerTaskSource {
    pub fn new(ledger: Arc<dyn Ledger>, verifier_id: impl Into<String>) -> Self {
        Self {
            ledger,
            verifier_id: verifier_id.into(),
        }
    }
}

#[async_trait]
impl TaskSource for LedgerTaskSource {
    async fn fetch_assigned(&self) -> Result<Vec<Task>, LedgerError> {
        self.ledger.assigned_tasks(&self.verifier_id, true).await
    }
}
