//! Ledger gateway HTTP client

use super::{Ledger, LedgerError};
use crate::utils::{retry_with_backoff_if, RetryPolicy};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tqv_common::{Proof, Task, VerificationStatus};

const USER_AGENT: &str = concat!("tqv-verifier/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    accepted: bool,
}

#[derive(Debug, Deserialize)]
struct LeaderResponse {
    leader: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SupplementalRequest<'a> {
    task_id: &'a str,
}

/// JSON client for the ledger gateway
pub struct RestLedgerClient {
    http_client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl RestLedgerClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, LedgerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LedgerError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET returning `None` on 404
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, LedgerError> {
        let url = self.url(path);
        retry_with_backoff_if(
            "ledger read",
            &self.retry,
            || async {
                let response = match self.http_client.get(&url).send().await {
                    Ok(response) => response,
                    Err(e) => return Err(LedgerError::NetworkError(e.to_string())),
                };

                let status = response.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                if !status.is_success() {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(LedgerError::ApiError(status.as_u16(), error_text));
                }

                response
                    .json::<T>()
                    .await
                    .map(Some)
                    .map_err(|e| LedgerError::ParseError(e.to_string()))
            },
            LedgerError::is_transient,
        )
        .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
        self.get_optional(path)
            .await?
            .ok_or_else(|| LedgerError::ApiError(404, format!("{} not found", path)))
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, LedgerError> {
        let url = self.url(path);
        retry_with_backoff_if(
            "ledger write",
            &self.retry,
            || async {
                let response = match self.http_client.post(&url).json(body).send().await {
                    Ok(response) => response,
                    Err(e) => return Err(LedgerError::NetworkError(e.to_string())),
                };

                let status = response.status();
                if !status.is_success() {
                    let error_text = response.text().await.unwrap_or_default();
                    return Err(LedgerError::ApiError(status.as_u16(), error_text));
                }

                response
                    .json::<T>()
                    .await
                    .map_err(|e| LedgerError::ParseError(e.to_string()))
            },
            LedgerError::is_transient,
        )
        .await
    }
}

#[async_trait]
impl Ledger for RestLedgerClient {
    async fn assigned_tasks(
        &self,
        verifier_id: &str,
        unverified_only: bool,
    ) -> Result<Vec<Task>, LedgerError> {
        let entries: Vec<serde_json::Value> = self
            .get(&format!(
                "/verifiers/{}/tasks?unverified={}",
                verifier_id, unverified_only
            ))
            .await?;

        // A malformed entry drops only that task
        let received = entries.len();
        let tasks: Vec<Task> = entries
            .into_iter()
            .filter_map(|entry| {
                let id = entry.get("id").and_then(|v| v.as_str()).map(str::to_string);
                match serde_json::from_value::<Task>(entry) {
                    Ok(task) => Some(task),
                    Err(e) => {
                        tracing::warn!(
                            verifier_id,
                            task_id = id.as_deref().unwrap_or("<unknown>"),
                            error = %e,
                            "Dropping malformed assigned task"
                        );
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(verifier_id, received, count = tasks.len(), "Fetched assigned tasks");
        Ok(tasks)
    }

    async fn task(&self, task_id: &str) -> Result<Option<Task>, LedgerError> {
        self.get_optional(&format!("/tasks/{}", task_id)).await
    }

    async fn verifier_proof(
        &self,
        task_id: &str,
        verifier_id: &str,
    ) -> Result<Option<Proof>, LedgerError> {
        self.get_optional(&format!("/tasks/{}/proofs/{}", task_id, verifier_id))
            .await
    }

    async fn task_proofs(&self, task_id: &str) -> Result<Vec<Proof>, LedgerError> {
        Ok(self
            .get_optional(&format!("/tasks/{}/proofs", task_id))
            .await?
            .unwrap_or_default())
    }

    async fn verification_status(&self, task_id: &str) -> Result<VerificationStatus, LedgerError> {
        self.get(&format!("/tasks/{}/status", task_id)).await
    }

    async fn consensus_proof(&self, task_id: &str) -> Result<Option<Proof>, LedgerError> {
        self.get_optional(&format!("/tasks/{}/consensus", task_id))
            .await
    }

    async fn committee_leader(&self) -> Result<Option<String>, LedgerError> {
        let response: Option<LeaderResponse> = self.get_optional("/committee/leader").await?;
        Ok(response.and_then(|r| r.leader))
    }

    async fn submit_proof(&self, proof: &Proof) -> Result<bool, LedgerError> {
        let response: SubmitResponse = self
            .post(&format!("/tasks/{}/proofs", proof.task_id), proof)
            .await?;

        tracing::info!(
            task_id = %proof.task_id,
            accepted = response.accepted,
            "Proof submitted to ledger"
        );
        Ok(response.accepted)
    }

    async fn request_supplemental_verifier(&self, task_id: &str) -> Result<(), LedgerError> {
        let _: serde_json::Value = self
            .post(
                &format!("/tasks/{}/supplemental", task_id),
                &SupplementalRequest { task_id },
            )
            .await?;
        tracing::info!(task_id, "Supplemental verifier requested");
        Ok(())
    }
}
