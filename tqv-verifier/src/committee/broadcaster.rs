//! Proof delivery to the consensus committee
//!
//! # Delivery
//! Every write fans out to all members at once. Each member gets its own
//! spawned task with its own retry budget; no member's failure cancels
//! another. The call returns once every member task has finished, and the
//! delivery counts as accepted when at least one member answered `202`.
//!
//! # Reads
//! Status queries go to the leader first (with retry), then to each follower
//! in cached order. The first `200` wins; if nobody answers the result is
//! `None`.
//!
//! # Member cache
//! The member list is refreshed on demand, at most once per
//! `refresh_interval`. A non-empty list is reused inside the interval; an
//! empty one is refetched on every call.

use super::membership::{normalize_leader, MembershipSource};
use super::CommitteeError;
use crate::utils::{retry_with_backoff, RetryPolicy};
use reqwest::StatusCode;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tqv_common::model::ProofPayload;
use tqv_common::{CommitteeMember, Proof};

/// Timing and retry knobs for the broadcaster
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    pub refresh_interval: Duration,
    pub request_timeout: Duration,
    pub submit_retry: RetryPolicy,
    pub supplementary_retry: RetryPolicy,
    pub status_retry: RetryPolicy,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            request_timeout: Duration::from_secs(10),
            submit_retry: RetryPolicy::committee_submit(),
            supplementary_retry: RetryPolicy::committee_supplementary(),
            status_retry: RetryPolicy::committee_submit(),
        }
    }
}

/// Result of delivering to one member
#[derive(Debug, Clone)]
pub struct MemberOutcome {
    pub member_id: String,
    pub address: String,
    pub attempts: u32,
    /// `None` when the member acknowledged
    pub error: Option<String>,
}

impl MemberOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregate result of one fan-out
#[derive(Debug, Clone, Default)]
pub struct BroadcastReport {
    pub total: usize,
    pub success_count: usize,
    pub outcomes: Vec<MemberOutcome>,
}

impl BroadcastReport {
    fn from_outcomes(outcomes: Vec<MemberOutcome>) -> Self {
        Self {
            total: outcomes.len(),
            success_count: outcomes.iter().filter(|o| o.succeeded()).count(),
            outcomes,
        }
    }

    /// Quorum-of-one: at least one member acknowledged
    pub fn accepted(&self) -> bool {
        self.success_count >= 1
    }
}

#[derive(Debug, Default)]
struct MemberCache {
    members: Vec<CommitteeMember>,
    refreshed_at: Option<Instant>,
}

/// Committee broadcaster service
pub struct CommitteeBroadcaster {
    http_client: reqwest::Client,
    membership: Arc<dyn MembershipSource>,
    cache: Mutex<MemberCache>,
    settings: BroadcastSettings,
}

impl CommitteeBroadcaster {
    pub fn new(
        membership: Arc<dyn MembershipSource>,
        settings: BroadcastSettings,
    ) -> Result<Self, CommitteeError> {
        let http_client = reqwest::Client::builder()
            .build()
            .map_err(|e| CommitteeError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            membership,
            cache: Mutex::new(MemberCache::default()),
            settings,
        })
    }

    /// Current member list, refreshing it when due
    pub async fn members(&self) -> Vec<CommitteeMember> {
        let mut cache = self.cache.lock().await;

        let due = match cache.refreshed_at {
            None => true,
            Some(at) => at.elapsed() >= self.settings.refresh_interval,
        };

        if cache.members.is_empty() || due {
            match self.membership.fetch_members().await {
                Ok(members) => {
                    tracing::debug!(count = members.len(), "Committee member list refreshed");
                    cache.members = normalize_leader(members);
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        cached = cache.members.len(),
                        "Committee member refresh failed, keeping cached list"
                    );
                }
            }
            // Failed refreshes also count, so a flapping source is not hammered
            cache.refreshed_at = Some(Instant::now());
        }

        cache.members.clone()
    }

    /// Deliver a proof to every member (`POST /proof`)
    pub async fn submit_proof(&self, proof: &Proof) -> BroadcastReport {
        let report = self
            .fan_out(
                "/proof".to_string(),
                &ProofPayload::from(proof),
                self.settings.submit_retry,
            )
            .await;

        tracing::info!(
            task_id = %proof.task_id,
            success = report.success_count,
            total = report.total,
            accepted = report.accepted(),
            "Proof broadcast complete"
        );
        report
    }

    /// Deliver a proof that augments or supersedes an earlier one
    /// (`POST /proof/{task_id}/supplementary`)
    pub async fn submit_supplementary_proof(&self, task_id: &str, proof: &Proof) -> BroadcastReport {
        let report = self
            .fan_out(
                format!("/proof/{}/supplementary", task_id),
                &ProofPayload::from(proof),
                self.settings.supplementary_retry,
            )
            .await;

        tracing::info!(
            task_id,
            success = report.success_count,
            total = report.total,
            accepted = report.accepted(),
            "Supplementary proof broadcast complete"
        );
        report
    }

    /// Deliver several proofs in one request per member, without retry
    /// (`POST /proofs/batch`)
    pub async fn submit_proofs_batch(&self, proofs: &[Proof]) -> BroadcastReport {
        if proofs.is_empty() {
            tracing::debug!("Empty proof batch, nothing to send");
            return BroadcastReport::default();
        }

        let payloads: Vec<ProofPayload> = proofs.iter().map(ProofPayload::from).collect();
        let report = self
            .fan_out(
                "/proofs/batch".to_string(),
                &payloads,
                RetryPolicy::no_retry(),
            )
            .await;

        tracing::info!(
            proofs = proofs.len(),
            success = report.success_count,
            total = report.total,
            accepted = report.accepted(),
            "Proof batch broadcast complete"
        );
        report
    }

    /// Leader-first status read (`GET /proof/{task_id}/status`)
    pub async fn query_status(&self, task_id: &str) -> Option<serde_json::Value> {
        let members = self.members().await;
        let path = format!("/proof/{}/status", task_id);

        let leader = members.iter().find(|m| m.leader);
        if let Some(leader) = leader {
            let result = retry_with_backoff("committee status (leader)", &self.settings.status_retry, || {
                get_status(&self.http_client, leader, &path, self.settings.request_timeout)
            })
            .await;

            match result {
                Ok(status) => return Some(status),
                Err(e) => tracing::warn!(
                    task_id,
                    leader = %leader.id,
                    error = %e,
                    "Leader status query failed, falling back to followers"
                ),
            }
        }

        for follower in members.iter().filter(|m| !m.leader) {
            match get_status(&self.http_client, follower, &path, self.settings.request_timeout).await {
                Ok(status) => {
                    tracing::debug!(task_id, member = %follower.id, "Status served by follower");
                    return Some(status);
                }
                Err(e) => tracing::debug!(
                    task_id,
                    member = %follower.id,
                    error = %e,
                    "Follower status query failed"
                ),
            }
        }

        tracing::warn!(task_id, members = members.len(), "No committee member returned a status");
        None
    }

    /// POST `body` to `path` on every member concurrently and wait for all
    ///
    /// A payload that fails to encode is a failed delivery to every member;
    /// nothing is sent.
    async fn fan_out<T: Serialize + Sync>(
        &self,
        path: String,
        payload: &T,
        retry: RetryPolicy,
    ) -> BroadcastReport {
        let members = self.members().await;
        if members.is_empty() {
            tracing::warn!(path = %path, "No committee members to deliver to");
            return BroadcastReport::default();
        }

        let body = match serde_json::to_vec(payload) {
            Ok(bytes) => Arc::new(bytes),
            Err(e) => {
                let error = CommitteeError::Encode(e.to_string()).to_string();
                tracing::error!(path = %path, error = %error, "Payload encoding failed, nothing sent");
                let outcomes = members
                    .into_iter()
                    .map(|member| MemberOutcome {
                        member_id: member.id,
                        address: member.address,
                        attempts: 0,
                        error: Some(error.clone()),
                    })
                    .collect();
                return BroadcastReport::from_outcomes(outcomes);
            }
        };

        let handles: Vec<_> = members
            .iter()
            .cloned()
            .map(|member| {
                let client = self.http_client.clone();
                let body = Arc::clone(&body);
                let path = path.clone();
                let timeout = self.settings.request_timeout;
                tokio::spawn(async move {
                    deliver_to_member(client, member, path, body, timeout, retry).await
                })
            })
            .collect();

        let outcomes = futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(members)
            .map(|(joined, member)| match joined {
                Ok(outcome) => outcome,
                Err(e) => MemberOutcome {
                    member_id: member.id,
                    address: member.address,
                    attempts: 0,
                    error: Some(CommitteeError::Join(e.to_string()).to_string()),
                },
            })
            .collect();

        BroadcastReport::from_outcomes(outcomes)
    }
}

/// One member's delivery with its own retry budget
async fn deliver_to_member(
    client: reqwest::Client,
    member: CommitteeMember,
    path: String,
    body: Arc<Vec<u8>>,
    timeout: Duration,
    retry: RetryPolicy,
) -> MemberOutcome {
    let url = member.url(&path);
    let mut attempts = 0u32;

    let result = retry_with_backoff("committee delivery", &retry, || {
        attempts += 1;
        post_once(&client, &url, &body, timeout)
    })
    .await;

    match &result {
        Ok(()) => tracing::debug!(member = %member.id, url = %url, attempts, "Member acknowledged"),
        Err(e) => tracing::warn!(member = %member.id, url = %url, attempts, error = %e, "Member delivery failed"),
    }

    MemberOutcome {
        member_id: member.id,
        address: member.address,
        attempts,
        error: result.err().map(|e| e.to_string()),
    }
}

async fn post_once(
    client: &reqwest::Client,
    url: &str,
    body: &[u8],
    timeout: Duration,
) -> Result<(), CommitteeError> {
    let response = client
        .post(url)
        .timeout(timeout)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body.to_vec())
        .send()
        .await
        .map_err(CommitteeError::from_reqwest)?;

    let status = response.status();
    if status == StatusCode::ACCEPTED {
        Ok(())
    } else {
        Err(CommitteeError::UnexpectedStatus(status.as_u16()))
    }
}

async fn get_status(
    client: &reqwest::Client,
    member: &CommitteeMember,
    path: &str,
    timeout: Duration,
) -> Result<serde_json::Value, CommitteeError> {
    let response = client
        .get(member.url(path))
        .timeout(timeout)
        .send()
        .await
        .map_err(CommitteeError::from_reqwest)?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(CommitteeError::UnexpectedStatus(status.as_u16()));
    }

    response
        .json::<serde_json::Value>()
        .await
        .map_err(|e| CommitteeError::ParseError(e.to_string()))
}
