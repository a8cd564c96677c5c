//! Test Helper Utilities
//!
//! Shared fakes and mock committee servers for tqv-verifier integration tests

#![allow(dead_code)]

pub mod fakes;
pub mod mock_committee;

pub use fakes::{FakeContentStore, FakeLedger, FakeMediaTool};
pub use mock_committee::{MemberBehavior, MockMember, RecordedRequest};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tqv_common::model::markers_from_seconds;
use tqv_common::{CommitteeMember, Task, VerifierRole};
use tqv_verifier::committee::{BroadcastSettings, CommitteeBroadcaster, StaticMembership};
use tqv_verifier::services::Policies;
use tqv_verifier::utils::RetryPolicy;
use tqv_verifier::{PipelineSettings, VerificationPipeline};

pub const VERIFIER_ID: &str = "verifier-under-test";
pub const SIGNATURE: &str = "0xsignature";

/// Broadcast settings with millisecond backoff and a short request timeout
pub fn fast_settings() -> BroadcastSettings {
    BroadcastSettings {
        refresh_interval: Duration::from_secs(60),
        request_timeout: Duration::from_millis(300),
        submit_retry: RetryPolicy::new(2, 10, 2.0, 50),
        supplementary_retry: RetryPolicy::new(3, 10, 2.0, 50),
        status_retry: RetryPolicy::new(2, 10, 2.0, 50),
    }
}

pub fn broadcaster(members: Vec<CommitteeMember>) -> Arc<CommitteeBroadcaster> {
    Arc::new(
        CommitteeBroadcaster::new(Arc::new(StaticMembership::new(members)), fast_settings())
            .unwrap(),
    )
}

pub fn pipeline(
    tool: Arc<FakeMediaTool>,
    store: Arc<FakeContentStore>,
    ledger: Arc<FakeLedger>,
    broadcaster: Arc<CommitteeBroadcaster>,
    work_root: &Path,
) -> VerificationPipeline {
    VerificationPipeline::new(
        tool,
        store,
        ledger,
        broadcaster,
        Policies::constant(100.0, 100.0, SIGNATURE),
        PipelineSettings {
            verifier_id: VERIFIER_ID.to_string(),
            work_root: work_root.to_path_buf(),
            score_offset: 0.0,
        },
    )
}

/// Task with the given marker sets; asset locators are `src-{id}` / `cand-{id}`
pub fn task(id: &str, markers: &[f64], selected: &[f64]) -> Task {
    Task {
        id: id.to_string(),
        source_locator: format!("src-{}", id),
        candidate_locator: format!("cand-{}", id),
        markers: markers_from_seconds(markers).unwrap(),
        sample_markers: markers_from_seconds(selected).unwrap(),
        verifiers: vec![VERIFIER_ID.to_string()],
        role: VerifierRole::Primary,
    }
}

/// Spawn one mock member per behavior; the first one is flagged leader
pub async fn spawn_members(behaviors: Vec<MemberBehavior>) -> Vec<MockMember> {
    let mut members = Vec::new();
    for (index, behavior) in behaviors.into_iter().enumerate() {
        members.push(MockMember::spawn(&format!("node-{}", index), index == 0, behavior).await);
    }
    members
}

pub fn descriptors(members: &[MockMember]) -> Vec<CommitteeMember> {
    members.iter().map(|m| m.descriptor()).collect()
}
