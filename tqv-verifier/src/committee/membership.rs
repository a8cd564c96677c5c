//! Committee member list sources

use super::CommitteeError;
use crate::ledger::Ledger;
use async_trait::async_trait;
use std::sync::Arc;
use tqv_common::CommitteeMember;

/// Provides the current committee replica set
#[async_trait]
pub trait MembershipSource: Send + Sync {
    async fn fetch_members(&self) -> Result<Vec<CommitteeMember>, CommitteeError>;
}

/// Fixed member list from configuration
pub struct StaticMembership {
    members: Vec<CommitteeMember>,
}

impl StaticMembership {
    pub fn new(members: Vec<CommitteeMember>) -> Self {
        Self { members }
    }
}

#[async_trait]
impl MembershipSource for StaticMembership {
    async fn fetch_members(&self) -> Result<Vec<CommitteeMember>, CommitteeError> {
        Ok(self.members.clone())
    }
}

/// Configured addresses with the leader flag taken from the ledger
pub struct LedgerMembership {
    ledger: Arc<dyn Ledger>,
    members: Vec<CommitteeMember>,
}

impl LedgerMembership {
    pub fn new(ledger: Arc<dyn Ledger>, members: Vec<CommitteeMember>) -> Self {
        Self { ledger, members }
    }
}

#[async_trait]
impl MembershipSource for LedgerMembership {
    async fn fetch_members(&self) -> Result<Vec<CommitteeMember>, CommitteeError> {
        let leader = self
            .ledger
            .committee_leader()
            .await
            .map_err(|e| CommitteeError::Membership(e.to_string()))?;

        let Some(leader_id) = leader else {
            tracing::debug!("Ledger reports no committee leader, using configured flags");
            return Ok(self.members.clone());
        };

        if !self.members.iter().any(|m| m.id == leader_id) {
            tracing::warn!(
                leader = %leader_id,
                "Ledger leader is not a configured committee member"
            );
        }

        Ok(self
            .members
            .iter()
            .map(|m| CommitteeMember {
                leader: m.id == leader_id,
                ..m.clone()
            })
            .collect())
    }
}

/// Keep at most one leader: the first flagged member wins
pub fn normalize_leader(members: Vec<CommitteeMember>) -> Vec<CommitteeMember> {
    let mut seen_leader = false;
    members
        .into_iter()
        .map(|mut m| {
            if m.leader {
                if seen_leader {
                    tracing::warn!(member = %m.id, "Multiple leaders in member list, demoting");
                    m.leader = false;
                } else {
                    seen_leader = true;
                }
            }
            m
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_leader_keeps_first() {
        let members = vec![
            CommitteeMember::new("a", "http://a", false),
            CommitteeMember::new("b", "http://b", true),
            CommitteeMember::new("c", "http://c", true),
        ];
        let normalized = normalize_leader(members);
        let leaders: Vec<&str> = normalized
            .iter()
            .filter(|m| m.leader)
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(leaders, vec!["b"]);
        assert_eq!(normalized.len(), 3);
    }

    #[tokio::test]
    async fn test_static_membership_returns_configured_list() {
        let members = vec![CommitteeMember::new("a", "http://a", true)];
        let source = StaticMembership::new(members.clone());
        assert_eq!(source.fetch_members().await.unwrap(), members);
    }
}
