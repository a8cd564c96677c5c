//! Committee replica descriptors

use serde::{Deserialize, Serialize};

/// One replica of the consensus committee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitteeMember {
    pub id: String,
    /// Base URL, e.g. `http://10.0.0.5:8080`
    pub address: String,
    #[serde(default)]
    pub leader: bool,
}

impl CommitteeMember {
    pub fn new(id: impl Into<String>, address: impl Into<String>, leader: bool) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            leader,
        }
    }

    /// Member URL for an API path (`path` starts with `/`)
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address.trim_end_matches('/'), path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let member = CommitteeMember::new("m1", "http://127.0.0.1:9000/", false);
        assert_eq!(member.url("/proof"), "http://127.0.0.1:9000/proof");
    }
}
