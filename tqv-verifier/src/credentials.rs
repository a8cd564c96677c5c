//! Per-network verifier credentials
//!
//! `{root}/credentials/{network}.json` holds the verifier identity and the
//! opaque signature attached to every proof. A missing or malformed file
//! aborts startup.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialsError {
    #[error("Credential file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read credential file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Malformed credential file {0}: {1}")]
    Malformed(PathBuf, String),

    #[error("Invalid network name: {0}")]
    InvalidNetwork(String),
}

/// Verifier identity for one network
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    pub verifier_id: String,
    pub signature: String,
}

impl Credentials {
    /// Path of the credential file for `network` under `root_folder`
    pub fn path_for(root_folder: &Path, network: &str) -> Result<PathBuf, CredentialsError> {
        if network.is_empty()
            || !network
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(CredentialsError::InvalidNetwork(network.to_string()));
        }
        Ok(root_folder
            .join("credentials")
            .join(format!("{}.json", network)))
    }

    pub fn load(root_folder: &Path, network: &str) -> Result<Self, CredentialsError> {
        let path = Self::path_for(root_folder, network)?;

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialsError::NotFound(path));
            }
            Err(e) => return Err(CredentialsError::Read(path, e)),
        };

        let credentials: Credentials = serde_json::from_str(&content)
            .map_err(|e| CredentialsError::Malformed(path.clone(), e.to_string()))?;

        if credentials.verifier_id.trim().is_empty() {
            return Err(CredentialsError::Malformed(
                path,
                "verifier_id is empty".to_string(),
            ));
        }

        tracing::info!(
            network,
            verifier_id = %credentials.verifier_id,
            "Loaded verifier credentials"
        );
        Ok(credentials)
    }
}
