//! Verifier configuration
//!
//! Loaded once at startup from `tqv-verifier.toml`. Every section and field
//! has a built-in default, so an empty or missing file yields a working
//! configuration for a local network.
//!
//! # Settings Sources Priority
//!
//! 1. Command-line arguments (`--root-folder`, `--network`, `--log-level`)
//! 2. Environment variables (`TQV_ROOT_FOLDER`, `TQV_NETWORK`, `RUST_LOG`)
//! 3. TOML configuration file
//! 4. Built-in defaults

use crate::committee::BroadcastSettings;
use crate::utils::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tqv_common::config::LoggingConfig;
use tqv_common::CommitteeMember;

/// Config file name looked up in the platform config directories
pub const CONFIG_FILE_NAME: &str = "tqv-verifier.toml";

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "TQV_ROOT_FOLDER";

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Root folder for credentials, cache and task workspaces (optional)
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub verifier: VerifierSection,

    #[serde(default)]
    pub ledger: LedgerSection,

    #[serde(default)]
    pub content_store: ContentStoreSection,

    #[serde(default)]
    pub committee: CommitteeSection,

    #[serde(default)]
    pub scoring: ScoringSection,

    #[serde(default)]
    pub media: MediaSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierSection {
    /// Network name; selects `{root}/credentials/{network}.json`
    pub network: String,
    /// Seconds between task polls
    pub poll_interval_secs: u64,
}

impl Default for VerifierSection {
    fn default() -> Self {
        Self {
            network: "local".to_string(),
            poll_interval_secs: 10,
        }
    }
}

impl VerifierSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    pub gateway_url: String,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8545".to_string(),
            timeout_secs: 30,
            retry: RetryPolicy::network_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentStoreSection {
    pub gateway_url: String,
    /// Whole-download timeout; assets can be large
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for ContentStoreSection {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 300,
            retry: RetryPolicy::network_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitteeSection {
    pub members: Vec<CommitteeMember>,
    /// Take the leader flag from the ledger instead of `members[*].leader`
    pub use_ledger_leader: bool,
    pub refresh_interval_secs: u64,
    pub request_timeout_ms: u64,
    pub submit_retry: RetryPolicy,
    pub supplementary_retry: RetryPolicy,
    pub status_retry: RetryPolicy,
}

impl Default for CommitteeSection {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            use_ledger_leader: false,
            refresh_interval_secs: 60,
            request_timeout_ms: 10_000,
            submit_retry: RetryPolicy::committee_submit(),
            supplementary_retry: RetryPolicy::committee_supplementary(),
            status_retry: RetryPolicy::committee_submit(),
        }
    }
}

impl CommitteeSection {
    pub fn broadcast_settings(&self) -> BroadcastSettings {
        BroadcastSettings {
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            request_timeout: tqv_common::time::millis_to_duration(self.request_timeout_ms),
            submit_retry: self.submit_retry,
            supplementary_retry: self.supplementary_retry,
            status_retry: self.status_retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringSection {
    /// Calibration offset added to each raw sample score (0 = none)
    pub score_offset: f64,
    /// Constant audio score until audio is measured
    pub audio_score: f64,
    /// Constant A/V sync score until sync is measured
    pub sync_score: f64,
}

impl Default for ScoringSection {
    fn default() -> Self {
        Self {
            score_offset: 0.0,
            audio_score: 100.0,
            sync_score: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaSection {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}
