//! Replaceable scoring and signing policies
//!
//! Audio and sync quality are not measured yet; the constant scorers stand
//! in for them. Signing is likewise a constant opaque value. Each concern is
//! a trait so a measuring or cryptographic implementation can be dropped in
//! without touching the pipeline.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// Produces one auxiliary score for a (reference, candidate) pair
#[async_trait]
pub trait AuxiliaryScorer: Send + Sync {
    /// Scorer name for logs
    fn name(&self) -> &'static str;

    async fn score(&self, reference: &Path, candidate: &Path) -> f64;
}

/// Auxiliary scorer that always returns the same value
#[derive(Debug, Clone, Copy)]
pub struct FixedScore {
    name: &'static str,
    value: f64,
}

impl FixedScore {
    pub fn new(name: &'static str, value: f64) -> Self {
        Self { name, value }
    }
}

#[async_trait]
impl AuxiliaryScorer for FixedScore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn score(&self, _reference: &Path, _candidate: &Path) -> f64 {
        self.value
    }
}

/// Signs the serialized proof
pub trait Signer: Send + Sync {
    fn sign(&self, payload: &[u8]) -> String;
}

/// Signer returning a fixed opaque signature from the credential store
#[derive(Debug, Clone)]
pub struct StaticSigner {
    signature: String,
}

impl StaticSigner {
    pub fn new(signature: impl Into<String>) -> Self {
        Self {
            signature: signature.into(),
        }
    }
}

impl Signer for StaticSigner {
    fn sign(&self, _payload: &[u8]) -> String {
        self.signature.clone()
    }
}

/// The full set of policies a scorer and pipeline are built with
#[derive(Clone)]
pub struct Policies {
    pub audio: Arc<dyn AuxiliaryScorer>,
    pub sync: Arc<dyn AuxiliaryScorer>,
    pub signer: Arc<dyn Signer>,
}

impl Policies {
    /// Constant audio/sync scores and a static signature
    pub fn constant(audio: f64, sync: f64, signature: impl Into<String>) -> Self {
        Self {
            audio: Arc::new(FixedScore::new("audio", audio)),
            sync: Arc::new(FixedScore::new("sync", sync)),
            signer: Arc::new(StaticSigner::new(signature)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_score_ignores_inputs() {
        let scorer = FixedScore::new("audio", 97.5);
        assert_eq!(scorer.name(), "audio");
        assert_eq!(scorer.score(Path::new("a"), Path::new("b")).await, 97.5);
        assert_eq!(scorer.score(Path::new("c"), Path::new("d")).await, 97.5);
    }

    #[test]
    fn test_static_signer() {
        let signer = StaticSigner::new("0xfeed");
        assert_eq!(signer.sign(b"anything"), "0xfeed");
    }
}
