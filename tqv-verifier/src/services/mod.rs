//! Service modules for the verification pipeline

pub mod content_store;
pub mod media_tool;
pub mod policy;
pub mod quality_scorer;
pub mod sample_extractor;
pub mod workspace;

pub use content_store::{ContentStore, ContentStoreError, GatewayContentStore};
pub use media_tool::{FfmpegTool, MediaTool, MediaToolError};
pub use policy::{AuxiliaryScorer, FixedScore, Policies, Signer, StaticSigner};
pub use quality_scorer::{fingerprint_file, Evaluation, QualityScorer, SCORE_FLOOR};
pub use sample_extractor::{ExtractError, SampleExtractor, SegmentMap};
pub use workspace::{AssetRole, TaskWorkspace};
