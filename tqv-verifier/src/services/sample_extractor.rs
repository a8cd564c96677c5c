//! Marker-keyed asset segmentation
//!
//! Splits an asset at its markers and keys every produced segment by the
//! marker it starts at. Demuxing is delegated to the `MediaTool`.
//!
//! # Boundary mapping
//! Cut points are the markers greater than zero. The tool's segment `k`
//! starts at `0` for `k == 0` and at cut point `k - 1` otherwise. A segment is
//! keyed only when its start is one of the requested markers, so when the
//! first marker is not `0` the leading slice `[0, m0)` is discarded.

use crate::services::media_tool::{MediaTool, MediaToolError};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tqv_common::model::normalize_markers;
use tqv_common::Marker;

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Asset path does not resolve
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Media tool failed to segment the asset
    #[error("Segmentation failed: {0}")]
    Tool(#[from] MediaToolError),
}

/// Segment path for every marker that produced a usable segment
pub type SegmentMap = BTreeMap<Marker, PathBuf>;

/// Sample extractor service
pub struct SampleExtractor {
    tool: Arc<dyn MediaTool>,
}

impl SampleExtractor {
    pub fn new(tool: Arc<dyn MediaTool>) -> Self {
        Self { tool }
    }

    /// Split `asset` at `markers`, writing segments into `output_dir`
    ///
    /// Returns at most one entry per marker. Missing keys mean the sample is
    /// unavailable; a partial map is not an error. Zero markers yields an
    /// empty map without invoking the tool.
    pub async fn split_asset(
        &self,
        asset: &Path,
        markers: &[Marker],
        output_dir: &Path,
    ) -> Result<SegmentMap, ExtractError> {
        // Resolve first so a bad path is an I/O error, never a tool error
        let metadata = tokio::fs::metadata(asset).await?;
        if !metadata.is_file() {
            return Err(ExtractError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("asset is not a regular file: {}", asset.display()),
            )));
        }

        let markers = normalize_markers(markers);
        if markers.is_empty() {
            return Ok(SegmentMap::new());
        }

        let cut_points: Vec<f64> = markers
            .iter()
            .map(|m| m.seconds())
            .filter(|&s| s > 0.0)
            .collect();

        tracing::debug!(
            asset = %asset.display(),
            markers = markers.len(),
            cut_points = cut_points.len(),
            "Splitting asset"
        );

        let segments = self.tool.segment(asset, &cut_points, output_dir).await?;
        let starts = segment_starts(&cut_points);

        let mut map = SegmentMap::new();
        for path in segments {
            // Key by the index in the file name; the list may have gaps
            let Some(index) = segment_index(&path) else {
                tracing::warn!(path = %path.display(), "Unrecognized segment file name, ignoring");
                continue;
            };
            let Some(&start) = starts.get(index) else {
                tracing::warn!(
                    asset = %asset.display(),
                    index,
                    "Segment index beyond cut points, ignoring"
                );
                continue;
            };

            let Ok(marker) = Marker::new(start) else {
                continue;
            };
            if markers.binary_search(&marker).is_err() {
                // Leading slice before the first requested marker
                continue;
            }

            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() && meta.len() > 0 => {
                    map.insert(marker, path);
                }
                Ok(_) => {
                    tracing::warn!(marker = %marker, path = %path.display(), "Empty segment, sample unavailable");
                }
                Err(e) => {
                    tracing::warn!(marker = %marker, path = %path.display(), error = %e, "Segment missing, sample unavailable");
                }
            }
        }

        tracing::debug!(
            asset = %asset.display(),
            requested = markers.len(),
            produced = map.len(),
            "Asset split complete"
        );

        Ok(map)
    }
}

/// Index `NNNN` of a `segment_NNNN.<ext>` file
fn segment_index(path: &Path) -> Option<usize> {
    path.file_stem()?
        .to_str()?
        .strip_prefix("segment_")?
        .parse()
        .ok()
}

/// Start time of each segment index for the given cut points
fn segment_starts(cut_points: &[f64]) -> Vec<f64> {
    std::iter::once(0.0).chain(cut_points.iter().copied()).collect()
}
