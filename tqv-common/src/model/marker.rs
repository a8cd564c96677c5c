//! Content boundary markers
//!
//! A marker is a timestamp (seconds from the start of an asset) at which the
//! asset is cut into verifiable samples.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Timestamp in seconds identifying a content boundary
///
/// Always finite and non-negative, so a total order and hashing by bit
/// pattern are well defined.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Marker(f64);

impl Marker {
    /// Create a marker, rejecting NaN, infinities and negative timestamps
    pub fn new(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(Error::InvalidInput(format!(
                "marker must be a finite, non-negative timestamp, got {}",
                seconds
            )));
        }
        // -0.0 and 0.0 must hash identically
        Ok(Self(if seconds == 0.0 { 0.0 } else { seconds }))
    }

    /// Timestamp in seconds
    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Marker {
    type Error = Error;

    fn try_from(value: f64) -> Result<Self> {
        Marker::new(value)
    }
}

impl From<Marker> for f64 {
    fn from(marker: Marker) -> f64 {
        marker.0
    }
}

impl PartialEq for Marker {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Marker {}

impl PartialOrd for Marker {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Marker {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for Marker {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sort markers ascending and drop duplicates
pub fn normalize_markers(markers: &[Marker]) -> Vec<Marker> {
    let mut sorted = markers.to_vec();
    sorted.sort();
    sorted.dedup();
    sorted
}

/// Ordered, distinct union of two marker lists
pub fn union_markers(a: &[Marker], b: &[Marker]) -> Vec<Marker> {
    let mut all = Vec::with_capacity(a.len() + b.len());
    all.extend_from_slice(a);
    all.extend_from_slice(b);
    normalize_markers(&all)
}

/// Build markers from raw second values
pub fn markers_from_seconds(values: &[f64]) -> Result<Vec<Marker>> {
    values.iter().map(|&v| Marker::new(v)).collect()
}
