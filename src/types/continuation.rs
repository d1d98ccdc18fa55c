//! Continuation tokens for segmented listings.

use crate::location::StorageLocation;
use serde::{Deserialize, Serialize};

/// Position in a segmented listing.
///
/// The token remembers the replica that produced it: replicas may lag behind each
/// other, so the next segment must be requested from the same location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    next_marker: String,
    target_location: StorageLocation,
}

impl ContinuationToken {
    /// Create a token for the segment starting at `next_marker` on `target_location`.
    pub fn new(next_marker: impl Into<String>, target_location: StorageLocation) -> Self {
        Self {
            next_marker: next_marker.into(),
            target_location,
        }
    }

    /// Service marker of the next segment.
    pub fn next_marker(&self) -> &str {
        &self.next_marker
    }

    /// Location the next segment must be read from.
    pub fn target_location(&self) -> StorageLocation {
        self.target_location
    }
}
