//! Core type definitions for haardb

use std::cmp::Ordering;

use crate::signature::HaarSignature;

/// An externally-supplied image identifier (opaque string).
pub type PostId = String;

/// The type used for similarity scores during queries and for the `avgl`
/// triples held in the info map.
pub type Score = f32;

/// A single ranked query result.
///
/// Raw scores are "lower is more similar"; the reported score is rescaled so
/// that 100 means a perfect match.
#[derive(Debug, Clone, PartialEq)]
pub struct SimValue {
    pub post_id: PostId,
    pub score: Score,
}

impl SimValue {
    pub fn new(post_id: PostId, score: Score) -> Self {
        Self { post_id, score }
    }
}

impl Eq for SimValue {}

// Total order on the raw score, with the post id as a tiebreak so that
// top-K selection is deterministic for a given build.
impl Ord for SimValue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| self.post_id.cmp(&other.post_id))
    }
}

impl PartialOrd for SimValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-image state kept in memory for the DC-luminance score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageInfo {
    /// Average luminance per channel (the DC term of the signature).
    pub avgl: [Score; 3],
    /// Logically deleted entries are skipped by queries.
    pub deleted: bool,
}

/// A row of the durable catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogRow {
    pub post_id: PostId,
    pub md5: Option<String>,
    pub signature: HaarSignature,
}
