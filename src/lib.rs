//! # haardb - Embedded Perceptual Image Similarity Database
//!
//! Content-based near-duplicate lookup over a corpus of images addressed by
//! external post ids:
//! - Haar-wavelet signatures (DC triple + top-40 coefficients per channel)
//! - inverted index over signed coefficients, O(coefs) lookups
//! - weighted two-pass scoring, perfect match reports ~100
//! - SQLite catalog with crash-recoverable load-on-start rebuild
//!
//! ## Architecture
//! - One reader-writer lock over the whole engine: queries and lookups
//!   share it, ingest and removal take it exclusively
//! - The catalog is the source of truth; buckets and the info map are
//!   derived state rebuilt on [`ImageDb::open`]
//! - Catalog writes precede in-memory updates, so a failed write never
//!   leaves a phantom index entry

use parking_lot::RwLock;

pub mod bucket;
pub mod catalog;
pub mod error;
pub mod haar;
pub mod info;
pub mod query;
pub mod resizer;
pub mod signature;
pub mod types;

pub use error::{Error, Result};
pub use signature::HaarSignature;
pub use types::{CatalogRow, PostId, Score, SimValue};

use crate::bucket::BucketSet;
use crate::catalog::Catalog;
use crate::info::InfoMap;

/// The similarity engine: owns the catalog, the bucket set and the info
/// map, and serializes access to them.
pub struct ImageDb {
    state: RwLock<DbState>,
}

struct DbState {
    catalog: Catalog,
    buckets: BucketSet,
    info: InfoMap,
    img_count: u64,
}

impl DbState {
    // Index a signature in the derived structures only. Used by both ingest
    // (after the catalog write) and the startup rebuild (no write at all).
    fn index_in_memory(&mut self, post_id: &str, sig: &HaarSignature) {
        self.buckets.add(sig, post_id);
        self.info.insert(post_id.to_owned(), sig.avgl());
        self.img_count += 1;
    }

    fn remove_locked(&mut self, post_id: &str) -> Result<()> {
        let row = match self.catalog.get(post_id)? {
            Some(row) => row,
            None => {
                tracing::warn!(post_id, "cannot remove: post not in catalog");
                return Ok(());
            }
        };

        self.buckets.remove(&row.signature, post_id);
        self.info.remove(post_id);
        self.catalog.remove(post_id)?;
        self.img_count = self.img_count.saturating_sub(1);

        tracing::debug!(post_id, "removed image");
        Ok(())
    }

    fn rebuild(&mut self) -> Result<()> {
        let DbState {
            catalog,
            buckets,
            info,
            img_count,
        } = self;

        catalog.each_image(|row| {
            buckets.add(&row.signature, &row.post_id);
            info.insert(row.post_id, row.signature.avgl());
            *img_count += 1;
            if *img_count % 250_000 == 0 {
                tracing::info!(loaded = *img_count, "rebuilding index");
            }
        })
    }
}

impl ImageDb {
    /// Open the catalog at `path` (empty string for an ephemeral in-memory
    /// store) and rebuild the in-memory index from it. Signatures are
    /// reconstructed from the stored blobs, never re-extracted.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path, "loading image database");

        let mut state = DbState {
            catalog: Catalog::open(path)?,
            buckets: BucketSet::new(),
            info: InfoMap::new(),
            img_count: 0,
        };
        state.rebuild()?;

        tracing::info!(count = state.img_count, "loaded image database");
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Ingest a signature under `post_id`, replacing any previous entry for
    /// the same id. The catalog write happens first; the in-memory updates
    /// that follow cannot fail.
    pub fn add_image(&self, post_id: &str, md5: Option<&str>, sig: &HaarSignature) -> Result<()> {
        let mut state = self.state.write();

        state.remove_locked(post_id)?;
        state.catalog.upsert(post_id, md5, sig)?;
        state.index_in_memory(post_id, sig);

        tracing::debug!(post_id, "added image");
        Ok(())
    }

    /// Remove `post_id` everywhere. Unknown ids are a warning, not an
    /// error.
    pub fn remove_image(&self, post_id: &str) -> Result<()> {
        self.state.write().remove_locked(post_id)
    }

    /// The catalog row for `post_id`, if any.
    pub fn get_image(&self, post_id: &str) -> Result<Option<CatalogRow>> {
        self.state.read().catalog.get(post_id)
    }

    /// All catalog rows with the given content hash.
    pub fn get_by_md5(&self, md5: &str) -> Result<Vec<CatalogRow>> {
        self.state.read().catalog.get_by_md5(md5)
    }

    /// The K entries most similar to `sig`, most similar first.
    pub fn query_from_signature(&self, sig: &HaarSignature, k: usize) -> Result<Vec<SimValue>> {
        if k == 0 {
            return Err(Error::Param("result count must be at least 1".into()));
        }
        let state = self.state.read();
        Ok(query::query(&state.buckets, &state.info, sig, k))
    }

    /// Extract a signature from raw image bytes and query with it. The
    /// extraction runs before any lock is taken.
    pub fn query_from_blob(&self, bytes: &[u8], k: usize) -> Result<Vec<SimValue>> {
        if k == 0 {
            return Err(Error::Param("result count must be at least 1".into()));
        }
        let sig = HaarSignature::from_file_content(bytes)?;
        self.query_from_signature(&sig, k)
    }

    /// Number of live (non-deleted) images.
    pub fn image_count(&self) -> u64 {
        self.state.read().img_count
    }

    /// Deletion state of `post_id`; `None` when the id is unknown.
    pub fn is_deleted(&self, post_id: &str) -> Option<bool> {
        self.state
            .read()
            .info
            .get(post_id)
            .map(|entry| entry.deleted)
    }
}
