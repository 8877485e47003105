//! The inverted index over signed wavelet coefficients.
//!
//! One bucket per (channel, sign, magnitude) coordinate, holding the ids of
//! every image whose signature retained that coefficient. Queries touch
//! exactly the buckets of the query signature, so lookup cost is
//! O(num_colors * NUM_COEFS) regardless of corpus size.

use crate::haar::{NUM_CHANNELS, NUM_PIXELS_SQUARED};
use crate::signature::HaarSignature;
use crate::types::PostId;

const NUM_BUCKETS: usize = NUM_CHANNELS * 2 * NUM_PIXELS_SQUARED;

pub struct BucketSet {
    // flat [channel][sign][magnitude] layout; lists grow lazily
    buckets: Vec<Vec<PostId>>,
}

impl BucketSet {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); NUM_BUCKETS],
        }
    }

    #[inline]
    fn slot(channel: usize, coef: i16) -> usize {
        let sign = (coef < 0) as usize;
        let magnitude = coef.unsigned_abs() as usize;
        debug_assert!(channel < NUM_CHANNELS);
        debug_assert!(magnitude >= 1 && magnitude < NUM_PIXELS_SQUARED);
        (channel * 2 + sign) * NUM_PIXELS_SQUARED + magnitude
    }

    /// The bucket addressed by a channel and a signed coefficient index.
    pub fn at(&self, channel: usize, coef: i16) -> &[PostId] {
        &self.buckets[Self::slot(channel, coef)]
    }

    /// Record `post_id` in every bucket of `sig`. The caller guarantees the
    /// id is not already present (remove first on re-add).
    pub fn add(&mut self, sig: &HaarSignature, post_id: &str) {
        self.each_bucket(sig, |bucket| bucket.push(post_id.to_owned()));
    }

    /// Erase all occurrences of `post_id` from the buckets of `sig`.
    /// Idempotent.
    pub fn remove(&mut self, sig: &HaarSignature, post_id: &str) {
        self.each_bucket(sig, |bucket| bucket.retain(|p| p != post_id));
    }

    // Visit the bucket of every coefficient the signature carries. Grayscale
    // signatures only touch channel 0.
    fn each_bucket(&mut self, sig: &HaarSignature, mut f: impl FnMut(&mut Vec<PostId>)) {
        for c in 0..sig.num_colors() {
            for &coef in &sig.sig[c] {
                f(&mut self.buckets[Self::slot(c, coef)]);
            }
        }
    }
}

impl Default for BucketSet {
    fn default() -> Self {
        Self::new()
    }
}
