//! Query scoring: weighted Haar coefficient similarity.
//!
//! Two passes build a raw score per candidate (lower is more similar):
//! a DC-luminance distance over every live image, then a subtraction of the
//! bin weight for every bucket the query signature hits. The bounded heap
//! keeps the best K and the final scores are rescaled so a perfect match
//! reports roughly 100.

use std::collections::{BinaryHeap, HashMap};

use rayon::prelude::*;

use crate::bucket::BucketSet;
use crate::haar::{coef_bin, WEIGHTS};
use crate::info::InfoMap;
use crate::signature::HaarSignature;
use crate::types::{PostId, Score, SimValue};

/// Rank the K entries most similar to `sig`, most similar first.
pub fn query(buckets: &BucketSet, info: &InfoMap, sig: &HaarSignature, k: usize) -> Vec<SimValue> {
    let num_colors = sig.num_colors();

    // DC-luminance distance for every live image
    let mut scores: HashMap<PostId, Score> = info
        .entries()
        .par_iter()
        .filter(|(_, entry)| !entry.deleted)
        .map(|(post_id, entry)| {
            let mut s = 0.0;
            for c in 0..num_colors {
                s += WEIGHTS[0][c] * (entry.avgl[c] - sig.avglf[c] as Score).abs();
            }
            (post_id.clone(), s)
        })
        .collect();

    // every shared coefficient pulls the candidate's score down by the
    // weight of its bin
    let mut scale: Score = 0.0;
    for c in 0..num_colors {
        for &coef in &sig.sig[c] {
            let bucket = buckets.at(c, coef);
            if bucket.is_empty() {
                continue;
            }

            let weight = WEIGHTS[coef_bin(coef.unsigned_abs() as usize)][c];
            scale -= weight;

            for post_id in bucket {
                *scores.entry(post_id.clone()).or_insert(0.0) -= weight;
            }
        }
    }

    if scale != 0.0 {
        scale = 1.0 / scale;
    }

    // bounded max-heap over raw scores; popping drops the worst candidate
    let mut heap: BinaryHeap<SimValue> = BinaryHeap::with_capacity(k + 1);
    for (post_id, score) in scores {
        if info.get(&post_id).map_or(true, |entry| entry.deleted) {
            continue;
        }
        heap.push(SimValue::new(post_id, score));
        if heap.len() > k {
            heap.pop();
        }
    }

    // ascending raw score = descending reported score (scale is negative)
    let mut results = heap.into_sorted_vec();
    for value in &mut results {
        value.score *= 100.0 * scale;
    }
    results
}
