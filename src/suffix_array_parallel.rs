//! Parallel suffix array construction using Rayon.
//!
//! Same doubling scheme as the sequential builder; the per-round key fill
//! and sort run on the Rayon pool. Output is identical to the sequential
//! implementation for every input.

use crate::suffix_array::{initial_ranks, kasai, rerank, SuffixArray};
use crate::types::Token;
use rayon::prelude::*;

/// Tuning for the parallel builder.
#[derive(Debug, Clone)]
pub struct ParallelSaConfig {
    /// Inputs below this length use the sequential builder; the pool
    /// overhead dominates otherwise.
    pub parallel_threshold: usize,
}

impl Default for ParallelSaConfig {
    fn default() -> Self {
        Self {
            parallel_threshold: 10_000,
        }
    }
}

/// Build a suffix array with parallel sorting.
pub fn build_suffix_array_parallel(tokens: &[Token], config: &ParallelSaConfig) -> SuffixArray {
    let n = tokens.len();
    if n == 0 || n < config.parallel_threshold {
        return SuffixArray::build(tokens);
    }

    let (mut sa, mut rank, mut distinct) = initial_ranks(tokens);
    let mut key = vec![0u64; n];
    let mut k = 1usize;

    while distinct < n {
        // Key packing is embarrassingly parallel; the re-rank sweep stays
        // sequential because each rank depends on its predecessor.
        let rank_ref = &rank;
        key.par_iter_mut().enumerate().for_each(|(i, slot)| {
            let second = if i + k < n { rank_ref[i + k] as u64 + 1 } else { 0 };
            *slot = ((rank_ref[i] as u64) << 32) | second;
        });

        let key_ref = &key;
        sa.par_sort_unstable_by_key(|&i| key_ref[i]);

        distinct = rerank(&sa, &key, &mut rank);
        k <<= 1;
    }

    let lcp = kasai(tokens, &sa);
    SuffixArray {
        suffix_array: sa,
        lcp,
    }
}

/// Threshold dispatch between the sequential and parallel builders.
pub fn build_suffix_array_auto(tokens: &[Token], enable_parallel: bool) -> SuffixArray {
    let config = ParallelSaConfig::default();
    if enable_parallel && tokens.len() >= config.parallel_threshold {
        build_suffix_array_parallel(tokens, &config)
    } else {
        SuffixArray::build(tokens)
    }
}
