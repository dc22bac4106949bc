//! Pattern discovery.
//!
//! Walks the LCP array of the input's suffix array: every maximal interval
//! with shared prefix >= L names a group of suffixes repeating an L-token
//! pattern. Groups that cannot clear the compressibility test are dropped
//! before the occurrence lists are even materialized.

use crate::suffix_array::{build_suffix_array_auto, non_overlapping_positions, LcpInterval, SuffixArray};
use crate::types::{
    is_compressible, min_count_for_compressibility, Candidate, Token, PATTERN_OVERHEAD,
};
use std::cmp::Ordering;
use std::collections::HashMap;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Configuration for pattern discovery.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Minimum pattern length to consider
    pub min_length: usize,
    /// Maximum pattern length to consider
    pub max_length: usize,
    /// Minimum occurrences for a pattern to be considered
    pub min_occurrences: usize,
    /// Per-pattern dictionary overhead used in the savings test
    pub overhead: usize,
    /// Fan discovery out across lengths (no-op without the `parallel`
    /// feature)
    pub parallel: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            min_length: 2,
            max_length: 8,
            min_occurrences: 2,
            overhead: PATTERN_OVERHEAD,
            parallel: false,
        }
    }
}

/// Canonical candidate ordering: raw savings descending, then length
/// descending, then lexicographic pattern contents. Total because contents
/// are unique after deduplication.
pub fn canonical_cmp(a: &Candidate, b: &Candidate) -> Ordering {
    b.raw_savings()
        .cmp(&a.raw_savings())
        .then(b.length.cmp(&a.length))
        .then_with(|| a.subsequence.cmp(&b.subsequence))
}

/// Discover candidate patterns in `tokens`.
///
/// The result is deduplicated, overlap-filtered, compressibility-checked,
/// and canonically ordered; it is identical whether or not discovery ran
/// in parallel.
pub fn discover_candidates(tokens: &[Token], config: &DiscoveryConfig) -> Vec<Candidate> {
    if tokens.len() < config.min_length * 2 {
        return Vec::new();
    }

    let sa = build_suffix_array_auto(tokens, config.parallel);
    let intervals = sa.lcp_intervals(config.min_length);
    if intervals.is_empty() {
        return Vec::new();
    }

    let raw = collect_lengths(tokens, &sa, &intervals, config);
    let mut candidates = deduplicate_candidates(raw, config);
    candidates.sort_by(canonical_cmp);
    candidates
}

#[cfg(feature = "parallel")]
fn collect_lengths(
    tokens: &[Token],
    sa: &SuffixArray,
    intervals: &[LcpInterval],
    config: &DiscoveryConfig,
) -> Vec<Candidate> {
    if config.parallel {
        let lengths: Vec<usize> = (config.min_length..=config.max_length).collect();
        lengths
            .par_iter()
            .flat_map(|&length| candidates_at_length(tokens, sa, intervals, length, config))
            .collect()
    } else {
        collect_lengths_sequential(tokens, sa, intervals, config)
    }
}

#[cfg(not(feature = "parallel"))]
fn collect_lengths(
    tokens: &[Token],
    sa: &SuffixArray,
    intervals: &[LcpInterval],
    config: &DiscoveryConfig,
) -> Vec<Candidate> {
    collect_lengths_sequential(tokens, sa, intervals, config)
}

fn collect_lengths_sequential(
    tokens: &[Token],
    sa: &SuffixArray,
    intervals: &[LcpInterval],
    config: &DiscoveryConfig,
) -> Vec<Candidate> {
    (config.min_length..=config.max_length)
        .flat_map(|length| candidates_at_length(tokens, sa, intervals, length, config))
        .collect()
}

/// One discovery work unit: all groups repeating a pattern of exactly
/// `length` tokens. Distinct lengths are independent, which is what makes
/// the parallel mode coordination-free.
///
/// Groups with identical contents are nested suffix-array ranges, so the
/// widest range per pattern is exactly their union; only that one is
/// materialized. Emitted occurrence lists are the raw suffix positions;
/// overlap filtering happens in [`deduplicate_candidates`].
fn candidates_at_length(
    tokens: &[Token],
    sa: &SuffixArray,
    intervals: &[LcpInterval],
    length: usize,
    config: &DiscoveryConfig,
) -> Vec<Candidate> {
    let min_count = min_count_for_compressibility(length, config.overhead)
        .max(config.min_occurrences);

    // Widest sa range per pattern contents.
    let mut widest: HashMap<&[Token], LcpInterval> = HashMap::new();
    let mut order: Vec<&[Token]> = Vec::new();
    for &interval in intervals {
        if interval.lcp < length {
            continue;
        }
        let first = sa.suffix_array[interval.start];
        let key = &tokens[first..first + length];
        match widest.get_mut(key) {
            Some(best) => {
                if interval.end - interval.start > best.end - best.start {
                    *best = interval;
                }
            }
            None => {
                widest.insert(key, interval);
                order.push(key);
            }
        }
    }

    let mut out = Vec::new();
    for key in order {
        let interval = widest[key];
        let group = &sa.suffix_array[interval.start..=interval.end];
        // Group size bounds the occurrence count from above.
        if group.len() < min_count {
            continue;
        }
        let mut positions = group.to_vec();
        positions.sort_unstable();
        out.push(Candidate::new(key.to_vec(), positions));
    }

    out
}

/// Merge candidates with identical contents, then derive each pattern's
/// canonical occurrence list: positions sorted ascending and greedily
/// thinned to a maximal non-overlapping subset. Patterns that fail the
/// savings test on the filtered count are dropped.
pub fn deduplicate_candidates(
    candidates: Vec<Candidate>,
    config: &DiscoveryConfig,
) -> Vec<Candidate> {
    let mut order: Vec<Vec<Token>> = Vec::new();
    let mut merged: HashMap<Vec<Token>, Vec<usize>> = HashMap::new();

    for candidate in candidates {
        match merged.get_mut(&candidate.subsequence) {
            Some(positions) => positions.extend(candidate.positions),
            None => {
                order.push(candidate.subsequence.clone());
                merged.insert(candidate.subsequence, candidate.positions);
            }
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for pattern in order {
        let mut positions = merged.remove(&pattern).unwrap_or_default();
        positions.sort_unstable();
        positions.dedup();

        let length = pattern.len();
        let filtered = non_overlapping_positions(&positions, length);
        if filtered.len() < config.min_occurrences {
            continue;
        }
        if !is_compressible(length, filtered.len(), config.overhead) {
            continue;
        }
        out.push(Candidate::new(pattern, filtered));
    }

    out
}
