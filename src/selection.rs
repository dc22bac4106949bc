//! Pattern selection strategies.
//!
//! Selection turns the candidate list into a set of pairwise disjoint
//! occurrences whose replacement yields positive net savings per pattern.
//! Four strategies share the same invariants and tie-break rules; they
//! differ only in how hard they work for the last few tokens.

use crate::types::{
    compute_savings, is_compressible, min_count_for_compressibility, Candidate, Occurrence,
    SelectionMode, TokenSeq, PATTERN_OVERHEAD,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Refinement passes before giving up on a stable selection.
const MAX_REFINEMENT_ROUNDS: usize = 10;

/// Result of pattern selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionResult {
    /// Selected occurrences, sorted by start position
    pub selected: Vec<Occurrence>,
    /// Unique selected patterns in meta-token assignment order
    pub pattern_order: Vec<TokenSeq>,
}

impl SelectionResult {
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Select occurrences using the configured strategy.
pub fn select_occurrences(
    candidates: &[Candidate],
    mode: SelectionMode,
    beam_width: usize,
    priority_weight: f64,
) -> SelectionResult {
    match mode {
        SelectionMode::Greedy => select_greedy(candidates, priority_weight),
        SelectionMode::Optimal => select_optimal(candidates, priority_weight),
        SelectionMode::Beam => select_beam(candidates, beam_width, priority_weight),
        // No ILP solver is linked; degrade to the optimal scheduler.
        SelectionMode::Ilp => select_optimal(candidates, priority_weight),
    }
}

/// Ordering savings: raw savings boosted by the scorer priority.
#[inline]
fn boosted(savings: f64, priority: f64, weight: f64) -> f64 {
    savings * (1.0 + weight * priority.clamp(0.0, 1.0))
}

/// Savings density of a candidate: net tokens gained per token of cost.
#[inline]
fn savings_density(candidate: &Candidate) -> f64 {
    let gross = (candidate.length as f64 - 1.0) * candidate.count() as f64;
    gross / (candidate.length + candidate.count() + PATTERN_OVERHEAD) as f64
}

/// Tie-break shared by every mode: longer pattern, then higher occurrence
/// count, then lex-smaller contents, then earlier first occurrence.
fn tie_break(a: &Candidate, b: &Candidate) -> Ordering {
    b.length
        .cmp(&a.length)
        .then(b.count().cmp(&a.count()))
        .then_with(|| a.subsequence.cmp(&b.subsequence))
        .then(a.first_position().cmp(&b.first_position()))
}

/// Disjoint half-open intervals keyed by start position.
#[derive(Debug, Clone, Default)]
struct IntervalSet {
    spans: BTreeMap<usize, usize>,
}

impl IntervalSet {
    fn is_free(&self, start: usize, end: usize) -> bool {
        if let Some((_, &prev_end)) = self.spans.range(..=start).next_back() {
            if prev_end > start {
                return false;
            }
        }
        if let Some((&next_start, _)) = self.spans.range(start..).next() {
            if next_start < end {
                return false;
            }
        }
        true
    }

    fn occupy(&mut self, start: usize, end: usize) {
        self.spans.insert(start, end);
    }
}

/// Sweep candidates in a fixed order, accepting every occurrence that does
/// not collide with an already accepted one. Returns accepted positions
/// per candidate index.
fn sweep(candidates: &[Candidate], order: &[usize]) -> HashMap<usize, Vec<usize>> {
    let mut occupied = IntervalSet::default();
    let mut accepted: HashMap<usize, Vec<usize>> = HashMap::new();

    for &idx in order {
        let candidate = &candidates[idx];
        let mut taken = Vec::new();
        for &start in &candidate.positions {
            let end = start + candidate.length;
            if occupied.is_free(start, end) {
                occupied.occupy(start, end);
                taken.push(start);
            }
        }
        if !taken.is_empty() {
            accepted.insert(idx, taken);
        }
    }

    accepted
}

/// Repeatedly sweep, dropping patterns whose accepted count fails the
/// savings test, until the selection is stable. Dropping a pattern frees
/// its intervals for the survivors, so the sweep restarts from scratch.
fn refine(
    candidates: &[Candidate],
    mut viable: Vec<usize>,
    reorder: impl Fn(&[Candidate], &mut Vec<usize>),
) -> HashMap<usize, Vec<usize>> {
    let mut accepted = HashMap::new();
    for _round in 0..MAX_REFINEMENT_ROUNDS {
        if viable.is_empty() {
            return HashMap::new();
        }
        reorder(candidates, &mut viable);
        accepted = sweep(candidates, &viable);

        let failing: HashSet<usize> = viable
            .iter()
            .copied()
            .filter(|idx| {
                let count = accepted.get(idx).map_or(0, Vec::len);
                !is_compressible(candidates[*idx].length, count, PATTERN_OVERHEAD)
            })
            .collect();

        if failing.is_empty() {
            return accepted;
        }
        viable.retain(|idx| !failing.contains(idx));
    }

    // Did not stabilize within the round cap; keep what cleared the bar in
    // the last sweep. Dropping entries keeps the survivors disjoint.
    accepted.retain(|&idx, positions| {
        is_compressible(candidates[idx].length, positions.len(), PATTERN_OVERHEAD)
    });
    accepted
}

/// Greedy selection ordered by savings density.
pub fn select_greedy(candidates: &[Candidate], priority_weight: f64) -> SelectionResult {
    let viable = viable_indices(candidates);
    let accepted = refine(candidates, viable, |cands, order| {
        order.sort_by(|&a, &b| {
            let da = boosted(savings_density(&cands[a]), cands[a].priority, priority_weight);
            let db = boosted(savings_density(&cands[b]), cands[b].priority, priority_weight);
            db.partial_cmp(&da)
                .unwrap_or(Ordering::Equal)
                .then_with(|| tie_break(&cands[a], &cands[b]))
        });
    });
    build_result(candidates, &accepted)
}

/// Weighted interval scheduling over occurrences.
///
/// Each occurrence weighs its gross saving minus an amortized share of the
/// pattern's dictionary cost; the classic end-sorted DP with predecessor
/// binary search picks the heaviest disjoint subset. The compressibility
/// refinement then re-runs the DP without patterns that fell short.
pub fn select_optimal(candidates: &[Candidate], priority_weight: f64) -> SelectionResult {
    let mut viable = viable_indices(candidates);
    let mut last_accepted: HashMap<usize, Vec<usize>> = HashMap::new();

    for _round in 0..MAX_REFINEMENT_ROUNDS {
        if viable.is_empty() {
            return SelectionResult::default();
        }

        // Flatten to (start, end, candidate index), sorted by end position.
        let mut occs: Vec<(usize, usize, usize)> = Vec::new();
        for &idx in &viable {
            let c = &candidates[idx];
            for &start in &c.positions {
                occs.push((start, start + c.length, idx));
            }
        }
        occs.sort_by(|a, b| {
            a.1.cmp(&b.1)
                .then(a.0.cmp(&b.0))
                .then_with(|| tie_break(&candidates[a.2], &candidates[b.2]))
        });

        let n = occs.len();
        let ends: Vec<usize> = occs.iter().map(|o| o.1).collect();
        // p[i]: number of occurrences ending at or before occs[i] starts.
        let p: Vec<usize> = occs
            .iter()
            .map(|o| ends.partition_point(|&e| e <= o.0))
            .collect();

        let weights: Vec<f64> = occs
            .iter()
            .map(|&(_, _, idx)| {
                let c = &candidates[idx];
                let amortized = (c.length + PATTERN_OVERHEAD) as f64 / c.count() as f64;
                let base = (c.length as f64 - 1.0 - amortized).max(0.0);
                boosted(base, c.priority, priority_weight)
            })
            .collect();

        // dp[i]: best total over the first i occurrences.
        let mut dp = vec![0.0f64; n + 1];
        for i in 0..n {
            let take = weights[i] + dp[p[i]];
            dp[i + 1] = if take > dp[i] { take } else { dp[i] };
        }

        let mut chosen: Vec<usize> = Vec::new();
        let mut i = n;
        while i > 0 {
            if dp[i] > dp[i - 1] {
                chosen.push(i - 1);
                i = p[i - 1];
            } else {
                i -= 1;
            }
        }
        chosen.reverse();

        let mut accepted: HashMap<usize, Vec<usize>> = HashMap::new();
        for &oi in &chosen {
            let (start, _, idx) = occs[oi];
            accepted.entry(idx).or_default().push(start);
        }

        let failing: HashSet<usize> = viable
            .iter()
            .copied()
            .filter(|idx| {
                let count = accepted.get(idx).map_or(0, Vec::len);
                !is_compressible(candidates[*idx].length, count, PATTERN_OVERHEAD)
            })
            .collect();

        if failing.is_empty() {
            return build_result(candidates, &accepted);
        }
        viable.retain(|idx| !failing.contains(idx));
        last_accepted = accepted;
    }

    // Round cap reached; keep the compressible patterns of the last pass.
    last_accepted.retain(|&idx, positions| {
        is_compressible(candidates[idx].length, positions.len(), PATTERN_OVERHEAD)
    });
    build_result(candidates, &last_accepted)
}

/// One partial selection tracked by the beam.
#[derive(Debug, Clone, Default)]
struct BeamState {
    taken: Vec<usize>,
    occupied: IntervalSet,
    accepted: Vec<(usize, Vec<usize>)>,
    savings: i64,
}

/// Beam search over include/exclude decisions in score order. Keeps the
/// `width` best partial selections by total savings.
pub fn select_beam(candidates: &[Candidate], width: usize, priority_weight: f64) -> SelectionResult {
    let mut order = viable_indices(candidates);
    order.sort_by(|&a, &b| {
        let sa = boosted(
            candidates[a].raw_savings() as f64,
            candidates[a].priority,
            priority_weight,
        );
        let sb = boosted(
            candidates[b].raw_savings() as f64,
            candidates[b].priority,
            priority_weight,
        );
        sb.partial_cmp(&sa)
            .unwrap_or(Ordering::Equal)
            .then_with(|| tie_break(&candidates[a], &candidates[b]))
    });

    let mut beam = vec![BeamState::default()];
    for &idx in &order {
        let candidate = &candidates[idx];
        let mut expanded = Vec::with_capacity(beam.len() * 2);

        for state in &beam {
            // Exclude branch.
            expanded.push(state.clone());

            // Include branch: take every occurrence still free here.
            let mut taken = Vec::new();
            for &start in &candidate.positions {
                let end = start + candidate.length;
                if state.occupied.is_free(start, end)
                    && taken
                        .last()
                        .map_or(true, |&last: &usize| start >= last + candidate.length)
                {
                    taken.push(start);
                }
            }
            if !is_compressible(candidate.length, taken.len(), PATTERN_OVERHEAD) {
                continue;
            }

            let mut next = state.clone();
            for &start in &taken {
                next.occupied.occupy(start, start + candidate.length);
            }
            next.savings += compute_savings(candidate.length, taken.len(), PATTERN_OVERHEAD);
            next.accepted.push((idx, taken));
            next.taken.push(idx);
            expanded.push(next);
        }

        expanded.sort_by(|a, b| {
            b.savings
                .cmp(&a.savings)
                .then_with(|| a.taken.cmp(&b.taken))
        });
        expanded.truncate(width.max(1));
        beam = expanded;
    }

    let best = match beam.into_iter().next() {
        Some(state) => state,
        None => return SelectionResult::default(),
    };
    let accepted: HashMap<usize, Vec<usize>> = best.accepted.into_iter().collect();
    build_result(candidates, &accepted)
}

/// Candidates whose full occurrence list could possibly pay off.
fn viable_indices(candidates: &[Candidate]) -> Vec<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| {
            c.count() >= min_count_for_compressibility(c.length, PATTERN_OVERHEAD)
        })
        .map(|(i, _)| i)
        .collect()
}

/// Materialize the occurrence list and the meta-token assignment order.
///
/// The assignment order is the selection order after tie-breaking:
/// realized savings descending, then the shared tie-break chain. It is the
/// same for every mode given the same accepted sets.
fn build_result(
    candidates: &[Candidate],
    accepted: &HashMap<usize, Vec<usize>>,
) -> SelectionResult {
    let mut kept: Vec<(usize, &Vec<usize>)> = accepted
        .iter()
        .filter(|(_, positions)| !positions.is_empty())
        .map(|(&idx, positions)| (idx, positions))
        .collect();

    kept.sort_by(|&(ia, pa), &(ib, pb)| {
        let ca = &candidates[ia];
        let cb = &candidates[ib];
        let sa = compute_savings(ca.length, pa.len(), PATTERN_OVERHEAD);
        let sb = compute_savings(cb.length, pb.len(), PATTERN_OVERHEAD);
        sb.cmp(&sa)
            .then(cb.length.cmp(&ca.length))
            .then(pb.len().cmp(&pa.len()))
            .then_with(|| ca.subsequence.cmp(&cb.subsequence))
            .then_with(|| pa.first().cmp(&pb.first()))
    });

    let mut selected = Vec::new();
    let mut pattern_order = Vec::with_capacity(kept.len());
    for (idx, positions) in kept {
        let candidate = &candidates[idx];
        pattern_order.push(candidate.subsequence.clone());
        for &start in positions {
            selected.push(Occurrence {
                start,
                length: candidate.length,
                subsequence: candidate.subsequence.clone(),
                priority: candidate.priority,
            });
        }
    }
    selected.sort_by_key(|occ| occ.start);

    SelectionResult {
        selected,
        pattern_order,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint(selected: &[Occurrence]) {
        let mut covered: HashSet<usize> = HashSet::new();
        for occ in selected {
            for pos in occ.start..occ.end() {
                assert!(covered.insert(pos), "position {pos} doubly covered");
            }
        }
    }

    fn total_savings(result: &SelectionResult) -> i64 {
        let mut counts: HashMap<&TokenSeq, (usize, usize)> = HashMap::new();
        for occ in &result.selected {
            let entry = counts.entry(&occ.subsequence).or_insert((occ.length, 0));
            entry.1 += 1;
        }
        counts
            .values()
            .map(|&(length, count)| compute_savings(length, count, PATTERN_OVERHEAD))
            .sum()
    }

    #[test]
    fn empty_input_every_mode() {
        for mode in [
            SelectionMode::Greedy,
            SelectionMode::Optimal,
            SelectionMode::Beam,
            SelectionMode::Ilp,
        ] {
            let result = select_occurrences(&[], mode, 8, 1.0);
            assert!(result.is_empty());
            assert!(result.pattern_order.is_empty());
        }
    }

    #[test]
    fn sub_threshold_candidate_rejected() {
        // Length 2 at 3 occurrences can never pay for its entry.
        let cand = Candidate::new(vec![1, 2], vec![0, 4, 8]);
        assert!(select_greedy(&[cand], 1.0).is_empty());
    }

    #[test]
    fn compressible_candidate_fully_selected() {
        let cand = Candidate::new(vec![1, 2], vec![0, 3, 6, 9, 12]);
        for mode in [SelectionMode::Greedy, SelectionMode::Optimal, SelectionMode::Beam] {
            let result = select_occurrences(std::slice::from_ref(&cand), mode, 8, 1.0);
            assert_eq!(result.selected.len(), 5, "{mode:?}");
            assert_eq!(result.pattern_order, vec![vec![1, 2]]);
            assert_disjoint(&result.selected);
        }
    }

    #[test]
    fn overlapping_candidates_stay_disjoint() {
        let a = Candidate::new(vec![1, 2, 3], vec![0, 6, 12, 18]);
        let b = Candidate::new(vec![2, 3, 4], vec![1, 7, 13, 19]);
        for mode in [SelectionMode::Greedy, SelectionMode::Optimal, SelectionMode::Beam] {
            let result = select_occurrences(&[a.clone(), b.clone()], mode, 8, 1.0);
            assert_disjoint(&result.selected);
        }
    }

    #[test]
    fn optimal_at_least_matches_greedy() {
        // Greedy's density ordering can strand occurrences that the DP
        // recovers; optimal must never do worse.
        let candidates = vec![
            Candidate::new(vec![1, 2, 3, 4], vec![0, 10, 20]),
            Candidate::new(vec![3, 4, 5], vec![2, 12, 22, 30, 40]),
            Candidate::new(vec![6, 7], vec![50, 53, 56, 59, 62]),
        ];
        let greedy = select_greedy(&candidates, 1.0);
        let optimal = select_optimal(&candidates, 1.0);
        assert_disjoint(&greedy.selected);
        assert_disjoint(&optimal.selected);
        assert!(total_savings(&optimal) >= total_savings(&greedy));
    }

    #[test]
    fn ilp_degrades_to_optimal() {
        let candidates = vec![Candidate::new(vec![1, 2], vec![0, 3, 6, 9, 12])];
        let ilp = select_occurrences(&candidates, SelectionMode::Ilp, 8, 1.0);
        let optimal = select_occurrences(&candidates, SelectionMode::Optimal, 8, 1.0);
        assert_eq!(ilp.selected, optimal.selected);
        assert_eq!(ilp.pattern_order, optimal.pattern_order);
    }

    #[test]
    fn beam_width_one_still_valid() {
        let candidates = vec![
            Candidate::new(vec![1, 2, 3], vec![0, 5, 10]),
            Candidate::new(vec![4, 5, 6], vec![20, 25, 30]),
        ];
        let result = select_beam(&candidates, 1, 1.0);
        assert_disjoint(&result.selected);
        assert!(!result.is_empty());
    }

    #[test]
    fn priority_reorders_equal_candidates() {
        // Two length-3 patterns with identical shapes; priority promotes
        // the second one ahead of the first.
        let mut low = Candidate::new(vec![1, 2, 3], vec![0, 4, 8]);
        let mut high = Candidate::new(vec![1, 2, 4], vec![2, 6, 10]);
        low.priority = 0.0;
        high.priority = 1.0;

        let result = select_greedy(&[low, high], 1.0);
        assert!(!result.is_empty());
        // The boosted candidate wins the contested span.
        assert_eq!(result.selected[0].subsequence, vec![1, 2, 4]);
    }

    #[test]
    fn refinement_releases_failed_patterns() {
        // The long pattern blocks the short one; once the short pattern's
        // survivors fall below profitability it must be dropped entirely,
        // leaving the long pattern intact.
        let long = Candidate::new(vec![1, 2, 3, 4, 5, 6, 7, 8], vec![0, 8]);
        let short = Candidate::new(vec![1, 2], vec![0, 2, 4, 16, 18]);
        let result = select_greedy(&[long, short], 1.0);
        assert_disjoint(&result.selected);
        for occ in &result.selected {
            assert_eq!(occ.subsequence.len(), 8);
        }
    }

    #[test]
    fn deterministic_given_equal_input() {
        let candidates = vec![
            Candidate::new(vec![5, 6, 7], vec![0, 10, 20, 30]),
            Candidate::new(vec![8, 9], vec![3, 13, 23, 33, 43]),
        ];
        let a = select_occurrences(&candidates, SelectionMode::Greedy, 8, 1.0);
        let b = select_occurrences(&candidates, SelectionMode::Greedy, 8, 1.0);
        assert_eq!(a.selected, b.selected);
        assert_eq!(a.pattern_order, b.pattern_order);
    }
}
