//! Collaborator hooks.
//!
//! Capability objects the embedding layers may supply: a priority scorer
//! feeding selection ordering, a region filter vetoing candidates over
//! protected spans, and static dictionary injection. All are optional and
//! none affect the non-overlap or net-savings invariants.

use crate::error::{LtscError, Result};
use crate::types::{Candidate, CompressionConfig, Token, TokenSeq};
use std::collections::HashSet;

/// Scores a candidate's importance in [0, 1]; selection multiplies
/// ordering savings by `1 + priority_weight * score`.
pub trait PriorityScorer {
    fn score_candidate(&self, candidate: &Candidate, tokens: &[Token]) -> f64;
}

/// Decides whether a candidate may be compressed at all.
pub trait RegionFilter {
    fn allows(&self, candidate: &Candidate) -> bool;
}

/// Default scorer: every candidate is indifferent.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScorer;

impl PriorityScorer for IdentityScorer {
    fn score_candidate(&self, _candidate: &Candidate, _tokens: &[Token]) -> f64 {
        0.0
    }
}

/// Default filter: nothing is protected.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl RegionFilter for AllowAll {
    fn allows(&self, _candidate: &Candidate) -> bool {
        true
    }
}

/// Pre-populated (pattern, meta-token) bindings applied before dynamic
/// discovery. Bound meta-tokens are reserved out of the meta range before
/// the dynamic counter starts.
#[derive(Debug, Clone)]
pub struct StaticDictionary {
    /// Catalogue identifier recorded on the result
    pub id: String,
    pub bindings: Vec<(TokenSeq, Token)>,
}

impl StaticDictionary {
    pub fn new(id: impl Into<String>, bindings: Vec<(TokenSeq, Token)>) -> Self {
        Self {
            id: id.into(),
            bindings,
        }
    }

    /// Bindings must sit inside the meta range, be mutually distinct, and
    /// define non-empty patterns of ordinary tokens.
    pub fn validate(&self, config: &CompressionConfig) -> Result<()> {
        let mut seen: HashSet<Token> = HashSet::with_capacity(self.bindings.len());
        for (pattern, meta) in &self.bindings {
            if !config.is_meta_token(*meta) {
                return Err(LtscError::ConfigInvalid(format!(
                    "static dictionary {:?} binds {meta:#010x} outside the meta range",
                    self.id
                )));
            }
            if !seen.insert(*meta) {
                return Err(LtscError::ConfigInvalid(format!(
                    "static dictionary {:?} binds {meta:#010x} twice",
                    self.id
                )));
            }
            if pattern.is_empty() {
                return Err(LtscError::ConfigInvalid(format!(
                    "static dictionary {:?} has an empty pattern",
                    self.id
                )));
            }
            if pattern.iter().any(|&t| config.is_reserved_token(t)) {
                return Err(LtscError::ConfigInvalid(format!(
                    "static dictionary {:?} pattern contains reserved tokens",
                    self.id
                )));
            }
        }
        Ok(())
    }

    /// One past the highest bound meta value, i.e. where dynamic
    /// allocation must start.
    pub fn reserved_end(&self) -> Option<Token> {
        self.bindings.iter().map(|&(_, meta)| meta + 1).max()
    }

    /// Replace non-overlapping occurrences of each bound pattern, longest
    /// pattern first. Returns the rewritten sequence and the bindings that
    /// replaced at least one occurrence, in application order.
    pub fn apply(&self, tokens: &[Token]) -> (TokenSeq, Vec<(TokenSeq, Token)>) {
        let mut ordered: Vec<&(TokenSeq, Token)> = self.bindings.iter().collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));

        let mut current = tokens.to_vec();
        let mut used = Vec::new();
        for (pattern, meta) in ordered {
            let (rewritten, count) = replace_pattern(&current, pattern, *meta);
            if count > 0 {
                used.push((pattern.clone(), *meta));
                current = rewritten;
            }
        }
        (current, used)
    }
}

/// Left-to-right, non-overlapping replacement of `pattern` by `meta`.
fn replace_pattern(tokens: &[Token], pattern: &[Token], meta: Token) -> (TokenSeq, usize) {
    let mut out = Vec::with_capacity(tokens.len());
    let mut count = 0usize;
    let mut i = 0usize;
    while i < tokens.len() {
        if i + pattern.len() <= tokens.len() && &tokens[i..i + pattern.len()] == pattern {
            out.push(meta);
            count += 1;
            i += pattern.len();
        } else {
            out.push(tokens[i]);
            i += 1;
        }
    }
    (out, count)
}

/// The optional capabilities threaded through one compression call.
#[derive(Clone, Copy, Default)]
pub struct CompressionHooks<'a> {
    pub scorer: Option<&'a dyn PriorityScorer>,
    pub region_filter: Option<&'a dyn RegionFilter>,
    pub static_dictionary: Option<&'a StaticDictionary>,
}

impl<'a> CompressionHooks<'a> {
    /// No hooks at all; what the plain `compress` entry point uses.
    pub fn none() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_defaults() {
        let candidate = Candidate::new(vec![1, 2], vec![0, 4]);
        assert_eq!(IdentityScorer.score_candidate(&candidate, &[]), 0.0);
        assert!(AllowAll.allows(&candidate));
    }

    #[test]
    fn static_dictionary_validation() {
        let config = CompressionConfig::default();
        let ok = StaticDictionary::new("cat", vec![(vec![1, 2], 0xFFFF_0000)]);
        assert!(ok.validate(&config).is_ok());

        let out_of_range = StaticDictionary::new("cat", vec![(vec![1, 2], 7)]);
        assert!(out_of_range.validate(&config).is_err());

        let duplicate = StaticDictionary::new(
            "cat",
            vec![(vec![1, 2], 0xFFFF_0000), (vec![3, 4], 0xFFFF_0000)],
        );
        assert!(duplicate.validate(&config).is_err());

        let reserved_pattern =
            StaticDictionary::new("cat", vec![(vec![0xFFFF_FFF0], 0xFFFF_0000)]);
        assert!(reserved_pattern.validate(&config).is_err());
    }

    #[test]
    fn apply_replaces_longest_first() {
        let dict = StaticDictionary::new(
            "cat",
            vec![
                (vec![1, 2], 0xFFFF_0000),
                (vec![1, 2, 3], 0xFFFF_0001),
            ],
        );
        let (rewritten, used) = dict.apply(&[1, 2, 3, 9, 1, 2]);
        assert_eq!(rewritten, vec![0xFFFF_0001, 9, 0xFFFF_0000]);
        assert_eq!(used.len(), 2);
        // Longest pattern applied first.
        assert_eq!(used[0].1, 0xFFFF_0001);
    }

    #[test]
    fn apply_reports_only_used_bindings() {
        let dict = StaticDictionary::new(
            "cat",
            vec![(vec![7, 8], 0xFFFF_0000), (vec![100, 200], 0xFFFF_0001)],
        );
        let (rewritten, used) = dict.apply(&[7, 8, 7, 8]);
        assert_eq!(rewritten, vec![0xFFFF_0000, 0xFFFF_0000]);
        assert_eq!(used, vec![(vec![7, 8], 0xFFFF_0000)]);
    }

    #[test]
    fn reserved_end_past_highest_binding() {
        let dict = StaticDictionary::new(
            "cat",
            vec![(vec![1, 2], 0xFFFF_0004), (vec![3, 4], 0xFFFF_0002)],
        );
        assert_eq!(dict.reserved_end(), Some(0xFFFF_0005));
    }
}
