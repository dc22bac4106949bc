//! Core types for LTSC compression.
//!
//! Token values are partitioned into three disjoint ranges: ordinary
//! application tokens, meta-tokens assigned to patterns by the compressor,
//! and the two control delimiters framing the dictionary section.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use wasm_bindgen::prelude::*;

/// A token is a u32; the TypeScript layer maps these to tokenizer
/// vocabulary indices.
pub type Token = u32;

/// A sequence of tokens.
pub type TokenSeq = Vec<Token>;

/// Per-pattern dictionary overhead in tokens: the entry's meta-token key
/// plus its length field.
pub const PATTERN_OVERHEAD: usize = 2;

/// A candidate pattern discovered during compression.
///
/// `positions` is the canonical non-overlapping occurrence list reported
/// by discovery, sorted ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// The token subsequence that forms this pattern
    pub subsequence: TokenSeq,
    /// Length of the subsequence
    pub length: usize,
    /// Non-overlapping start positions, ascending
    pub positions: Vec<usize>,
    /// Scorer-supplied priority in [0, 1]; 0 when no scorer is installed
    pub priority: f64,
}

impl Candidate {
    pub fn new(subsequence: TokenSeq, positions: Vec<usize>) -> Self {
        let length = subsequence.len();
        Self {
            subsequence,
            length,
            positions,
            priority: 0.0,
        }
    }

    /// Occurrence count after overlap filtering.
    #[inline]
    pub fn count(&self) -> usize {
        self.positions.len()
    }

    /// Net token savings if every reported occurrence is replaced.
    #[inline]
    pub fn raw_savings(&self) -> i64 {
        compute_savings(self.length, self.count(), PATTERN_OVERHEAD)
    }

    #[inline]
    pub fn first_position(&self) -> usize {
        self.positions.first().copied().unwrap_or(usize::MAX)
    }
}

/// An occurrence of a pattern at a specific position.
#[derive(Debug, Clone, PartialEq)]
pub struct Occurrence {
    /// Start position in the token sequence
    pub start: usize,
    /// Length of the pattern
    pub length: usize,
    /// The pattern subsequence
    pub subsequence: TokenSeq,
    /// Priority inherited from the candidate
    pub priority: f64,
}

impl Occurrence {
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Selection strategy. `Ilp` degrades to `Optimal`: no solver is linked in
/// this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SelectionMode {
    #[default]
    Greedy,
    Optimal,
    Beam,
    Ilp,
}

impl SelectionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectionMode::Greedy => "greedy",
            SelectionMode::Optimal => "optimal",
            SelectionMode::Beam => "beam",
            SelectionMode::Ilp => "ilp",
        }
    }
}

impl FromStr for SelectionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "greedy" => Ok(SelectionMode::Greedy),
            "optimal" => Ok(SelectionMode::Optimal),
            "beam" => Ok(SelectionMode::Beam),
            "ilp" => Ok(SelectionMode::Ilp),
            other => Err(format!("unknown selection mode {other:?}")),
        }
    }
}

/// Configuration for compression and decompression.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen]
pub struct CompressionConfig {
    /// Minimum pattern length to consider
    pub min_subsequence_length: usize,
    /// Maximum pattern length to consider
    pub max_subsequence_length: usize,
    /// Cap on dictionary entries per artifact
    pub meta_token_pool_size: usize,
    /// Dictionary start delimiter token ID
    pub dict_start_token: Token,
    /// Dictionary end delimiter token ID
    pub dict_end_token: Token,
    /// First meta-token to allocate
    pub next_meta_token: Token,
    /// Enable hierarchical compression
    pub hierarchical_enabled: bool,
    /// Maximum hierarchical pass count
    pub hierarchical_max_depth: usize,
    /// Selection strategy
    #[wasm_bindgen(skip)]
    pub selection_mode: SelectionMode,
    /// Beam width, active only in beam mode
    pub beam_width: usize,
    /// Weight applied to scorer priorities when ordering candidates
    pub priority_weight: f64,
    /// Buffer estimate cap in bytes; 0 means unlimited
    pub max_memory_bytes: usize,
    /// Run discovery across lengths on parallel workers (requires the
    /// `parallel` feature; ignored without it)
    pub parallel_discovery: bool,
    /// Re-run decompression after emit and compare against the input
    pub verify: bool,
}

#[wasm_bindgen]
impl CompressionConfig {
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self::default()
    }

    #[wasm_bindgen(getter)]
    pub fn selection_mode(&self) -> String {
        self.selection_mode.as_str().to_string()
    }

    #[wasm_bindgen(setter)]
    pub fn set_selection_mode(&mut self, mode: String) {
        if let Ok(parsed) = mode.parse() {
            self.selection_mode = parsed;
        }
    }
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            min_subsequence_length: 2,
            max_subsequence_length: 8,
            meta_token_pool_size: 500,
            dict_start_token: 0xFFFF_FFF0,
            dict_end_token: 0xFFFF_FFF1,
            next_meta_token: 0xFFFF_0000,
            hierarchical_enabled: true,
            hierarchical_max_depth: 3,
            selection_mode: SelectionMode::Greedy,
            beam_width: 8,
            priority_weight: 1.0,
            max_memory_bytes: 0,
            parallel_discovery: false,
            verify: false,
        }
    }
}

impl CompressionConfig {
    /// Exclusive upper bound of the meta range.
    #[inline]
    pub fn meta_range_end(&self) -> Token {
        self.dict_start_token.min(self.dict_end_token)
    }

    /// Number of meta-token values available for allocation.
    pub fn meta_capacity(&self) -> usize {
        let range = self.meta_range_end().saturating_sub(self.next_meta_token) as usize;
        range.min(self.meta_token_pool_size)
    }

    #[inline]
    pub fn is_meta_token(&self, token: Token) -> bool {
        token >= self.next_meta_token && token < self.meta_range_end()
    }

    #[inline]
    pub fn is_control_token(&self, token: Token) -> bool {
        token == self.dict_start_token || token == self.dict_end_token
    }

    /// True for tokens the input may not contain. Values above the
    /// delimiters are ordinary.
    #[inline]
    pub fn is_reserved_token(&self, token: Token) -> bool {
        self.is_meta_token(token) || self.is_control_token(token)
    }
}

/// Counters describing a compression run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[wasm_bindgen]
pub struct CompressionMetrics {
    /// Candidates emitted by discovery across all passes
    pub candidates_discovered: usize,
    /// Patterns that contributed at least one selected occurrence
    pub candidates_selected: usize,
    /// Dictionary entries in the emitted artifact
    pub dictionary_entries: usize,
    /// Compression passes performed (static injection not counted)
    pub passes: usize,
    /// Estimated peak memory in bytes for the suffix structures
    pub peak_memory_bytes: usize,
}

/// Result of a compression operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[wasm_bindgen]
pub struct CompressionResult {
    /// Original tokens (kept for verification)
    #[wasm_bindgen(skip)]
    pub original_tokens: TokenSeq,
    /// Fully serialized output (dictionary + body)
    #[wasm_bindgen(skip)]
    pub serialized_tokens: TokenSeq,
    /// Dictionary tokens only, empty when nothing was selected
    #[wasm_bindgen(skip)]
    pub dictionary_tokens: TokenSeq,
    /// Body tokens only, with meta-token references
    #[wasm_bindgen(skip)]
    pub body_tokens: TokenSeq,
    /// Mapping from meta-token to its (unexpanded) definition
    #[wasm_bindgen(skip)]
    pub dictionary_map: HashMap<Token, TokenSeq>,
    /// Original sequence length
    pub original_length: usize,
    /// Compressed sequence length
    pub compressed_length: usize,
    /// Id of the static dictionary whose entries were applied, if any
    #[wasm_bindgen(skip)]
    pub static_dictionary_id: Option<String>,
    /// Run counters
    #[wasm_bindgen(skip)]
    pub metrics: Option<CompressionMetrics>,
}

#[wasm_bindgen]
impl CompressionResult {
    /// Compression ratio (compressed / original).
    #[wasm_bindgen(getter)]
    pub fn compression_ratio(&self) -> f64 {
        if self.original_length == 0 {
            return 1.0;
        }
        self.compressed_length as f64 / self.original_length as f64
    }

    /// Tokens saved by compression; negative when framing overhead won.
    #[wasm_bindgen(getter)]
    pub fn tokens_saved(&self) -> i64 {
        self.original_length as i64 - self.compressed_length as i64
    }

    #[wasm_bindgen(js_name = getSerializedTokens)]
    pub fn get_serialized_tokens(&self) -> TokenSeq {
        self.serialized_tokens.clone()
    }

    #[wasm_bindgen(js_name = getDictionaryTokens)]
    pub fn get_dictionary_tokens(&self) -> TokenSeq {
        self.dictionary_tokens.clone()
    }

    #[wasm_bindgen(js_name = getBodyTokens)]
    pub fn get_body_tokens(&self) -> TokenSeq {
        self.body_tokens.clone()
    }

    #[wasm_bindgen(js_name = getOriginalTokens)]
    pub fn get_original_tokens(&self) -> TokenSeq {
        self.original_tokens.clone()
    }

    #[wasm_bindgen(js_name = getStaticDictionaryId)]
    pub fn get_static_dictionary_id(&self) -> Option<String> {
        self.static_dictionary_id.clone()
    }

    #[wasm_bindgen(js_name = getMetrics)]
    pub fn get_metrics(&self) -> Option<CompressionMetrics> {
        self.metrics
    }
}

impl CompressionResult {
    /// Result for an input where no pattern was worth replacing: the
    /// stream is the input itself, with no dictionary framing.
    pub fn no_compression(tokens: TokenSeq) -> Self {
        let len = tokens.len();
        Self {
            original_tokens: tokens.clone(),
            serialized_tokens: tokens.clone(),
            dictionary_tokens: Vec::new(),
            body_tokens: tokens,
            dictionary_map: HashMap::new(),
            original_length: len,
            compressed_length: len,
            static_dictionary_id: None,
            metrics: None,
        }
    }
}

/// Compressibility test: replacing `count` occurrences of a pattern of
/// `length` tokens pays for the entry iff
/// `length * count > length + count + overhead`.
#[inline]
pub fn is_compressible(length: usize, count: usize, overhead: usize) -> bool {
    if length <= 1 || count == 0 {
        return false;
    }
    length * count > length + count + overhead
}

/// Smallest occurrence count at which a pattern of `length` tokens clears
/// the compressibility test.
#[inline]
pub fn min_count_for_compressibility(length: usize, overhead: usize) -> usize {
    if length <= 1 {
        return usize::MAX;
    }
    // count * (length - 1) > length + overhead
    (length + overhead) / (length - 1) + 1
}

/// Net token savings, signed: `length*count - (length + count + overhead)`.
#[inline]
pub fn compute_savings(length: usize, count: usize, overhead: usize) -> i64 {
    (length * count) as i64 - (length + count + overhead) as i64
}
