//! LTSC Core - Lossless Token Sequence Compression
//!
//! WebAssembly core for the LTSC compression library: lossless compression
//! of LLM token sequences via suffix-array pattern discovery, non-overlap
//! occurrence selection, and a self-describing dictionary wire format.
//!
//! # Example (from JavaScript)
//!
//! ```javascript
//! import { initWasm, compress, decompress } from '@ltsc/sdk';
//!
//! await initWasm();
//! const tokens = [1, 2, 3, 1, 2, 3, 1, 2, 3];
//! const result = await compress(tokens);
//! const restored = await decompress(result.getSerializedTokens());
//! ```
//!
//! The same engine is a plain Rust library: [`compress_tokens`],
//! [`decompress_tokens`] and [`discover`] are the native entry points.

pub mod config;
pub mod dictionary;
pub mod discovery;
pub mod error;
pub mod hooks;
pub mod selection;
pub mod suffix_array;
#[cfg(feature = "parallel")]
pub mod suffix_array_parallel;
pub mod types;

use config::JsCompressionConfig;
use dictionary::{build_body, serialize_dictionary, Dictionary};
use discovery::{discover_candidates, DiscoveryConfig};
use error::{LtscError, Result};
use hooks::CompressionHooks;
use selection::select_occurrences;
use types::{
    Candidate, CompressionConfig, CompressionMetrics, CompressionResult, Token, TokenSeq,
    PATTERN_OVERHEAD,
};
use wasm_bindgen::prelude::*;

/// Initialize panic reporting for the wasm build.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Compress a token sequence.
///
/// `config` is an optional JS object with camelCase fields; see
/// [`JsCompressionConfig`].
#[wasm_bindgen]
pub fn compress(tokens: &[u32], config: JsValue) -> std::result::Result<CompressionResult, JsValue> {
    let config = JsCompressionConfig::from_js(config)?.merge_with_defaults()?;
    Ok(compress_tokens(tokens, &config)?)
}

/// Decompress a serialized token sequence.
#[wasm_bindgen]
pub fn decompress(tokens: &[u32], config: JsValue) -> std::result::Result<Vec<u32>, JsValue> {
    let config = JsCompressionConfig::from_js(config)?.merge_with_defaults()?;
    Ok(decompress_tokens(tokens, &config)?)
}

/// Discover repeated patterns without compressing.
///
/// Useful for analysis and for building static dictionary catalogues.
#[wasm_bindgen]
pub fn discover_patterns(
    tokens: &[u32],
    min_length: usize,
    max_length: usize,
) -> std::result::Result<JsValue, JsValue> {
    let candidates = discover(tokens, min_length, max_length)?;
    let rows: Vec<serde_json::Value> = candidates
        .iter()
        .map(|c| {
            serde_json::json!({
                "pattern": c.subsequence,
                "length": c.length,
                "positions": c.positions,
                "count": c.count(),
                "rawSavings": c.raw_savings(),
            })
        })
        .collect();
    serde_wasm_bindgen::to_value(&rows).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Crate version, for the SDK's diagnostics.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Compress with the default (absent) hooks.
pub fn compress_tokens(tokens: &[Token], config: &CompressionConfig) -> Result<CompressionResult> {
    compress_with_hooks(tokens, config, &CompressionHooks::none())
}

/// Compress with collaborator hooks: static dictionary injection, a
/// priority scorer, and a region filter.
///
/// The pipeline is a pure function of its inputs: validate, apply the
/// static dictionary, then run discover/select/replace passes until the
/// depth limit or until a pass selects nothing, and serialize once at the
/// end. Each pass allocates meta-tokens past the previous pass's, so
/// layers can never collide.
pub fn compress_with_hooks(
    tokens: &[Token],
    config: &CompressionConfig,
    hooks: &CompressionHooks,
) -> Result<CompressionResult> {
    config.validate()?;
    validate_token_ranges(tokens, config)?;
    check_memory_estimate(tokens.len(), config)?;
    if let Some(static_dict) = hooks.static_dictionary {
        static_dict.validate(config)?;
    }

    let mut metrics = CompressionMetrics {
        peak_memory_bytes: suffix_array::estimated_peak_bytes(tokens.len()),
        ..Default::default()
    };

    let mut dict = Dictionary::default();
    let mut next_meta = config.next_meta_token;
    let mut static_dictionary_id = None;
    let mut current: TokenSeq = tokens.to_vec();

    if let Some(static_dict) = hooks.static_dictionary {
        let (rewritten, used) = static_dict.apply(&current);
        if !used.is_empty() {
            for (pattern, meta) in used {
                dict.push(meta, pattern);
            }
            static_dictionary_id = Some(static_dict.id.clone());
            current = rewritten;
        }
        // Static bindings are reserved whether or not they matched.
        if let Some(end) = static_dict.reserved_end() {
            next_meta = next_meta.max(end);
        }
    }

    let max_passes = if config.hierarchical_enabled {
        config.hierarchical_max_depth.max(1)
    } else {
        1
    };

    for _depth in 0..max_passes {
        if current.len() < config.min_subsequence_length * 2 {
            break;
        }

        let discovery_config = DiscoveryConfig {
            min_length: config.min_subsequence_length,
            max_length: config.max_subsequence_length,
            min_occurrences: 2,
            overhead: PATTERN_OVERHEAD,
            parallel: config.parallel_discovery,
        };
        let mut candidates = discover_candidates(&current, &discovery_config);
        metrics.candidates_discovered += candidates.len();

        if let Some(filter) = hooks.region_filter {
            candidates.retain(|c| filter.allows(c));
        }
        if let Some(scorer) = hooks.scorer {
            for candidate in &mut candidates {
                candidate.priority = scorer.score_candidate(candidate, &current).clamp(0.0, 1.0);
            }
        }
        if candidates.is_empty() {
            break;
        }

        let selection = select_occurrences(
            &candidates,
            config.selection_mode,
            config.beam_width,
            config.priority_weight,
        );
        if selection.is_empty() {
            break;
        }
        metrics.candidates_selected += selection.pattern_order.len();

        let pass_map = dict.assign_patterns(&selection.pattern_order, &mut next_meta, config)?;
        current = build_body(&current, &selection.selected, &pass_map);
        metrics.passes += 1;
    }

    metrics.dictionary_entries = dict.len();

    if dict.is_empty() {
        let mut result = CompressionResult::no_compression(tokens.to_vec());
        result.metrics = Some(metrics);
        return Ok(result);
    }

    let dictionary_tokens = serialize_dictionary(&dict, config)?;
    let mut serialized = Vec::with_capacity(dictionary_tokens.len() + current.len());
    serialized.extend_from_slice(&dictionary_tokens);
    serialized.extend_from_slice(&current);

    let result = CompressionResult {
        original_tokens: tokens.to_vec(),
        compressed_length: serialized.len(),
        serialized_tokens: serialized,
        dictionary_tokens,
        body_tokens: current,
        dictionary_map: dict.map,
        original_length: tokens.len(),
        static_dictionary_id,
        metrics: Some(metrics),
    };

    if config.verify {
        let restored = dictionary::decompress(&result.serialized_tokens, config)?;
        if restored != tokens {
            return Err(LtscError::VerificationFailure {
                offset: first_mismatch(&restored, tokens),
            });
        }
    }

    Ok(result)
}

/// Reconstruct the original sequence from a serialized stream.
pub fn decompress_tokens(tokens: &[Token], config: &CompressionConfig) -> Result<TokenSeq> {
    config.validate()?;
    dictionary::decompress(tokens, config)
}

/// Enumerate candidate patterns with lengths in `[min_length, max_length]`.
pub fn discover(tokens: &[Token], min_length: usize, max_length: usize) -> Result<Vec<Candidate>> {
    if min_length < 2 {
        return Err(LtscError::ConfigInvalid(format!(
            "min_length must be at least 2, got {min_length}"
        )));
    }
    if max_length < min_length {
        return Err(LtscError::ConfigInvalid(format!(
            "max_length {max_length} is below min_length {min_length}"
        )));
    }
    Ok(discover_candidates(
        tokens,
        &DiscoveryConfig {
            min_length,
            max_length,
            ..Default::default()
        },
    ))
}

fn validate_token_ranges(tokens: &[Token], config: &CompressionConfig) -> Result<()> {
    for (position, &token) in tokens.iter().enumerate() {
        if config.is_reserved_token(token) {
            return Err(LtscError::TokenRangeCollision { token, position });
        }
    }
    Ok(())
}

fn check_memory_estimate(n: usize, config: &CompressionConfig) -> Result<()> {
    if config.max_memory_bytes == 0 {
        return Ok(());
    }
    let required = suffix_array::estimated_peak_bytes(n);
    if required > config.max_memory_bytes {
        return Err(LtscError::MemoryExceeded {
            required,
            cap: config.max_memory_bytes,
        });
    }
    Ok(())
}

fn first_mismatch(a: &[Token], b: &[Token]) -> usize {
    a.iter()
        .zip(b.iter())
        .position(|(x, y)| x != y)
        .unwrap_or_else(|| a.len().min(b.len()))
}

/// Streaming compressor for large inputs.
///
/// Chunks accumulate; the full pipeline runs once at `finish`.
#[wasm_bindgen]
pub struct StreamingCompressor {
    chunks: Vec<TokenSeq>,
    config: CompressionConfig,
}

#[wasm_bindgen]
impl StreamingCompressor {
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> std::result::Result<StreamingCompressor, JsValue> {
        let config = JsCompressionConfig::from_js(config)?.merge_with_defaults()?;
        Ok(Self::with_config(config))
    }

    /// Buffer a chunk of tokens.
    pub fn add_chunk(&mut self, tokens: &[u32]) {
        self.chunks.push(tokens.to_vec());
    }

    /// Concatenate the buffered chunks and compress the whole sequence.
    pub fn finish(self) -> std::result::Result<CompressionResult, JsValue> {
        let total: usize = self.chunks.iter().map(Vec::len).sum();
        let mut tokens = Vec::with_capacity(total);
        for chunk in &self.chunks {
            tokens.extend_from_slice(chunk);
        }
        Ok(compress_tokens(&tokens, &self.config)?)
    }

    /// Approximate bytes buffered so far.
    pub fn memory_usage(&self) -> usize {
        self.chunks.iter().map(|c| c.len() * 4).sum()
    }
}

impl StreamingCompressor {
    /// Native constructor for Rust callers.
    pub fn with_config(config: CompressionConfig) -> Self {
        Self {
            chunks: Vec::new(),
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compress_repetitive_input() {
        let tokens: TokenSeq = [1, 2, 3, 4, 5].iter().cycle().take(50).copied().collect();
        let config = CompressionConfig::default();

        let result = compress_tokens(&tokens, &config).unwrap();
        assert!(result.compressed_length < result.original_length);
        assert!(result.compression_ratio() < 1.0);

        let restored = decompress_tokens(&result.serialized_tokens, &config).unwrap();
        assert_eq!(restored, tokens);
    }

    #[test]
    fn no_compression_for_unique_tokens() {
        let tokens: TokenSeq = (1..100).collect();
        let config = CompressionConfig::default();
        let result = compress_tokens(&tokens, &config).unwrap();
        assert_eq!(result.serialized_tokens, tokens);
        assert!(result.dictionary_tokens.is_empty());
    }

    #[test]
    fn no_compression_for_tiny_input() {
        let config = CompressionConfig::default();
        let result = compress_tokens(&[1, 2, 3], &config).unwrap();
        assert_eq!(result.serialized_tokens, vec![1, 2, 3]);
    }

    #[test]
    fn empty_input_round_trips() {
        let config = CompressionConfig::default();
        let result = compress_tokens(&[], &config).unwrap();
        assert!(result.serialized_tokens.is_empty());
        assert_eq!(decompress_tokens(&[], &config).unwrap(), Vec::<Token>::new());
    }

    #[test]
    fn reserved_input_token_is_rejected() {
        let config = CompressionConfig::default();
        let tokens = vec![1, 2, 0xFFFF_FFF0, 3];
        match compress_tokens(&tokens, &config) {
            Err(LtscError::TokenRangeCollision { token, position }) => {
                assert_eq!(token, 0xFFFF_FFF0);
                assert_eq!(position, 2);
            }
            other => panic!("expected TokenRangeCollision, got {other:?}"),
        }
        // A meta-range value is just as reserved, allocated or not.
        assert!(matches!(
            compress_tokens(&[1, 0xFFFF_0000], &config),
            Err(LtscError::TokenRangeCollision { position: 1, .. })
        ));
    }

    #[test]
    fn memory_cap_enforced() {
        let config = CompressionConfig {
            max_memory_bytes: 64,
            ..Default::default()
        };
        let tokens: TokenSeq = (0..1000).map(|i| i % 7).collect();
        assert!(matches!(
            compress_tokens(&tokens, &config),
            Err(LtscError::MemoryExceeded { .. })
        ));
    }

    #[test]
    fn verify_mode_passes_on_sound_output() {
        let tokens: TokenSeq = [9, 8, 7].iter().cycle().take(30).copied().collect();
        let config = CompressionConfig {
            verify: true,
            ..Default::default()
        };
        let result = compress_tokens(&tokens, &config).unwrap();
        assert!(result.compressed_length < tokens.len());
    }

    #[test]
    fn hierarchical_passes_allocate_disjoint_meta_ranges() {
        let mut tokens = Vec::new();
        for _ in 0..12 {
            tokens.extend([1u32, 2, 3, 4, 1, 2, 3, 4, 9]);
        }
        let config = CompressionConfig::default();
        let result = compress_tokens(&tokens, &config).unwrap();

        let mut metas: Vec<Token> = result.dictionary_map.keys().copied().collect();
        metas.sort_unstable();
        for (i, &meta) in metas.iter().enumerate() {
            assert_eq!(meta, config.next_meta_token + i as Token);
        }

        let restored = decompress_tokens(&result.serialized_tokens, &config).unwrap();
        assert_eq!(restored, tokens);
    }

    #[test]
    fn hierarchical_disabled_runs_one_pass() {
        let tokens: TokenSeq = [1, 2, 3].iter().cycle().take(60).copied().collect();
        let config = CompressionConfig {
            hierarchical_enabled: false,
            ..Default::default()
        };
        let result = compress_tokens(&tokens, &config).unwrap();
        assert_eq!(result.metrics.unwrap().passes, 1);
        let restored = decompress_tokens(&result.serialized_tokens, &config).unwrap();
        assert_eq!(restored, tokens);
    }

    #[test]
    fn streaming_compressor_equals_one_shot() {
        let config = CompressionConfig::default();
        let chunk1 = vec![1, 2, 3, 1, 2, 3, 1, 2, 3];
        let chunk2 = vec![1, 2, 3, 1, 2, 3];

        let mut streaming = StreamingCompressor::with_config(config.clone());
        streaming.add_chunk(&chunk1);
        streaming.add_chunk(&chunk2);
        assert_eq!(streaming.memory_usage(), 15 * 4);

        let mut combined = chunk1.clone();
        combined.extend(&chunk2);
        let chunked = streaming.finish().unwrap();
        let one_shot = compress_tokens(&combined, &config).unwrap();
        assert_eq!(chunked.serialized_tokens, one_shot.serialized_tokens);
        assert_eq!(chunked.original_length, 15);
    }

    #[test]
    fn discover_validates_bounds() {
        assert!(matches!(
            discover(&[1, 2, 3], 1, 8),
            Err(LtscError::ConfigInvalid(_))
        ));
        assert!(matches!(
            discover(&[1, 2, 3], 4, 2),
            Err(LtscError::ConfigInvalid(_))
        ));
        assert!(discover(&[1, 2, 3], 2, 8).unwrap().is_empty());
    }

    #[test]
    fn metrics_populated() {
        let tokens: TokenSeq = [5, 6, 7].iter().cycle().take(30).copied().collect();
        let result = compress_tokens(&tokens, &CompressionConfig::default()).unwrap();
        let metrics = result.metrics.unwrap();
        assert!(metrics.candidates_discovered > 0);
        assert!(metrics.candidates_selected > 0);
        assert_eq!(metrics.dictionary_entries, result.dictionary_map.len());
        assert!(metrics.passes >= 1);
        assert!(metrics.peak_memory_bytes > 0);
    }
}
