//! Dictionary serialization and deserialization.
//!
//! Wire layout:
//!
//! ```text
//! [DICT_START]
//! [meta_0] [len_0] [def_0 ...]
//! [meta_1] [len_1] [def_1 ...]
//! [DICT_END]
//! [body ...]
//! ```
//!
//! Entries are emitted in meta-token assignment order, which is
//! topological: a definition may only reference meta-tokens defined by an
//! earlier entry. The serializer verifies this; the deserializer accepts
//! any acyclic reference order and fails with an offset otherwise.

use crate::error::{LtscError, Result};
use crate::types::{CompressionConfig, Occurrence, Token, TokenSeq};
use std::collections::{HashMap, HashSet};

/// A dictionary entry: meta-token plus the definition it expands to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryEntry {
    pub meta_token: Token,
    pub definition: TokenSeq,
}

/// Ordered dictionary accumulated across static injection and
/// hierarchical passes.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    /// Entries in emission order
    pub entries: Vec<DictionaryEntry>,
    /// Lookup from meta-token to definition
    pub map: HashMap<Token, TokenSeq>,
}

impl Dictionary {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one entry with an explicit meta-token (static injection).
    pub fn push(&mut self, meta_token: Token, definition: TokenSeq) {
        self.map.insert(meta_token, definition.clone());
        self.entries.push(DictionaryEntry {
            meta_token,
            definition,
        });
    }

    /// Allocate meta-tokens for `patterns` in order, starting at
    /// `*next_meta`, and append the entries. Returns the pass-local
    /// pattern-to-meta mapping used to rewrite the body.
    pub fn assign_patterns(
        &mut self,
        patterns: &[TokenSeq],
        next_meta: &mut Token,
        config: &CompressionConfig,
    ) -> Result<HashMap<TokenSeq, Token>> {
        let mut pass_map = HashMap::with_capacity(patterns.len());
        for pattern in patterns {
            if self.entries.len() >= config.meta_token_pool_size
                || *next_meta >= config.meta_range_end()
            {
                return Err(LtscError::ConfigInvalid(format!(
                    "meta-token pool exhausted after {} entries",
                    self.entries.len()
                )));
            }
            let meta = *next_meta;
            *next_meta += 1;
            self.push(meta, pattern.clone());
            pass_map.insert(pattern.clone(), meta);
        }
        Ok(pass_map)
    }
}

/// Replace each selected occurrence with its pattern's meta-token.
/// Occurrences must be pairwise disjoint; unmapped patterns are left in
/// place, which keeps the stream lossless either way.
pub fn build_body(
    tokens: &[Token],
    selected: &[Occurrence],
    pattern_to_meta: &HashMap<TokenSeq, Token>,
) -> TokenSeq {
    if selected.is_empty() || pattern_to_meta.is_empty() {
        return tokens.to_vec();
    }

    let mut ordered: Vec<&Occurrence> = selected.iter().collect();
    ordered.sort_by_key(|occ| occ.start);

    let mut body = Vec::with_capacity(tokens.len());
    let mut cursor = 0usize;
    for occ in ordered {
        if cursor < occ.start {
            body.extend_from_slice(&tokens[cursor..occ.start]);
        }
        match pattern_to_meta.get(&occ.subsequence) {
            Some(&meta) => body.push(meta),
            None => body.extend_from_slice(&tokens[occ.start..occ.end()]),
        }
        cursor = occ.end();
    }
    if cursor < tokens.len() {
        body.extend_from_slice(&tokens[cursor..]);
    }

    body
}

/// Serialize the dictionary section, including both delimiters.
///
/// Verifies before emitting that every meta-token referenced inside a
/// definition has its own entry earlier in the order and that no
/// definition smuggles a control token. Nothing is returned on violation.
pub fn serialize_dictionary(dict: &Dictionary, config: &CompressionConfig) -> Result<TokenSeq> {
    let mut tokens = Vec::with_capacity(dict.entries.len() * 4 + 2);
    tokens.push(config.dict_start_token);

    let mut defined: HashSet<Token> = HashSet::with_capacity(dict.entries.len());
    for entry in &dict.entries {
        tokens.push(entry.meta_token);
        tokens.push(entry.definition.len() as Token);
        for &t in &entry.definition {
            if config.is_control_token(t) {
                return Err(LtscError::malformed(
                    tokens.len(),
                    "control token inside a definition",
                ));
            }
            if config.is_meta_token(t) && !defined.contains(&t) {
                return Err(LtscError::malformed(
                    tokens.len(),
                    format!("definition references meta-token {t:#010x} before its entry"),
                ));
            }
            tokens.push(t);
        }
        defined.insert(entry.meta_token);
    }

    tokens.push(config.dict_end_token);
    Ok(tokens)
}

/// Dictionary section parsed out of a serialized stream.
#[derive(Debug, Clone)]
pub struct ParsedDictionary {
    /// (meta-token, definition, offset of the entry's first token)
    pub entries: Vec<(Token, TokenSeq, usize)>,
    /// Index of DICT_START in the stream
    pub dict_start: usize,
    /// Index of the first body token (just past DICT_END)
    pub body_start: usize,
}

/// Strictly parse the dictionary section. `Ok(None)` means the stream has
/// no DICT_START and is an uncompressed sequence.
pub fn parse_dictionary(
    tokens: &[Token],
    config: &CompressionConfig,
) -> Result<Option<ParsedDictionary>> {
    let dict_start = match tokens.iter().position(|&t| t == config.dict_start_token) {
        Some(pos) => pos,
        None => return Ok(None),
    };

    // Control tokens never appear inside definitions, so the first
    // DICT_END after DICT_START closes the section.
    let dict_end = match tokens[dict_start + 1..]
        .iter()
        .position(|&t| t == config.dict_end_token)
    {
        Some(rel) => dict_start + 1 + rel,
        None => {
            return Err(LtscError::truncated(
                tokens.len(),
                "dictionary has no DICT_END",
            ))
        }
    };

    let mut entries = Vec::new();
    let mut seen: HashSet<Token> = HashSet::new();
    let mut pos = dict_start + 1;
    while pos < dict_end {
        let entry_offset = pos;
        let meta = tokens[pos];
        if !config.is_meta_token(meta) {
            return Err(LtscError::malformed(
                pos,
                format!("dictionary entry key {meta:#010x} is outside the meta range"),
            ));
        }
        if !seen.insert(meta) {
            return Err(LtscError::malformed(
                pos,
                format!("meta-token {meta:#010x} is defined twice"),
            ));
        }
        pos += 1;

        if pos >= dict_end {
            return Err(LtscError::truncated(pos, "entry is missing its length field"));
        }
        let length = tokens[pos] as usize;
        pos += 1;

        if pos + length > dict_end {
            return Err(LtscError::truncated(
                dict_end,
                format!(
                    "definition declares {length} tokens but {} remain before DICT_END",
                    dict_end - pos
                ),
            ));
        }
        entries.push((meta, tokens[pos..pos + length].to_vec(), entry_offset));
        pos += length;
    }

    Ok(Some(ParsedDictionary {
        entries,
        dict_start,
        body_start: dict_end + 1,
    }))
}

const WHITE: u8 = 0;
const GRAY: u8 = 1;
const BLACK: u8 = 2;

/// Fully expand every definition with a color-marked depth-first walk over
/// the reference graph. Each entry is expanded exactly once and memoized,
/// so total work is linear in the expanded output. Gray-on-gray is a
/// back-edge, which only a corrupt stream can produce.
pub fn expand_definitions(
    entries: &[(Token, TokenSeq, usize)],
    config: &CompressionConfig,
) -> Result<HashMap<Token, TokenSeq>> {
    let index: HashMap<Token, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.0, i))
        .collect();
    let mut memo: Vec<TokenSeq> = vec![Vec::new(); entries.len()];
    let mut color: Vec<u8> = vec![WHITE; entries.len()];

    for root in 0..entries.len() {
        if color[root] == BLACK {
            continue;
        }
        color[root] = GRAY;
        // Explicit frames: (entry index, definition cursor, partial output).
        let mut stack: Vec<(usize, usize, TokenSeq)> = vec![(root, 0, Vec::new())];

        'frames: while let Some((idx, mut cursor, mut out)) = stack.pop() {
            let (_, definition, entry_offset) = &entries[idx];
            while cursor < definition.len() {
                let t = definition[cursor];
                if config.is_control_token(t) {
                    return Err(LtscError::malformed(
                        *entry_offset,
                        "control token inside a definition",
                    ));
                }
                if config.is_meta_token(t) {
                    let child = match index.get(&t) {
                        Some(&child) => child,
                        None => {
                            return Err(LtscError::UndefinedMetaToken {
                                token: t,
                                offset: *entry_offset,
                            })
                        }
                    };
                    match color[child] {
                        BLACK => {
                            out.extend_from_slice(&memo[child]);
                            cursor += 1;
                        }
                        GRAY => {
                            return Err(LtscError::Cycle {
                                token: t,
                                offset: *entry_offset,
                            })
                        }
                        _ => {
                            // Suspend this frame and descend; it resumes
                            // once the child is black.
                            stack.push((idx, cursor, out));
                            color[child] = GRAY;
                            stack.push((child, 0, Vec::new()));
                            continue 'frames;
                        }
                    }
                } else {
                    out.push(t);
                    cursor += 1;
                }
            }
            color[idx] = BLACK;
            memo[idx] = out;
        }
    }

    Ok(entries
        .iter()
        .zip(memo)
        .map(|(&(meta, _, _), expansion)| (meta, expansion))
        .collect())
}

/// Reconstruct the original sequence from a serialized stream.
///
/// A stream with no dictionary section decompresses to itself; anything
/// before the first DICT_START passes through unexpanded.
pub fn decompress(tokens: &[Token], config: &CompressionConfig) -> Result<TokenSeq> {
    let parsed = match parse_dictionary(tokens, config)? {
        Some(parsed) => parsed,
        None => return Ok(tokens.to_vec()),
    };

    let expansions = expand_definitions(&parsed.entries, config)?;

    let mut out = Vec::with_capacity(tokens.len());
    out.extend_from_slice(&tokens[..parsed.dict_start]);
    for (i, &t) in tokens[parsed.body_start..].iter().enumerate() {
        let offset = parsed.body_start + i;
        if config.is_control_token(t) {
            return Err(LtscError::malformed(offset, "control token in body"));
        }
        if config.is_meta_token(t) {
            match expansions.get(&t) {
                Some(expansion) => out.extend_from_slice(expansion),
                None => return Err(LtscError::UndefinedMetaToken { token: t, offset }),
            }
        } else {
            out.push(t);
        }
    }

    Ok(out)
}
