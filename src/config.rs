//! Configuration parsing and validation.
//!
//! The JS layer passes a plain object with optional camelCase fields; it is
//! deserialized into [`JsCompressionConfig`] and merged with defaults into
//! the engine's [`CompressionConfig`]. Validation is the gate behind every
//! `ConfigInvalid` error.

use crate::error::{LtscError, Result};
use crate::types::{CompressionConfig, Token};
use serde::{Deserialize, Serialize};
use wasm_bindgen::JsValue;

/// JS-facing configuration. Every field is optional; unset fields take the
/// engine defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JsCompressionConfig {
    pub min_subsequence_length: Option<usize>,
    pub max_subsequence_length: Option<usize>,
    pub meta_token_pool_size: Option<usize>,
    pub dict_start_token: Option<Token>,
    pub dict_end_token: Option<Token>,
    pub next_meta_token: Option<Token>,
    pub hierarchical_enabled: Option<bool>,
    pub hierarchical_max_depth: Option<usize>,
    pub selection_mode: Option<String>,
    pub beam_width: Option<usize>,
    pub priority_weight: Option<f64>,
    pub max_memory_bytes: Option<usize>,
    pub parallel_discovery: Option<bool>,
    pub verify: Option<bool>,
}

impl JsCompressionConfig {
    /// Deserialize from the raw `JsValue` handed to a wasm entry point.
    /// `undefined`/`null` mean "all defaults".
    pub fn from_js(value: JsValue) -> Result<Self> {
        if value.is_undefined() || value.is_null() {
            return Ok(Self::default());
        }
        serde_wasm_bindgen::from_value(value)
            .map_err(|e| LtscError::ConfigInvalid(e.to_string()))
    }

    /// Fill unset fields from the defaults and produce a validated
    /// engine configuration.
    pub fn merge_with_defaults(&self) -> Result<CompressionConfig> {
        let defaults = CompressionConfig::default();
        let selection_mode = match &self.selection_mode {
            Some(s) => s.parse().map_err(LtscError::ConfigInvalid)?,
            None => defaults.selection_mode,
        };
        let config = CompressionConfig {
            min_subsequence_length: self
                .min_subsequence_length
                .unwrap_or(defaults.min_subsequence_length),
            max_subsequence_length: self
                .max_subsequence_length
                .unwrap_or(defaults.max_subsequence_length),
            meta_token_pool_size: self
                .meta_token_pool_size
                .unwrap_or(defaults.meta_token_pool_size),
            dict_start_token: self.dict_start_token.unwrap_or(defaults.dict_start_token),
            dict_end_token: self.dict_end_token.unwrap_or(defaults.dict_end_token),
            next_meta_token: self.next_meta_token.unwrap_or(defaults.next_meta_token),
            hierarchical_enabled: self
                .hierarchical_enabled
                .unwrap_or(defaults.hierarchical_enabled),
            hierarchical_max_depth: self
                .hierarchical_max_depth
                .unwrap_or(defaults.hierarchical_max_depth),
            selection_mode,
            beam_width: self.beam_width.unwrap_or(defaults.beam_width),
            priority_weight: self.priority_weight.unwrap_or(defaults.priority_weight),
            max_memory_bytes: self.max_memory_bytes.unwrap_or(defaults.max_memory_bytes),
            parallel_discovery: self
                .parallel_discovery
                .unwrap_or(defaults.parallel_discovery),
            verify: self.verify.unwrap_or(defaults.verify),
        };
        config.validate()?;
        Ok(config)
    }
}

impl CompressionConfig {
    /// Reject contradictory configurations before any work happens.
    pub fn validate(&self) -> Result<()> {
        if self.min_subsequence_length < 2 {
            return Err(LtscError::ConfigInvalid(format!(
                "min_subsequence_length must be at least 2, got {}",
                self.min_subsequence_length
            )));
        }
        if self.max_subsequence_length < self.min_subsequence_length {
            return Err(LtscError::ConfigInvalid(format!(
                "max_subsequence_length {} is below min_subsequence_length {}",
                self.max_subsequence_length, self.min_subsequence_length
            )));
        }
        if self.beam_width == 0 {
            return Err(LtscError::ConfigInvalid(
                "beam_width must be at least 1".to_string(),
            ));
        }
        if self.meta_token_pool_size == 0 {
            return Err(LtscError::ConfigInvalid(
                "meta_token_pool_size must be at least 1".to_string(),
            ));
        }
        if self.dict_start_token == self.dict_end_token {
            return Err(LtscError::ConfigInvalid(format!(
                "dict_start_token and dict_end_token are both {:#010x}",
                self.dict_start_token
            )));
        }
        if self.next_meta_token >= self.meta_range_end() {
            return Err(LtscError::ConfigInvalid(format!(
                "meta range is empty: next_meta_token {:#010x} reaches the control tokens",
                self.next_meta_token
            )));
        }
        if !(0.0..=f64::MAX).contains(&self.priority_weight) {
            return Err(LtscError::ConfigInvalid(format!(
                "priority_weight must be non-negative, got {}",
                self.priority_weight
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SelectionMode;

    #[test]
    fn defaults_validate() {
        assert!(CompressionConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_js_config_merges_to_defaults() {
        let merged = JsCompressionConfig::default().merge_with_defaults().unwrap();
        assert_eq!(merged.min_subsequence_length, 2);
        assert_eq!(merged.max_subsequence_length, 8);
        assert_eq!(merged.selection_mode, SelectionMode::Greedy);
        assert_eq!(merged.next_meta_token, 0xFFFF_0000);
    }

    #[test]
    fn unknown_selection_mode_is_config_invalid() {
        let js = JsCompressionConfig {
            selection_mode: Some("annealing".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            js.merge_with_defaults(),
            Err(LtscError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let config = CompressionConfig {
            min_subsequence_length: 6,
            max_subsequence_length: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LtscError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn empty_meta_range_rejected() {
        let config = CompressionConfig {
            next_meta_token: 0xFFFF_FFF0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LtscError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn colliding_delimiters_rejected() {
        let config = CompressionConfig {
            dict_end_token: 0xFFFF_FFF0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LtscError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn camel_case_fields_deserialize() {
        let json = r#"{"minSubsequenceLength": 3, "selectionMode": "optimal", "beamWidth": 4}"#;
        let js: JsCompressionConfig = serde_json::from_str(json).unwrap();
        let merged = js.merge_with_defaults().unwrap();
        assert_eq!(merged.min_subsequence_length, 3);
        assert_eq!(merged.selection_mode, SelectionMode::Optimal);
        assert_eq!(merged.beam_width, 4);
    }
}
