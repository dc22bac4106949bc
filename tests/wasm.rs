//! Wasm smoke tests, run with `wasm-pack test` / `wasm-bindgen-test-runner`.

#![cfg(target_arch = "wasm32")]

use ltsc_core::{compress, decompress, discover_patterns, version};
use wasm_bindgen::JsValue;
use wasm_bindgen_test::wasm_bindgen_test;

#[wasm_bindgen_test]
fn compress_and_decompress_through_js_boundary() {
    let tokens: Vec<u32> = [1, 2, 3].iter().cycle().take(30).copied().collect();
    let result = compress(&tokens, JsValue::NULL).unwrap();
    assert!(result.compression_ratio() <= 1.0);

    let restored = decompress(&result.get_serialized_tokens(), JsValue::NULL).unwrap();
    assert_eq!(restored, tokens);
}

#[wasm_bindgen_test]
fn discover_patterns_returns_rows() {
    let tokens: Vec<u32> = [5, 6, 7].iter().cycle().take(30).copied().collect();
    let rows = discover_patterns(&tokens, 2, 8).unwrap();
    assert!(!rows.is_undefined());
}

#[wasm_bindgen_test]
fn version_is_nonempty() {
    assert!(!version().is_empty());
}
