//! Fuzz target for the key/value field tokenizer.
//!
//! Tests that `kv_fields` and `sanitize_value` handle arbitrary input
//! without panicking, including multi-byte UTF-8 around field
//! boundaries.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stratum_config::parse::{kv_fields, sanitize_value};

fuzz_target!(|data: &str| {
    let keys = vec![
        "state".to_string(),
        "endpoint".to_string(),
        "e".to_string(),
        "comment".to_string(),
    ];
    for field in kv_fields(data, &keys) {
        if let Some((_, value)) = field.split_once('=') {
            let _ = sanitize_value(value);
        }
    }
});
