//! Fuzz target for configuration directive parsing.
//!
//! Tests that `parse_directive` handles arbitrary input without
//! panicking.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stratum_config::parse::parse_directive;
use stratum_config::schema::ConfigSchema;

fuzz_target!(|data: &str| {
    let schema = ConfigSchema::builtin();
    // The parser should never panic, only return an error
    let _ = parse_directive(data, &schema);
});
