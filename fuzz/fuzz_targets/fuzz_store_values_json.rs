//! Fuzz target for persisted-store deserialization.
//!
//! Tests that arbitrary JSON deserializes into store values (or errors)
//! without panicking, and that a store rebuilt from it survives a merge.

#![no_main]

use libfuzzer_sys::fuzz_target;
use stratum_config::schema::ConfigSchema;
use stratum_config::store::{ConfigStore, StoreValues};

fuzz_target!(|data: &[u8]| {
    if let Ok(values) = serde_json::from_slice::<StoreValues>(data) {
        let store = ConfigStore::from_values(ConfigSchema::builtin(), values);
        let _ = store.merge();
    }
});
