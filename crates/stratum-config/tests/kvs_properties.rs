//! Property-based tests for the ordered KVS container and the
//! directive tokenizer.
//!
//! Uses proptest to verify the container invariants hold across many
//! random inputs.

use proptest::prelude::*;
use stratum_config::kv::Kvs;
use stratum_config::parse::{kv_fields, sanitize_value};

/// Keys drawn from a small alphabet so collisions actually happen.
fn arb_key() -> impl Strategy<Value = String> {
    "[a-e]{1,3}"
}

/// Values without '=' or whitespace so re-tokenization is unambiguous.
fn arb_value() -> impl Strategy<Value = String> {
    "[a-z0-9]{0,6}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// set followed by get returns the value that was set.
    #[test]
    fn set_then_get(pairs in proptest::collection::vec((arb_key(), arb_value()), 0..20),
                    key in arb_key(), value in arb_value()) {
        let mut kvs = Kvs::new();
        for (k, v) in &pairs {
            kvs.set(k, v);
        }
        kvs.set(&key, &value);
        prop_assert_eq!(kvs.get(&key), value.as_str());
    }

    /// Repeated sets of the same key never grow the container.
    #[test]
    fn set_is_idempotent_in_size(pairs in proptest::collection::vec((arb_key(), arb_value()), 0..20)) {
        let mut kvs = Kvs::new();
        for (k, v) in &pairs {
            kvs.set(k, v);
        }
        let len = kvs.len();
        for (k, v) in &pairs {
            kvs.set(k, v);
        }
        prop_assert_eq!(kvs.len(), len);

        // Keys stay unique throughout.
        let mut keys: Vec<&str> = kvs.iter().map(|kv| kv.key.as_str()).collect();
        keys.sort_unstable();
        keys.dedup();
        prop_assert_eq!(keys.len(), len);
    }

    /// First insertion order is preserved across overwrites.
    #[test]
    fn insertion_order_survives_overwrite(pairs in proptest::collection::vec((arb_key(), arb_value()), 1..20),
                                          value in arb_value()) {
        let mut kvs = Kvs::new();
        for (k, v) in &pairs {
            kvs.set(k, v);
        }
        let order_before: Vec<String> = kvs.iter().map(|kv| kv.key.clone()).collect();
        for key in &order_before {
            kvs.set(key, &value);
        }
        let order_after: Vec<String> = kvs.iter().map(|kv| kv.key.clone()).collect();
        prop_assert_eq!(order_before, order_after);
    }

    /// delete removes the key; for everything else, get is unchanged.
    #[test]
    fn delete_removes_only_that_key(pairs in proptest::collection::vec((arb_key(), arb_value()), 1..20),
                                    idx in any::<proptest::sample::Index>()) {
        let mut kvs = Kvs::new();
        for (k, v) in &pairs {
            kvs.set(k, v);
        }
        let all: Vec<(String, String)> = kvs
            .iter()
            .map(|kv| (kv.key.clone(), kv.value.clone()))
            .collect();
        let victim = all[idx.index(all.len())].0.clone();

        kvs.delete(&victim);
        prop_assert_eq!(kvs.lookup(&victim), None);
        for (k, v) in &all {
            if *k != victim {
                prop_assert_eq!(kvs.get(k), v.as_str());
            }
        }
    }

    /// Tokenizing `k=v` fields against the full key set recovers every
    /// field exactly once, in order.
    #[test]
    fn kv_fields_recovers_simple_fields(map in proptest::collection::btree_map(arb_key(), "[a-z0-9]{1,6}", 1..10)) {
        let keys: Vec<String> = map.keys().cloned().collect();
        let input = map
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        let fields = kv_fields(&input, &keys);
        prop_assert_eq!(fields.len(), map.len());
        for (field, (k, v)) in fields.iter().zip(&map) {
            prop_assert_eq!(field.trim(), format!("{}={}", k, v));
        }
    }

    /// sanitize_value never returns surrounding whitespace or a
    /// matching quote pair.
    #[test]
    fn sanitize_value_strips_quotes(inner in "[a-z0-9 ]{0,10}", quote in prop::sample::select(vec!["\"", "'"])) {
        let raw = format!("  {q}{inner}{q} ", q = quote, inner = inner);
        let out = sanitize_value(&raw);
        prop_assert_eq!(out, inner.as_str());
    }
}
