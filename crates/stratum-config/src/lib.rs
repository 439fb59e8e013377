//! Hierarchical, multi-target configuration store for the stratum
//! server.
//!
//! This crate provides:
//! - An ordered key/value directive language with quoting and
//!   continuation rules
//! - A two-level store (sub-system → target → KVS) with merge/query
//!   operations and dynamic-vs-static reconfiguration classification
//! - Layered precedence resolution: environment variable > stored
//!   value > compiled default, with provenance reporting
//! - Schema-driven validation of stored keys and environment variables
//! - Cross-version migration (renamed and removed sub-systems)
//! - Sensitive-value redaction for display-safe exports
//!
//! The schema ([`ConfigSchema`]) is constructed once at process start
//! and shared into every [`ConfigStore`]. The store itself is
//! synchronous and memory-only; [`SharedConfig`] adds the
//! single-writer/multi-reader discipline for concurrent use.

pub mod env;
pub mod error;
pub mod export;
pub mod kv;
pub mod parse;
pub mod redact;
pub mod resolve;
pub mod schema;
pub mod shared;
pub mod site;
pub mod store;
pub mod subsys;
pub mod validate;

pub use error::{Error, Result};
pub use export::write_config_to;
pub use kv::{Kv, Kvs};
pub use parse::{parse_directive, Directive};
pub use redact::REDACTED_MARKER;
pub use resolve::ValueSource;
pub use schema::{ConfigSchema, HelpKv, HelpKvs};
pub use shared::SharedConfig;
pub use site::{lookup_site, lookup_worm, Site};
pub use store::{ConfigStore, StoreValues, Target};
pub use subsys::{SubSys, DEFAULT_TARGET};
pub use validate::check_valid_keys_kvs;
