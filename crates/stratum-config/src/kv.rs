//! Ordered key/value lists, the atomic unit of configuration data.
//!
//! A [`Kvs`] preserves insertion order and guarantees key uniqueness:
//! [`Kvs::set`] overwrites in place (keeping the first-seen position)
//! and appends otherwise. Two keys are reserved across all sub-systems:
//! `comment`, which is always optional and excluded from unknown-key
//! checks, and `state` (`on`/`off`), which toggles whether a target is
//! active.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::subsys::{COMMENT_KEY, KV_DOUBLE_QUOTE, KV_SEPARATOR, KV_SPACE_SEPARATOR, STATE_KEY, STATE_ON};

/// A single configuration key/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Kv {
    pub key: String,
    pub value: String,
}

/// An ordered list of [`Kv`] with unique keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Kvs(Vec<Kv>);

impl Kvs {
    /// Create an empty list.
    pub fn new() -> Self {
        Kvs(Vec::new())
    }

    /// Build a list from literal pairs, preserving order.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let mut kvs = Kvs::new();
        for (k, v) in pairs {
            kvs.set(k, v);
        }
        kvs
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Kv> {
        self.0.iter()
    }

    /// Returns the value of a key, or the empty string if not found.
    pub fn get(&self, key: &str) -> &str {
        self.lookup(key).unwrap_or("")
    }

    /// Looks up a key, distinguishing "unset" from "set to empty".
    pub fn lookup(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|kv| kv.key == key)
            .map(|kv| kv.value.as_str())
    }

    /// Returns the value of a key, falling back to `defaults` when the
    /// key is unset or empty here.
    pub fn get_with_default<'a>(&'a self, key: &str, defaults: &'a Kvs) -> &'a str {
        let v = self.get(key);
        if v.is_empty() {
            return defaults.get(key);
        }
        v
    }

    /// Sets a value, overwriting in place if the key exists (the
    /// first-seen position is preserved), appending otherwise.
    pub fn set(&mut self, key: &str, value: &str) {
        for kv in self.0.iter_mut() {
            if kv.key == key {
                kv.value = value.to_string();
                return;
            }
        }
        self.0.push(Kv {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Deletes the key if present, a no-op otherwise.
    pub fn delete(&mut self, key: &str) {
        if let Some(i) = self.0.iter().position(|kv| kv.key == key) {
            self.0.remove(i);
        }
    }

    /// Returns the list of keys. The reserved `comment` key is always
    /// included, even when not present, to standardize downstream
    /// consumers.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.0.len() + 1);
        let mut found_comment = false;
        for kv in &self.0 {
            if kv.key == COMMENT_KEY {
                found_comment = true;
            }
            keys.push(kv.key.clone());
        }
        if !found_comment {
            keys.push(COMMENT_KEY.to_string());
        }
        keys
    }
}

impl fmt::Display for Kvs {
    /// Serializes as `key=value` pairs, space-separated. Values that
    /// contain whitespace are wrapped in double quotes. An explicit
    /// `state=on` is omitted since it is the implicit default.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::with_capacity(self.0.len());
        for kv in &self.0 {
            if kv.key == STATE_KEY && kv.value == STATE_ON {
                continue;
            }
            let quoted = kv.value.contains(char::is_whitespace);
            if quoted {
                parts.push(format!(
                    "{}{}{}{}{}",
                    kv.key, KV_SEPARATOR, KV_DOUBLE_QUOTE, kv.value, KV_DOUBLE_QUOTE
                ));
            } else {
                parts.push(format!("{}{}{}", kv.key, KV_SEPARATOR, kv.value));
            }
        }
        write!(f, "{}", parts.join(KV_SPACE_SEPARATOR))
    }
}

impl FromIterator<Kv> for Kvs {
    fn from_iter<T: IntoIterator<Item = Kv>>(iter: T) -> Self {
        let mut kvs = Kvs::new();
        for kv in iter {
            kvs.set(&kv.key, &kv.value);
        }
        kvs
    }
}

impl<'a> IntoIterator for &'a Kvs {
    type Item = &'a Kv;
    type IntoIter = std::slice::Iter<'a, Kv>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
