//! The directive parser.
//!
//! A directive is one line of text of the form:
//!
//! ```text
//! subsystem[:target] key1=value1 key2="value with space" key3=spaced unquoted value
//! ```
//!
//! The key/value tail is tokenized against the sub-system's default key
//! list: fields begin wherever a known `key=` appears at a token
//! boundary. A bare token with no separator is glued onto the previous
//! key's value, space-joined. This continuation rule is deliberate, not
//! a parser bug: operators depend on unquoted multi-word values
//! surviving round-trips.

use std::str::FromStr;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::kv::Kvs;
use crate::schema::ConfigSchema;
use crate::subsys::{
    SubSys, DEFAULT_TARGET, KV_DOUBLE_QUOTE, KV_SEPARATOR, KV_SINGLE_QUOTE, KV_SPACE_SEPARATOR,
    STATE_KEY, STATE_ON, SUB_SYS_SEPARATOR,
};

/// A parsed configuration mutation: the addressed sub-system and
/// target, plus the requested key/value changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub subsys: SubSys,
    pub target: String,
    pub kvs: Kvs,
}

/// Splits the `subsystem[:target]` address off a directive, returning
/// the remaining key/value tail (if any).
///
/// The sub-system name must be an exact member of the registered set.
/// An explicit target is rejected when empty or when the sub-system
/// only supports a single target.
pub fn split_subsys(input: &str) -> Result<(SubSys, String, Option<&str>)> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::EmptyInput);
    }

    let (addr, tail) = match input.split_once(KV_SPACE_SEPARATOR) {
        Some((addr, tail)) => (addr, Some(tail)),
        None => (input, None),
    };

    let (name, target) = match addr.split_once(SUB_SYS_SEPARATOR) {
        Some((name, target)) => (name, Some(target)),
        None => (addr, None),
    };

    let subsys = SubSys::from_str(name)?;

    let target = match target {
        Some("") => return Err(Error::EmptyTarget(input.to_string())),
        Some(_) if subsys.is_single_target() => {
            return Err(Error::SingleTargetOnly(subsys.to_string()))
        }
        Some(t) => t.to_string(),
        None => DEFAULT_TARGET.to_string(),
    };

    Ok((subsys, target, tail))
}

/// Splits a key/value tail into fields, one per known key.
///
/// A field starts at each occurrence of `key=` (for `key` in `keys`)
/// found at the start of the input or after whitespace, and runs until
/// the next such occurrence. Text between field starts stays attached
/// to the preceding field, which is how unquoted spaced values survive.
pub fn kv_fields(input: &str, keys: &[String]) -> Vec<String> {
    let mut starts: Vec<usize> = Vec::new();
    for key in keys {
        let marker = format!("{}{}", key, KV_SEPARATOR);
        let mut from = 0;
        while let Some(pos) = input[from..].find(&marker) {
            let idx = from + pos;
            let at_boundary = idx == 0
                || input[..idx]
                    .chars()
                    .next_back()
                    .is_some_and(char::is_whitespace);
            if at_boundary {
                starts.push(idx);
            }
            from = idx + marker.len();
        }
    }
    starts.sort_unstable();
    starts.dedup();

    let mut fields = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(input.len());
        fields.push(input[start..end].trim().to_string());
    }
    fields
}

/// Strips surrounding whitespace and one pair of matching single or
/// double quotes from a value.
pub fn sanitize_value(value: &str) -> &str {
    let v = value.trim();
    for quote in [KV_DOUBLE_QUOTE, KV_SINGLE_QUOTE] {
        if v.len() >= 2 && v.starts_with(quote) && v.ends_with(quote) {
            return &v[1..v.len() - 1];
        }
    }
    v
}

/// Parses a full mutation directive against the schema.
///
/// Builds the requested KVS with `set` semantics (a later occurrence of
/// a key wins) and assigns the implicit `state=on` when the sub-system
/// declares a `state` key that the directive omits.
pub fn parse_directive(input: &str, schema: &Arc<ConfigSchema>) -> Result<Directive> {
    let (subsys, target, tail) = split_subsys(input)?;

    let tail = tail.unwrap_or("");
    let keys = schema.default_kvs(subsys).keys();
    let fields = kv_fields(tail, &keys);
    if fields.is_empty() {
        return Err(Error::EmptyKeys(subsys.to_string()));
    }

    let mut kvs = Kvs::new();
    for field in &fields {
        let (key, value) = field
            .split_once(KV_SEPARATOR)
            .ok_or_else(|| Error::EmptyValue(field.clone()))?;
        kvs.set(key, sanitize_value(value));
    }

    if schema.declares_state(subsys) && kvs.lookup(STATE_KEY).is_none() {
        kvs.set(STATE_KEY, STATE_ON);
    }

    Ok(Directive {
        subsys,
        target,
        kvs,
    })
}

/// Validates a bare `subsystem[:target]` query token: a single
/// whitespace-delimited field, nothing more.
pub fn split_query(input: &str) -> Result<(&str, Option<&str>)> {
    if input.trim().is_empty() {
        return Err(Error::EmptyInput);
    }
    let mut fields = input.split_whitespace();
    let addr = match fields.next() {
        Some(addr) => addr,
        None => return Err(Error::EmptyInput),
    };
    if fields.next().is_some() {
        return Err(Error::TooManyArgs(input.to_string()));
    }
    match addr.split_once(SUB_SYS_SEPARATOR) {
        Some((_, "")) => Err(Error::EmptyTarget(input.to_string())),
        Some((name, target)) => Ok((name, Some(target))),
        None => Ok((addr, None)),
    }
}
