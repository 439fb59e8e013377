//! Validation of stored keys and environment variables against the
//! schema.
//!
//! Both checks report every offending key or variable in a single
//! error, never just the first, to minimize operator round-trips.

use std::collections::BTreeSet;

use crate::env::{env_list, env_var_name};
use crate::error::{Error, Result};
use crate::kv::Kvs;
use crate::store::ConfigStore;
use crate::subsys::{
    SubSys, COMMENT_KEY, DEFAULT_TARGET, ENV_PREFIX, ENV_WORD_DELIMITER, SUB_SYS_SEPARATOR,
};

/// Checks a single KVS against the sub-system's valid key set. The
/// reserved `comment` key is always accepted. Used by callers holding a
/// raw KVS, e.g. the legacy site/region lookups.
pub fn check_valid_keys_kvs(subsys: SubSys, kvs: &Kvs, valid: &Kvs) -> Result<()> {
    let invalid: Kvs = kvs
        .iter()
        .filter(|kv| kv.key != COMMENT_KEY && valid.lookup(&kv.key).is_none())
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(Error::InvalidKeys {
            keys: invalid.to_string(),
            subsys: subsys.to_string(),
        });
    }
    Ok(())
}

impl ConfigStore {
    /// Checks the configuration for a sub-system across both the store
    /// and the process environment.
    ///
    /// Every `STRATUM_<SUBSYS>*` environment variable must match a
    /// valid parameter's canonical name; for multi-target sub-systems a
    /// `_<target>` suffix with a non-empty target is also accepted.
    /// Independently, every stored KVS entry across all targets is
    /// scanned for keys outside the valid set (defaults plus `comment`,
    /// minus `deprecated_keys`).
    pub fn check_valid_keys(&self, subsys: SubSys, deprecated_keys: &[&str]) -> Result<()> {
        let defaults = self.schema().default_kvs(subsys);

        let mut valid_keys: Vec<String> =
            defaults.iter().map(|kv| kv.key.clone()).collect();
        valid_keys.push(COMMENT_KEY.to_string());

        let env_prefix = format!(
            "{}{}",
            ENV_PREFIX,
            subsys.as_str().to_uppercase()
        );
        let mut candidates: BTreeSet<String> = env_list(&env_prefix).into_iter().collect();

        // Canonical default-target names are always valid.
        for param in &valid_keys {
            candidates.remove(&env_var_name(subsys, DEFAULT_TARGET, param));
        }

        if subsys.is_single_target() {
            if !candidates.is_empty() {
                return Err(Error::UnknownEnvVars(
                    candidates.into_iter().collect::<Vec<_>>().join(", "),
                ));
            }
        } else {
            // A name followed by `_` and a non-empty target is valid
            // for multi-target sub-systems.
            candidates.retain(|var| {
                !valid_keys.iter().any(|param| {
                    let prefix = format!(
                        "{}{}",
                        env_var_name(subsys, DEFAULT_TARGET, param),
                        ENV_WORD_DELIMITER
                    );
                    var.len() > prefix.len() && var.starts_with(&prefix)
                })
            });
            if !candidates.is_empty() {
                return Err(Error::UnknownEnvVars(
                    candidates.into_iter().collect::<Vec<_>>().join(", "),
                ));
            }
        }

        let valid_set: BTreeSet<&str> = valid_keys
            .iter()
            .map(String::as_str)
            .filter(|k| !deprecated_keys.contains(k))
            .collect();
        if let Some(targets) = self.values().get(subsys.as_str()) {
            for (target, kvs) in targets {
                let invalid: Kvs = kvs
                    .iter()
                    .filter(|kv| !valid_set.contains(kv.key.as_str()))
                    .cloned()
                    .collect();
                if !invalid.is_empty() {
                    return Err(Error::InvalidKeys {
                        keys: invalid.to_string(),
                        subsys: format!("{}{}{}", subsys, SUB_SYS_SEPARATOR, target),
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConfigSchema;
    use crate::store::StoreValues;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    #[test]
    fn test_kvs_level_invalid_keys() {
        let schema = ConfigSchema::builtin();
        // A legacy stored region KVS carrying a bogus key, e.g. written
        // by an older server version.
        let kvs = Kvs::from_pairs(&[("name", "us-east-1"), ("bogus", "1")]);
        let err = check_valid_keys_kvs(
            SubSys::Region,
            &kvs,
            schema.default_kvs(SubSys::Region),
        )
        .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bogus"), "{}", msg);
        assert!(msg.contains("region"), "{}", msg);
    }

    #[test]
    fn test_kvs_level_comment_always_valid() {
        let schema = ConfigSchema::builtin();
        let kvs = Kvs::from_pairs(&[("name", "us-east-1"), ("comment", "legacy")]);
        check_valid_keys_kvs(SubSys::Region, &kvs, schema.default_kvs(SubSys::Region))
            .unwrap();
    }

    #[test]
    fn test_store_scan_reports_all_invalid_keys() {
        let store = ConfigStore::new(ConfigSchema::builtin());
        let mut values: StoreValues = store.values().clone();
        let mut targets = BTreeMap::new();
        targets.insert(
            "_".to_string(),
            Kvs::from_pairs(&[("name", "x"), ("bogus", "1"), ("stale", "2")]),
        );
        values.insert("site".to_string(), targets);
        let store = ConfigStore::from_values(Arc::clone(store.schema()), values);

        let err = store.check_valid_keys(SubSys::Site, &[]).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("bogus"), "{}", msg);
        assert!(msg.contains("stale"), "{}", msg);
        assert!(msg.contains("site:_"), "{}", msg);
    }

    #[test]
    fn test_deprecated_keys_excluded_from_valid_set() {
        let store = ConfigStore::new(ConfigSchema::builtin());
        let mut values: StoreValues = store.values().clone();
        let mut targets = BTreeMap::new();
        targets.insert(
            "_".to_string(),
            Kvs::from_pairs(&[("license", "token")]),
        );
        values.insert("subnet".to_string(), targets);
        let store = ConfigStore::from_values(Arc::clone(store.schema()), values);

        // Accepted while not marked for removal.
        store.check_valid_keys(SubSys::Subnet, &[]).unwrap();
        // Flagged once deprecated for removal.
        assert!(store.check_valid_keys(SubSys::Subnet, &["license"]).is_err());
    }
}
