//! The two-level configuration store: sub-system name to target name to
//! KVS.
//!
//! A store is created fresh from a schema, mutated incrementally
//! through directives, cloned for concurrent readers or redacted
//! exports, and replaced wholesale by [`ConfigStore::merge`] on a
//! schema migration. The store itself has no internal locking; see
//! [`SharedConfig`] for the single-writer/multi-reader facade.
//!
//! Storage keys are plain strings so that sub-systems removed or
//! renamed by newer schemas survive deserialization of old data; every
//! mutation path resolves names through [`SubSys`] first.
//!
//! [`SharedConfig`]: crate::shared::SharedConfig

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::env::{env_list, env_var_name};
use crate::error::{Error, Result};
use crate::kv::Kvs;
use crate::parse::{self, parse_directive};
use crate::schema::ConfigSchema;
use crate::subsys::{
    SubSys, COMMENT_KEY, DEFAULT_TARGET, ENV_WORD_DELIMITER, KV_COMMENT, STATE_KEY, STATE_ON,
    SUB_SYS_SEPARATOR,
};

/// The persisted shape of a store: sub-system name to target name to
/// KVS. Deserialize this and pass it to [`ConfigStore::from_values`].
pub type StoreValues = BTreeMap<String, BTreeMap<String, Kvs>>;

/// A flattened read-model view of one configured target, as returned by
/// listing operations. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    /// `subsystem` or `subsystem:target` for named targets.
    pub subsystem: String,
    pub kvs: Kvs,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.subsystem, self.kvs)
    }
}

/// The hierarchical, multi-target configuration store.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    schema: Arc<ConfigSchema>,
    values: StoreValues,
}

impl Serialize for ConfigStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (k, v) in &self.values {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl ConfigStore {
    /// Initialize a fresh store: every registered sub-system gets a
    /// default-target entry carrying its default KVS.
    pub fn new(schema: Arc<ConfigSchema>) -> Self {
        let mut values = StoreValues::new();
        for &subsys in SubSys::ALL {
            let mut targets = BTreeMap::new();
            targets.insert(
                DEFAULT_TARGET.to_string(),
                schema.default_kvs(subsys).clone(),
            );
            values.insert(subsys.as_str().to_string(), targets);
        }
        ConfigStore { schema, values }
    }

    /// Rebuild a store from previously serialized values, e.g. after
    /// deserializing a persisted configuration.
    pub fn from_values(schema: Arc<ConfigSchema>, values: StoreValues) -> Self {
        ConfigStore { schema, values }
    }

    /// The schema this store was built against.
    pub fn schema(&self) -> &Arc<ConfigSchema> {
        &self.schema
    }

    /// The raw two-level map, for persistence.
    pub fn values(&self) -> &StoreValues {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut StoreValues {
        &mut self.values
    }

    /// Applies a single mutation directive.
    ///
    /// The parsed KVS is merged onto the existing entry for the
    /// sub-system/target: existing values survive unless overwritten,
    /// default keys missing from the existing KVS are back-filled
    /// first, and the `comment` key is applied last so it cannot be
    /// shadowed by the back-fill. Every non-optional key must be
    /// non-empty once merged, but only while the target is enabled;
    /// a disabled target may keep required keys empty.
    ///
    /// Returns whether the sub-system is dynamically reconfigurable,
    /// so the caller can decide between a live reload and a restart.
    pub fn set_kvs(&mut self, input: &str) -> Result<bool> {
        let d = parse_directive(input, &self.schema)?;
        let dynamic = d.subsys.is_dynamic();

        let mut curr = match self
            .values
            .get(d.subsys.as_str())
            .and_then(|targets| targets.get(&d.target))
        {
            Some(existing) => {
                let mut curr = existing.clone();
                self.backfill(d.subsys, &mut curr);
                curr
            }
            None => self.schema.default_kvs(d.subsys).clone(),
        };

        for kv in &d.kvs {
            if kv.key == COMMENT_KEY {
                // Skip the comment here, apply it last.
                continue;
            }
            curr.set(&kv.key, &kv.value);
        }
        if let Some(comment) = d.kvs.lookup(COMMENT_KEY) {
            curr.set(COMMENT_KEY, comment);
        }

        let enabled = if self.schema.declares_state(d.subsys) {
            curr.get(STATE_KEY) == STATE_ON
        } else {
            // Without a state key the sub-system is implicitly enabled.
            true
        };
        for hkv in self.schema.help(d.subsys) {
            if curr.get(&hkv.key).is_empty() && !hkv.optional && enabled {
                return Err(Error::RequiredKey {
                    key: hkv.key.clone(),
                    subsys: d.subsys.to_string(),
                });
            }
        }

        tracing::debug!(
            subsys = %d.subsys,
            target = %d.target,
            dynamic,
            "applied configuration directive"
        );
        self.values
            .entry(d.subsys.as_str().to_string())
            .or_default()
            .insert(d.target, curr);
        Ok(dynamic)
    }

    /// Deletes a sub-system target addressed as `subsystem[:target]`.
    ///
    /// An unrecognized sub-system name is removed unconditionally,
    /// ignoring any target suffix, tolerating stale entries left over
    /// from older schema versions. A recognized sub-system errors when
    /// the target is empty or was already deleted.
    pub fn del_kvs(&mut self, input: &str) -> Result<()> {
        let addr = input.trim();
        if addr.is_empty() {
            return Err(Error::EmptyInput);
        }
        if addr.split_whitespace().nth(1).is_some() {
            return Err(Error::TooManyArgs(input.to_string()));
        }
        let (name, target) = match addr.split_once(SUB_SYS_SEPARATOR) {
            Some((name, target)) => (name, Some(target)),
            None => (addr, None),
        };
        let subsys = match SubSys::from_str(name) {
            Ok(subsys) => subsys,
            Err(_) => {
                // Stale sub-system from an older schema version.
                tracing::debug!(subsys = name, "removing unrecognized sub-system");
                self.values.remove(name);
                return Ok(());
            }
        };
        let target = match target {
            Some("") => return Err(Error::EmptyTarget(addr.to_string())),
            Some(t) => t,
            None => DEFAULT_TARGET,
        };
        let removed = self
            .values
            .get_mut(subsys.as_str())
            .and_then(|targets| targets.remove(target));
        if removed.is_none() {
            return Err(Error::AlreadyDeleted(input.trim().to_string()));
        }
        tracing::debug!(subsys = %subsys, target, "deleted configuration target");
        Ok(())
    }

    /// Reads the configuration for a `subsystem[:target]` query.
    ///
    /// With an explicit target, returns that target's KVS back-filled
    /// with missing defaults, erroring when the target does not exist.
    /// With a bare name (or a unique prefix of one registered
    /// sub-system), returns all targets in help-declaration order,
    /// deprecated sub-system entries last; a sub-system never
    /// represented in the store yields a single synthetic
    /// default-target entry carrying pure defaults.
    pub fn get_kvs(&self, input: &str) -> Result<Vec<Target>> {
        let (name, target) = parse::split_query(input)?;

        if let Some(target) = target {
            let subsys = SubSys::from_str(name)?;
            let kvs = self
                .values
                .get(subsys.as_str())
                .and_then(|targets| targets.get(target))
                .ok_or_else(|| Error::TargetNotFound(input.trim().to_string()))?;
            let mut kvs = kvs.clone();
            self.backfill(subsys, &mut kvs);
            return Ok(vec![Target {
                subsystem: format!("{}{}{}", subsys, SUB_SYS_SEPARATOR, target),
                kvs,
            }]);
        }

        let subsys = SubSys::resolve_prefix(name)?;
        let mut out = Vec::new();
        // Walk the help declaration order so output ordering is stable
        // and deprecated entries land last.
        for hkv in self.schema.listing_order() {
            if hkv.key != subsys.as_str() {
                continue;
            }
            match self.values.get(subsys.as_str()) {
                None => out.push(Target {
                    subsystem: subsys.to_string(),
                    kvs: self.schema.default_kvs(subsys).clone(),
                }),
                Some(targets) => {
                    if !targets.contains_key(DEFAULT_TARGET) {
                        out.push(Target {
                            subsystem: subsys.to_string(),
                            kvs: self.schema.default_kvs(subsys).clone(),
                        });
                    }
                    for (tgt, kvs) in targets {
                        let mut kvs = kvs.clone();
                        self.backfill(subsys, &mut kvs);
                        let subsystem = if tgt == DEFAULT_TARGET {
                            subsys.to_string()
                        } else {
                            format!("{}{}{}", subsys, SUB_SYS_SEPARATOR, tgt)
                        };
                        out.push(Target { subsystem, kvs });
                    }
                }
            }
        }
        Ok(out)
    }

    /// Lists the targets configured for a sub-system, whether enabled
    /// or not. A target counts as configured when present in the store
    /// or implied by an environment variable following the
    /// `STRATUM_<SUBSYS>_<PARAM>_<target>` convention. Single-target
    /// sub-systems always yield exactly the default sentinel.
    pub fn get_available_targets(&self, subsys: SubSys) -> Vec<String> {
        if subsys.is_single_target() {
            return vec![DEFAULT_TARGET.to_string()];
        }

        let mut targets = BTreeSet::new();
        if let Some(stored) = self.values.get(subsys.as_str()) {
            targets.extend(stored.keys().cloned());
        }
        for kv in self.schema.default_kvs(subsys) {
            let prefix = format!(
                "{}{}",
                env_var_name(subsys, DEFAULT_TARGET, &kv.key),
                ENV_WORD_DELIMITER
            );
            for name in env_list(&prefix) {
                let target = &name[prefix.len()..];
                if !target.is_empty() {
                    targets.insert(target.to_string());
                }
            }
        }
        targets.into_iter().collect()
    }

    /// Applies directives from `reader`, one per line. Blank lines and
    /// lines starting with `#` are skipped. Returns whether every
    /// applied directive addressed a dynamic sub-system.
    pub fn read_config<R: BufRead>(&mut self, reader: R) -> Result<bool> {
        let mut dyn_only = true;
        for line in reader.lines() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with(KV_COMMENT) {
                continue;
            }
            let dynamic = self.set_kvs(text)?;
            dyn_only = dyn_only && dynamic;
        }
        Ok(dyn_only)
    }

    /// Deletes the targets named in `reader`, one `subsystem[:target]`
    /// per line, with the same blank/comment line handling as
    /// [`ConfigStore::read_config`].
    pub fn del_from<R: BufRead>(&mut self, reader: R) -> Result<()> {
        for line in reader.lines() {
            let line = line?;
            let text = line.trim();
            if text.is_empty() || text.starts_with(KV_COMMENT) {
                continue;
            }
            self.del_kvs(text)?;
        }
        Ok(())
    }

    /// Migrates this store to the current schema, returning a fresh
    /// store rather than mutating in place.
    ///
    /// Every sub-system/target is carried over with missing default
    /// keys back-filled. A sub-system name absent from the current
    /// schema is redirected through the rename table; when no rename
    /// exists either, the obsolete entry is dropped.
    pub fn merge(&self) -> ConfigStore {
        let mut merged = ConfigStore::new(Arc::clone(&self.schema));
        for (sub_name, targets) in &self.values {
            let dest = match SubSys::from_str(sub_name) {
                Ok(subsys) => subsys,
                Err(_) => match self.schema.renamed(sub_name) {
                    Some(renamed) => {
                        tracing::info!(
                            from = sub_name,
                            to = %renamed,
                            "migrating renamed sub-system"
                        );
                        renamed
                    }
                    None => {
                        // Removed from the schema, or the server was
                        // downgraded.
                        tracing::warn!(subsys = sub_name, "dropping obsolete sub-system");
                        continue;
                    }
                },
            };
            for (target, kvs) in targets {
                let mut kvs = kvs.clone();
                self.backfill(dest, &mut kvs);
                merged
                    .values
                    .entry(dest.as_str().to_string())
                    .or_default()
                    .insert(target.clone(), kvs);
            }
        }
        merged
    }

    /// Back-fills any default key missing from `kvs`.
    fn backfill(&self, subsys: SubSys, kvs: &mut Kvs) {
        for kv in self.schema.default_kvs(subsys) {
            if kvs.lookup(&kv.key).is_none() {
                kvs.set(&kv.key, &kv.value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> ConfigStore {
        ConfigStore::new(ConfigSchema::builtin())
    }

    #[test]
    fn test_fresh_store_returns_defaults() {
        let store = fresh();
        for &subsys in SubSys::ALL {
            if subsys == SubSys::Region {
                continue; // Deprecated entry, still listed below.
            }
            let targets = store.get_kvs(subsys.as_str()).unwrap();
            assert_eq!(targets.len(), 1, "{}", subsys);
            assert_eq!(targets[0].subsystem, subsys.as_str());
            assert_eq!(&targets[0].kvs, store.schema().default_kvs(subsys));
        }
        let region = store.get_kvs("region").unwrap();
        assert_eq!(region.len(), 1);
        assert_eq!(&region[0].kvs, store.schema().default_kvs(SubSys::Region));
    }

    #[test]
    fn test_set_then_get_site() {
        let mut store = fresh();
        let dynamic = store.set_kvs("site name=rack0 region=us-east-1").unwrap();
        assert!(!dynamic);

        let targets = store.get_kvs("site").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].subsystem, "site");
        assert_eq!(targets[0].kvs.get("name"), "rack0");
        assert_eq!(targets[0].kvs.get("region"), "us-east-1");
    }

    #[test]
    fn test_set_is_idempotent() {
        let mut store = fresh();
        store.set_kvs("site name=rack0 region=us-east-1").unwrap();
        let once = store.clone();
        store.set_kvs("site name=rack0 region=us-east-1").unwrap();
        assert_eq!(once.values(), store.values());
    }

    #[test]
    fn test_set_merges_onto_existing() {
        let mut store = fresh();
        store.set_kvs("site name=rack0 region=us-east-1").unwrap();
        store.set_kvs("site name=rack1").unwrap();
        let targets = store.get_kvs("site").unwrap();
        assert_eq!(targets[0].kvs.get("name"), "rack1");
        // The earlier region survives the second directive.
        assert_eq!(targets[0].kvs.get("region"), "us-east-1");
    }

    #[test]
    fn test_set_returns_dynamic_classification() {
        let mut store = fresh();
        assert!(store.set_kvs("api requests_max=100").unwrap());
        assert!(!store.set_kvs("site name=rack0").unwrap());
    }

    #[test]
    fn test_required_key_gated_on_state() {
        let mut store = fresh();
        // Enabled (implicit state=on) with an empty endpoint: error.
        let err = store.set_kvs("notify_webhook:primary queue_limit=10");
        assert!(matches!(err, Err(Error::RequiredKey { .. })));

        // Disabled target tolerates the empty required key.
        store
            .set_kvs("notify_webhook:primary queue_limit=10 state=off")
            .unwrap();

        // Enabling with the endpoint present is fine.
        store
            .set_kvs("notify_webhook:primary endpoint=http://localhost:8080/")
            .unwrap();
        let targets = store.get_kvs("notify_webhook:primary").unwrap();
        assert_eq!(targets[0].kvs.get(STATE_KEY), STATE_ON);
        assert_eq!(targets[0].kvs.get("queue_limit"), "10");
    }

    #[test]
    fn test_comment_applied_last() {
        let mut store = fresh();
        store
            .set_kvs("site name=rack0 comment=\"primary site\"")
            .unwrap();
        let targets = store.get_kvs("site").unwrap();
        assert_eq!(targets[0].kvs.get(COMMENT_KEY), "primary site");
    }

    #[test]
    fn test_failed_set_leaves_store_unchanged() {
        let mut store = fresh();
        let before = store.clone();
        assert!(store.set_kvs("notify_webhook queue_limit=10").is_err());
        assert_eq!(before.values(), store.values());
    }

    #[test]
    fn test_del_lifecycle() {
        let mut store = fresh();
        // Not there yet: already deleted.
        assert!(matches!(
            store.del_kvs("notify_webhook:primary"),
            Err(Error::AlreadyDeleted(_))
        ));

        store
            .set_kvs("notify_webhook:primary endpoint=http://localhost:8080/")
            .unwrap();
        store.del_kvs("notify_webhook:primary").unwrap();
        assert!(matches!(
            store.get_kvs("notify_webhook:primary"),
            Err(Error::TargetNotFound(_))
        ));
    }

    #[test]
    fn test_del_unknown_subsys_tolerated() {
        let mut store = fresh();
        let mut values = store.values().clone();
        values.insert("old_subsys".to_string(), {
            let mut t = BTreeMap::new();
            t.insert(DEFAULT_TARGET.to_string(), Kvs::from_pairs(&[("k", "v")]));
            t
        });
        store = ConfigStore::from_values(Arc::clone(store.schema()), values);

        store.del_kvs("old_subsys").unwrap();
        assert!(!store.values().contains_key("old_subsys"));
        // Deleting it again is still fine.
        store.del_kvs("old_subsys").unwrap();
    }

    #[test]
    fn test_del_unknown_subsys_ignores_target() {
        let mut store = fresh();
        let mut values = store.values().clone();
        values.insert("old_subsys".to_string(), {
            let mut t = BTreeMap::new();
            t.insert(DEFAULT_TARGET.to_string(), Kvs::from_pairs(&[("k", "v")]));
            t
        });
        store = ConfigStore::from_values(Arc::clone(store.schema()), values.clone());

        // A trailing target, even an empty one, does not block removal.
        store.del_kvs("old_subsys:").unwrap();
        assert!(!store.values().contains_key("old_subsys"));

        store = ConfigStore::from_values(Arc::clone(store.schema()), values);
        store.del_kvs("old_subsys:leftover").unwrap();
        assert!(!store.values().contains_key("old_subsys"));

        // Known sub-systems still reject an empty target.
        assert!(matches!(
            store.del_kvs("site:"),
            Err(Error::EmptyTarget(_))
        ));
    }

    #[test]
    fn test_get_by_unique_prefix() {
        let mut store = fresh();
        store.set_kvs("site name=rack0").unwrap();
        let targets = store.get_kvs("sit").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kvs.get("name"), "rack0");

        assert!(matches!(
            store.get_kvs("notify"),
            Err(Error::AmbiguousSubSys(_, _))
        ));
    }

    #[test]
    fn test_get_lists_all_targets_backfilled() {
        let mut store = fresh();
        store
            .set_kvs("notify_webhook:primary endpoint=http://a/")
            .unwrap();
        store
            .set_kvs("notify_webhook:backup endpoint=http://b/ state=off")
            .unwrap();
        let targets = store.get_kvs("notify_webhook").unwrap();
        let names: Vec<&str> = targets.iter().map(|t| t.subsystem.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "notify_webhook",
                "notify_webhook:backup",
                "notify_webhook:primary"
            ]
        );
        for t in &targets {
            // Every listed target carries the full default key set.
            assert!(t.kvs.lookup("queue_limit").is_some());
        }
    }

    #[test]
    fn test_get_synthesizes_defaults_after_delete() {
        let mut store = fresh();
        store.del_kvs("notify_webhook").unwrap();
        let targets = store.get_kvs("notify_webhook").unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(
            &targets[0].kvs,
            store.schema().default_kvs(SubSys::NotifyWebhook)
        );
    }

    #[test]
    fn test_read_config_skips_blank_and_comments() {
        let mut store = fresh();
        let input = "\n# a comment\nsite name=rack0\n\napi requests_max=50\n";
        let dyn_only = store.read_config(input.as_bytes()).unwrap();
        assert!(!dyn_only); // site is not dynamic
        assert_eq!(store.get_kvs("site").unwrap()[0].kvs.get("name"), "rack0");

        let mut store = fresh();
        assert!(store.read_config("api requests_max=50\n".as_bytes()).unwrap());
    }

    #[test]
    fn test_del_from() {
        let mut store = fresh();
        store.set_kvs("notify_webhook:primary endpoint=http://a/").unwrap();
        store
            .del_from("# cleanup\nnotify_webhook:primary\n".as_bytes())
            .unwrap();
        assert!(store.get_kvs("notify_webhook:primary").is_err());
    }

    #[test]
    fn test_merge_backfills_and_is_idempotent() {
        let mut store = fresh();
        store.set_kvs("site name=rack0").unwrap();

        // Simulate an old store missing a default key.
        let mut values = store.values().clone();
        if let Some(site) = values.get_mut("site").and_then(|t| t.get_mut(DEFAULT_TARGET)) {
            site.delete("region");
        }
        let old = ConfigStore::from_values(Arc::clone(store.schema()), values);

        let merged = old.merge();
        let site = &merged.get_kvs("site").unwrap()[0];
        assert_eq!(site.kvs.get("name"), "rack0");
        assert_eq!(site.kvs.lookup("region"), Some(""));

        assert_eq!(merged.merge().values(), merged.values());
    }

    #[test]
    fn test_merge_applies_renames_and_drops_removed() {
        let store = fresh();
        let mut values = store.values().clone();
        values.remove("scanner");
        values.insert("crawler".to_string(), {
            let mut t = BTreeMap::new();
            t.insert(
                DEFAULT_TARGET.to_string(),
                Kvs::from_pairs(&[("delay", "5")]),
            );
            t
        });
        values.insert("gateway".to_string(), {
            let mut t = BTreeMap::new();
            t.insert(DEFAULT_TARGET.to_string(), Kvs::from_pairs(&[("k", "v")]));
            t
        });
        let old = ConfigStore::from_values(Arc::clone(store.schema()), values);

        let merged = old.merge();
        assert!(!merged.values().contains_key("crawler"));
        assert!(!merged.values().contains_key("gateway"));
        let scanner = &merged.get_kvs("scanner").unwrap()[0];
        // The legacy crawler delay carried over, backfilled from the
        // scanner defaults.
        assert_eq!(scanner.kvs.get("delay"), "5");
        assert_eq!(scanner.kvs.get("max_wait"), "15s");
    }

    #[test]
    fn test_clone_is_independent() {
        let mut store = fresh();
        store.set_kvs("site name=rack0").unwrap();
        let snapshot = store.clone();
        store.set_kvs("site name=rack1").unwrap();
        assert_eq!(snapshot.get_kvs("site").unwrap()[0].kvs.get("name"), "rack0");
    }

    #[test]
    fn test_serialize_values() {
        let mut store = fresh();
        store.set_kvs("site name=rack0").unwrap();
        let json = serde_json::to_string(&store).unwrap();
        let values: StoreValues = serde_json::from_str(&json).unwrap();
        let back = ConfigStore::from_values(Arc::clone(store.schema()), values);
        assert_eq!(back.values(), store.values());
    }
}
