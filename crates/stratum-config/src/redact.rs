//! Display-safe views of the configuration.
//!
//! Redaction replaces sensitive values with a fixed marker while
//! leaving the underlying store untouched. The credentials sub-system
//! is removed outright regardless of field-level flags, since any
//! partial exposure of it is unacceptable.

use crate::store::ConfigStore;
use crate::subsys::SubSys;

/// Fixed marker substituted for sensitive values.
pub const REDACTED_MARKER: &str = "*redacted*";

impl ConfigStore {
    /// Returns a display-safe copy of the store: every non-empty value
    /// of a key flagged sensitive in the help metadata is replaced with
    /// [`REDACTED_MARKER`] across all targets, and the credentials
    /// sub-system is dropped entirely.
    pub fn redact_sensitive_info(&self) -> ConfigStore {
        let mut redacted = self.clone();

        for &subsys in SubSys::ALL {
            for hkv in self.schema().help(subsys) {
                if !hkv.sensitive {
                    continue;
                }
                redacted.redact_key(subsys, &hkv.key);
            }
        }

        redacted.drop_subsys(SubSys::Credentials);
        redacted
    }

    fn redact_key(&mut self, subsys: SubSys, key: &str) {
        let values = self.values_mut();
        if let Some(targets) = values.get_mut(subsys.as_str()) {
            for kvs in targets.values_mut() {
                match kvs.lookup(key) {
                    Some(v) if !v.is_empty() => kvs.set(key, REDACTED_MARKER),
                    _ => {}
                }
            }
        }
    }

    fn drop_subsys(&mut self, subsys: SubSys) {
        self.values_mut().remove(subsys.as_str());
    }
}
