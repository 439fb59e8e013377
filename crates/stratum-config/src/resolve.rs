//! Layered precedence resolution for single parameters.
//!
//! The effective value of a parameter is, in decreasing precedence: the
//! corresponding environment variable if set and non-empty, the value
//! in the config store if present, then the compiled default. The
//! returned [`ValueSource`] reports which layer won.

use serde::{Deserialize, Serialize};

use crate::env::{env_get, env_var_name};
use crate::store::ConfigStore;
use crate::subsys::{SubSys, DEFAULT_TARGET};

/// Provenance of a resolved configuration value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueSource {
    /// The sub-system/parameter pair is not resolvable under the
    /// current rules; the accompanying value is empty.
    #[default]
    Absent,
    Default,
    Config,
    Env,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Absent => write!(f, "absent"),
            ValueSource::Default => write!(f, "default"),
            ValueSource::Config => write!(f, "config"),
            ValueSource::Env => write!(f, "env"),
        }
    }
}

/// Sub-systems that support layered resolution. Others return
/// [`ValueSource::Absent`] unconditionally; this is a deliberate
/// limitation, not a bug.
const RESOLVABLE_SUBSYSTEMS: &[SubSys] = &[SubSys::IdentityOpenId];

impl ConfigStore {
    /// Resolves the effective value of `param` for a sub-system target.
    ///
    /// An empty `target` means the default target. Unknown parameters
    /// within a known sub-system yield [`ValueSource::Absent`] with an
    /// empty value.
    pub fn resolve_config_param(
        &self,
        subsys: SubSys,
        target: &str,
        param: &str,
    ) -> (String, ValueSource) {
        if !RESOLVABLE_SUBSYSTEMS.contains(&subsys) {
            return (String::new(), ValueSource::Absent);
        }

        let defaults = self.schema().default_kvs(subsys);
        let default_value = match defaults.lookup(param) {
            Some(v) => v,
            None => return (String::new(), ValueSource::Absent),
        };

        let target = if target.is_empty() {
            DEFAULT_TARGET
        } else {
            target
        };

        let value = env_get(&env_var_name(subsys, target, param), "");
        if !value.is_empty() {
            return (value, ValueSource::Env);
        }

        if let Some(kvs) = self
            .values()
            .get(subsys.as_str())
            .and_then(|targets| targets.get(target))
        {
            if let Some(v) = kvs.lookup(param) {
                return (v.to_string(), ValueSource::Config);
            }
        }

        (default_value.to_string(), ValueSource::Default)
    }
}
