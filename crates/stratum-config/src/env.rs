//! Process-environment access and the canonical variable naming
//! convention.
//!
//! Variables follow `STRATUM_<SUBSYS>_<PARAM>` for the default target
//! and `STRATUM_<SUBSYS>_<PARAM>_<target>` for named targets of
//! multi-target sub-systems.

use crate::subsys::{SubSys, DEFAULT_TARGET, ENV_PREFIX, ENV_WORD_DELIMITER};

/// Returns the value of an environment variable, or `default` when the
/// variable is unset or not valid unicode.
pub fn env_get(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

/// Returns the names of all environment variables starting with
/// `prefix`, sorted for deterministic iteration.
pub fn env_list(prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = std::env::vars()
        .map(|(name, _)| name)
        .filter(|name| name.starts_with(prefix))
        .collect();
    names.sort();
    names
}

/// The canonical environment variable name for a sub-system parameter.
pub fn env_var_name(subsys: SubSys, target: &str, param: &str) -> String {
    let base = format!(
        "{}{}{}{}",
        ENV_PREFIX,
        subsys.as_str().to_uppercase(),
        ENV_WORD_DELIMITER,
        param.to_uppercase()
    );
    if target == DEFAULT_TARGET {
        base
    } else {
        format!("{}{}{}", base, ENV_WORD_DELIMITER, target)
    }
}
