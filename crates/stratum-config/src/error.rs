//! Error types for the configuration store.
//!
//! A single error enum covers every failure surfaced by the crate:
//! malformed directives, unknown sub-systems or targets, required keys
//! missing under an enabled target, and validation failures. Validation
//! errors always list every offending key or environment variable at
//! once, never just the first.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the configuration store.
#[derive(Error, Debug)]
pub enum Error {
    #[error("input arguments cannot be empty")]
    EmptyInput,

    #[error("invalid number of arguments {0}")]
    TooManyArgs(String),

    #[error("unknown sub-system {0}")]
    UnknownSubSys(String),

    #[error("sub-system prefix '{0}' is ambiguous, matches [{1}]")]
    AmbiguousSubSys(String, String),

    #[error("sub-system target '{0}' cannot be empty")]
    EmptyTarget(String),

    #[error("sub-system '{0}' only supports single target")]
    SingleTargetOnly(String),

    #[error("sub-system target '{0}' doesn't exist")]
    TargetNotFound(String),

    #[error("sub-system {0} already deleted")]
    AlreadyDeleted(String),

    #[error("sub-system '{0}' cannot have empty keys")]
    EmptyKeys(String),

    #[error("key '{0}', cannot have empty value")]
    EmptyValue(String),

    #[error("'{key}' is not optional for '{subsys}' sub-system, please check '{subsys}' documentation")]
    RequiredKey { key: String, subsys: String },

    #[error("found invalid keys ({keys}) for '{subsys}' sub-system, use 'stratumctl del {subsys}' to reset invalid keys")]
    InvalidKeys { keys: String, subsys: String },

    #[error("the following environment variables are unknown: {0}")]
    UnknownEnvVars(String),

    #[error("could not load region from legacy configuration as it was invalid - use 'stratumctl set site region=myregion name=myname' to set a region and name ({0})")]
    LegacyRegion(String),

    #[error("region '{0}' is invalid, expected simple characters such as [us-east-1, myregion...]")]
    InvalidRegion(String),

    #[error("site name '{0}' is invalid, expected simple characters such as [cal-rack0, myname...]")]
    InvalidSiteName(String),

    #[error("invalid boolean value '{0}', expected one of [on, off, true, false, 1, 0]")]
    InvalidBool(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_offenders() {
        let err = Error::RequiredKey {
            key: "endpoint".to_string(),
            subsys: "notify_webhook".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("endpoint"));
        assert!(msg.contains("notify_webhook"));

        let err = Error::InvalidKeys {
            keys: "bogus=1".to_string(),
            subsys: "region".to_string(),
        };
        assert!(err.to_string().contains("bogus=1"));
    }
}
