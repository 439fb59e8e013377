//! The closed set of configuration sub-systems and the directive
//! grammar constants.
//!
//! Sub-systems are a closed enumeration; the textual name is a
//! serialization-only projection. Parsing a directive resolves the name
//! through [`SubSys`] before any store bucket is touched, so a typo can
//! never silently create a new unvalidated sub-system.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Separator between sub-system and target in a directive.
pub const SUB_SYS_SEPARATOR: &str = ":";
/// Separator between key and value.
pub const KV_SEPARATOR: &str = "=";
/// Separator between fields.
pub const KV_SPACE_SEPARATOR: &str = " ";
/// Leading marker for comment lines in bulk input.
pub const KV_COMMENT: &str = "#";
/// Line separator for multi-target listings.
pub const KV_NEWLINE: &str = "\n";
pub const KV_DOUBLE_QUOTE: &str = "\"";
pub const KV_SINGLE_QUOTE: &str = "'";

/// Prefix for every environment variable consumed by the store.
pub const ENV_PREFIX: &str = "STRATUM_";
pub const ENV_WORD_DELIMITER: &str = "_";

/// Sentinel name of the default (unnamed) target.
pub const DEFAULT_TARGET: &str = "_";

/// Reserved key toggling whether a target is active.
pub const STATE_KEY: &str = "state";
pub const STATE_ON: &str = "on";
pub const STATE_OFF: &str = "off";
/// Reserved key carrying an operator comment, valid for every
/// sub-system and always optional.
pub const COMMENT_KEY: &str = "comment";

// Well-known parameter keys shared by several sub-systems.
pub const NAME_KEY: &str = "name";
pub const REGION_KEY: &str = "region";
pub const ACCESS_KEY: &str = "access_key";
pub const SECRET_KEY: &str = "secret_key";
pub const API_KEY: &str = "api_key";
pub const LICENSE_KEY: &str = "license"; // Deprecated, replaced by api_key
pub const PROXY_KEY: &str = "proxy";

/// A configuration sub-system: a named domain with a fixed schema of
/// legal keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSys {
    Credentials,
    Site,
    Region,
    Etcd,
    Cache,
    Api,
    StorageClass,
    Compression,
    LoggerWebhook,
    AuditWebhook,
    AuditKafka,
    PolicyOpa,
    PolicyPlugin,
    IdentityOpenId,
    IdentityLdap,
    IdentityTls,
    IdentityPlugin,
    Scanner,
    Heal,
    Subnet,
    Callhome,
    NotifyAmqp,
    NotifyElasticsearch,
    NotifyKafka,
    NotifyMqtt,
    NotifyMysql,
    NotifyNats,
    NotifyNsq,
    NotifyPostgres,
    NotifyRedis,
    NotifyWebhook,
}

impl SubSys {
    /// All registered sub-systems.
    pub const ALL: &'static [SubSys] = &[
        SubSys::Credentials,
        SubSys::Site,
        SubSys::Region,
        SubSys::Etcd,
        SubSys::Cache,
        SubSys::Api,
        SubSys::StorageClass,
        SubSys::Compression,
        SubSys::LoggerWebhook,
        SubSys::AuditWebhook,
        SubSys::AuditKafka,
        SubSys::PolicyOpa,
        SubSys::PolicyPlugin,
        SubSys::IdentityOpenId,
        SubSys::IdentityLdap,
        SubSys::IdentityTls,
        SubSys::IdentityPlugin,
        SubSys::Scanner,
        SubSys::Heal,
        SubSys::Subnet,
        SubSys::Callhome,
        SubSys::NotifyAmqp,
        SubSys::NotifyElasticsearch,
        SubSys::NotifyKafka,
        SubSys::NotifyMqtt,
        SubSys::NotifyMysql,
        SubSys::NotifyNats,
        SubSys::NotifyNsq,
        SubSys::NotifyPostgres,
        SubSys::NotifyRedis,
        SubSys::NotifyWebhook,
    ];

    /// The canonical textual name.
    pub fn as_str(self) -> &'static str {
        match self {
            SubSys::Credentials => "credentials",
            SubSys::Site => "site",
            SubSys::Region => "region",
            SubSys::Etcd => "etcd",
            SubSys::Cache => "cache",
            SubSys::Api => "api",
            SubSys::StorageClass => "storage_class",
            SubSys::Compression => "compression",
            SubSys::LoggerWebhook => "logger_webhook",
            SubSys::AuditWebhook => "audit_webhook",
            SubSys::AuditKafka => "audit_kafka",
            SubSys::PolicyOpa => "policy_opa",
            SubSys::PolicyPlugin => "policy_plugin",
            SubSys::IdentityOpenId => "identity_openid",
            SubSys::IdentityLdap => "identity_ldap",
            SubSys::IdentityTls => "identity_tls",
            SubSys::IdentityPlugin => "identity_plugin",
            SubSys::Scanner => "scanner",
            SubSys::Heal => "heal",
            SubSys::Subnet => "subnet",
            SubSys::Callhome => "callhome",
            SubSys::NotifyAmqp => "notify_amqp",
            SubSys::NotifyElasticsearch => "notify_elasticsearch",
            SubSys::NotifyKafka => "notify_kafka",
            SubSys::NotifyMqtt => "notify_mqtt",
            SubSys::NotifyMysql => "notify_mysql",
            SubSys::NotifyNats => "notify_nats",
            SubSys::NotifyNsq => "notify_nsq",
            SubSys::NotifyPostgres => "notify_postgres",
            SubSys::NotifyRedis => "notify_redis",
            SubSys::NotifyWebhook => "notify_webhook",
        }
    }

    /// Whether changes to this sub-system apply without a process
    /// restart.
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            SubSys::Api
                | SubSys::Compression
                | SubSys::Scanner
                | SubSys::Heal
                | SubSys::Subnet
                | SubSys::Callhome
                | SubSys::LoggerWebhook
                | SubSys::AuditWebhook
                | SubSys::AuditKafka
                | SubSys::StorageClass
        )
    }

    /// Whether this sub-system supports only the default target.
    /// Addressing a single-target sub-system with an explicit target is
    /// a validation error.
    pub fn is_single_target(self) -> bool {
        matches!(
            self,
            SubSys::Credentials
                | SubSys::Site
                | SubSys::Region
                | SubSys::Etcd
                | SubSys::Cache
                | SubSys::Api
                | SubSys::StorageClass
                | SubSys::Compression
                | SubSys::PolicyOpa
                | SubSys::PolicyPlugin
                | SubSys::IdentityLdap
                | SubSys::IdentityTls
                | SubSys::IdentityPlugin
                | SubSys::Heal
                | SubSys::Scanner
        )
    }

    /// Whether this is one of the notification transports.
    pub fn is_notify(self) -> bool {
        self.as_str().starts_with("notify_")
    }

    /// All sub-systems whose name starts with `prefix`.
    pub fn match_prefix(prefix: &str) -> Vec<SubSys> {
        SubSys::ALL
            .iter()
            .copied()
            .filter(|s| s.as_str().starts_with(prefix))
            .collect()
    }

    /// Resolve a bare name to a sub-system: exact match first, then a
    /// unique prefix match. A prefix matching more than one registered
    /// sub-system is an error rather than a guess.
    pub fn resolve_prefix(name: &str) -> Result<SubSys, Error> {
        if let Ok(s) = SubSys::from_str(name) {
            return Ok(s);
        }
        let matches = SubSys::match_prefix(name);
        match matches.len() {
            0 => Err(Error::UnknownSubSys(name.to_string())),
            1 => Ok(matches[0]),
            _ => Err(Error::AmbiguousSubSys(
                name.to_string(),
                matches
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            )),
        }
    }
}

impl fmt::Display for SubSys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubSys {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SubSys::ALL
            .iter()
            .copied()
            .find(|sub| sub.as_str() == s)
            .ok_or_else(|| Error::UnknownSubSys(s.to_string()))
    }
}
