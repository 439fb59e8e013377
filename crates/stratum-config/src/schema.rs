//! The configuration schema: default values, help metadata, deprecated
//! entries and sub-system renames.
//!
//! The schema is constructed once at process start (usually via
//! [`ConfigSchema::builtin`]) and shared by `Arc` into every store.
//! After construction it is immutable; there is no ambient global
//! registration step.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::kv::Kvs;
use crate::subsys::{SubSys, LICENSE_KEY, STATE_KEY, STATE_OFF};

/// Help/validation metadata for a single key (or, in the global and
/// deprecated tables, for a whole sub-system).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelpKv {
    pub key: String,
    pub description: String,
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub sensitive: bool,
}

impl HelpKv {
    fn new(key: &str, description: &str, optional: bool, sensitive: bool) -> Self {
        HelpKv {
            key: key.to_string(),
            description: description.to_string(),
            optional,
            sensitive,
        }
    }
}

/// Ordered help metadata for a sub-system. Order here determines
/// listing order downstream.
pub type HelpKvs = Vec<HelpKv>;

/// Write-once configuration schema shared by every [`ConfigStore`].
///
/// [`ConfigStore`]: crate::store::ConfigStore
#[derive(Debug, Default)]
pub struct ConfigSchema {
    defaults: HashMap<SubSys, Kvs>,
    help: HashMap<SubSys, HelpKvs>,
    /// Sub-system declaration order used when listing across all
    /// sub-systems; keys here are sub-system names.
    global_help: HelpKvs,
    /// Deprecated sub-system entries, appended after primary entries
    /// when listing.
    deprecated_help: HelpKvs,
    /// Old sub-system name to its current replacement, applied
    /// transparently during migration.
    renames: HashMap<String, SubSys>,
    empty: Kvs,
}

impl ConfigSchema {
    /// Start building an empty schema.
    pub fn builder() -> ConfigSchemaBuilder {
        ConfigSchemaBuilder {
            schema: ConfigSchema::default(),
        }
    }

    /// The canonical default KVS for a sub-system. Defines the full
    /// legal key set and default values.
    pub fn default_kvs(&self, subsys: SubSys) -> &Kvs {
        self.defaults.get(&subsys).unwrap_or(&self.empty)
    }

    /// Ordered per-key help metadata for a sub-system.
    pub fn help(&self, subsys: SubSys) -> &[HelpKv] {
        self.help.get(&subsys).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sub-system entries in declaration order, primary entries first,
    /// deprecated entries appended.
    pub fn listing_order(&self) -> impl Iterator<Item = &HelpKv> {
        self.global_help.iter().chain(self.deprecated_help.iter())
    }

    /// Looks up the replacement for a renamed sub-system.
    pub fn renamed(&self, old_name: &str) -> Option<SubSys> {
        self.renames.get(old_name).copied()
    }

    /// Whether the sub-system's defaults declare the reserved `state`
    /// key. When they do, a constructed KVS that omits it is assigned
    /// `on` implicitly.
    pub fn declares_state(&self, subsys: SubSys) -> bool {
        self.default_kvs(subsys).lookup(STATE_KEY).is_some()
    }

    /// The built-in schema for all registered sub-systems, playing the
    /// role of the server's one-time registration pass.
    pub fn builtin() -> Arc<ConfigSchema> {
        let off = STATE_OFF;
        let schema = ConfigSchema::builder()
            // Hidden from listings historically, but addressable like
            // any other sub-system; dropped wholesale on redaction.
            .subsystem(
                SubSys::Credentials,
                "server root credentials",
                &[("access_key", "", "root access key", true, false),
                  ("secret_key", "", "root secret key", true, true)],
            )
            .subsystem(
                SubSys::Site,
                "site name and region",
                &[("name", "", "name for the site", true, false),
                  ("region", "", "physical location of the site", true, false)],
            )
            .subsystem(
                SubSys::Etcd,
                "etcd federation",
                &[("endpoints", "", "comma separated etcd endpoints", true, false),
                  ("path_prefix", "", "namespace prefix for etcd keys", true, false),
                  ("coredns_path", "/skydns", "shared DNS bucket path", true, false)],
            )
            .subsystem(
                SubSys::Cache,
                "disk caching",
                &[(STATE_KEY, off, "enable or disable caching", true, false),
                  ("drives", "", "comma separated cache drive paths", true, false),
                  ("expiry", "90", "cache expiry in days", true, false),
                  ("quota", "80", "cache quota percentage", true, false)],
            )
            .subsystem(
                SubSys::Api,
                "request tuning",
                &[("requests_max", "0", "maximum concurrent requests", true, false),
                  ("requests_deadline", "10s", "deadline for queued requests", true, false),
                  ("cors_allow_origin", "*", "allowed CORS origins", true, false)],
            )
            .subsystem(
                SubSys::StorageClass,
                "object level redundancy",
                &[("standard", "", "standard storage class parity", true, false),
                  ("rrs", "", "reduced redundancy parity", true, false)],
            )
            .subsystem(
                SubSys::Compression,
                "streaming compression",
                &[(STATE_KEY, off, "enable or disable compression", true, false),
                  ("extensions", ".txt,.log,.csv", "compressed file extensions", true, false),
                  ("mime_types", "text/*", "compressed mime types", true, false)],
            )
            .subsystem(
                SubSys::Scanner,
                "background object scanner",
                &[("delay", "10", "scanner delay multiplier", true, false),
                  ("max_wait", "15s", "maximum wait between operations", true, false),
                  ("cycle", "1m", "time between scanner cycle starts", true, false)],
            )
            .subsystem(
                SubSys::Heal,
                "background healing",
                &[("bitrotscan", off, "enable bitrot scan during healing", true, false),
                  ("max_sleep", "1s", "maximum sleep between heal operations", true, false),
                  ("max_io", "100", "concurrent heal operations allowed", true, false)],
            )
            .subsystem(
                SubSys::Subnet,
                "subnet registration",
                &[(LICENSE_KEY, "", "legacy license token", true, true),
                  ("api_key", "", "subnet api key", true, true),
                  ("proxy", "", "proxy URL for subnet traffic", true, false)],
            )
            .subsystem(
                SubSys::Callhome,
                "diagnostics upload",
                &[(STATE_KEY, off, "enable or disable callhome", true, false),
                  ("frequency", "24h", "time between callhome uploads", true, false)],
            )
            .subsystem(
                SubSys::LoggerWebhook,
                "server log webhook",
                &[(STATE_KEY, off, "enable or disable the webhook", true, false),
                  ("endpoint", "", "webhook endpoint URL", false, false),
                  ("auth_token", "", "opaque token for the endpoint", true, true)],
            )
            .subsystem(
                SubSys::AuditWebhook,
                "audit log webhook",
                &[(STATE_KEY, off, "enable or disable the webhook", true, false),
                  ("endpoint", "", "webhook endpoint URL", false, false),
                  ("auth_token", "", "opaque token for the endpoint", true, true),
                  ("client_cert", "", "mTLS client certificate", true, false),
                  ("client_key", "", "mTLS client certificate key", true, true)],
            )
            .subsystem(
                SubSys::AuditKafka,
                "audit log kafka topic",
                &[(STATE_KEY, off, "enable or disable kafka audit", true, false),
                  ("brokers", "", "comma separated kafka brokers", false, false),
                  ("topic", "", "kafka topic for audit events", true, false),
                  ("sasl_username", "", "SASL username", true, false),
                  ("sasl_password", "", "SASL password", true, true)],
            )
            .subsystem(
                SubSys::PolicyOpa,
                "external OPA policy engine",
                &[("url", "", "OPA HTTP endpoint", true, false),
                  ("auth_token", "", "opaque token for the endpoint", true, true)],
            )
            .subsystem(
                SubSys::PolicyPlugin,
                "external policy plugin",
                &[("url", "", "plugin HTTP endpoint", true, false),
                  ("auth_token", "", "opaque token for the endpoint", true, true)],
            )
            .subsystem(
                SubSys::IdentityOpenId,
                "OpenID Connect identity",
                &[("config_url", "", "OpenID discovery document URL", true, false),
                  ("client_id", "", "unique public client identifier", true, false),
                  ("client_secret", "", "client secret", true, true),
                  ("claim_name", "policy", "JWT claim carrying the policy", true, false),
                  ("claim_prefix", "", "JWT claim namespace prefix", true, false),
                  ("scopes", "", "comma separated OpenID scopes", true, false),
                  ("redirect_uri", "", "console redirect URI", true, false)],
            )
            .subsystem(
                SubSys::IdentityLdap,
                "AD/LDAP identity",
                &[("server_addr", "", "AD/LDAP server address", true, false),
                  ("lookup_bind_dn", "", "lookup bind DN", true, false),
                  ("lookup_bind_password", "", "lookup bind password", true, true),
                  ("user_dn_search_base_dn", "", "user DN search base", true, false),
                  ("user_dn_search_filter", "", "user DN search filter", true, false)],
            )
            .subsystem(
                SubSys::IdentityTls,
                "mTLS identity",
                &[("skip_verify", off, "trust client certificates without verification", true, false)],
            )
            .subsystem(
                SubSys::IdentityPlugin,
                "external identity plugin",
                &[("url", "", "plugin HTTP endpoint", true, false),
                  ("auth_token", "", "opaque token for the endpoint", true, true),
                  ("role_policy", "", "policies for the plugin role", true, false)],
            )
            .subsystem(
                SubSys::NotifyWebhook,
                "webhook notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("endpoint", "", "webhook endpoint URL", false, false),
                  ("auth_token", "", "opaque token for the endpoint", true, true),
                  ("queue_dir", "", "staging directory for undelivered events", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false),
                  ("client_cert", "", "mTLS client certificate", true, false),
                  ("client_key", "", "mTLS client certificate key", true, true)],
            )
            .subsystem(
                SubSys::NotifyAmqp,
                "AMQP notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("url", "", "AMQP server URL", false, true),
                  ("exchange", "", "AMQP exchange name", true, false),
                  ("routing_key", "", "AMQP routing key", true, false),
                  ("durable", off, "persist the exchange across restarts", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            .subsystem(
                SubSys::NotifyElasticsearch,
                "Elasticsearch notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("url", "", "Elasticsearch server URL", false, true),
                  ("index", "", "index to store events", true, false),
                  ("format", "namespace", "namespace or access format", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            .subsystem(
                SubSys::NotifyKafka,
                "Kafka notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("brokers", "", "comma separated kafka brokers", false, false),
                  ("topic", "", "kafka topic for events", true, false),
                  ("sasl_username", "", "SASL username", true, false),
                  ("sasl_password", "", "SASL password", true, true),
                  ("queue_dir", "", "staging directory for undelivered events", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            .subsystem(
                SubSys::NotifyMqtt,
                "MQTT notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("broker", "", "MQTT broker address", false, false),
                  ("topic", "", "MQTT topic for events", true, false),
                  ("username", "", "MQTT username", true, false),
                  ("password", "", "MQTT password", true, true),
                  ("qos", "0", "quality of service level", true, false)],
            )
            .subsystem(
                SubSys::NotifyMysql,
                "MySQL notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("dsn_string", "", "MySQL data source name", false, true),
                  ("table", "", "table to store events", true, false),
                  ("format", "namespace", "namespace or access format", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            .subsystem(
                SubSys::NotifyNats,
                "NATS notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("address", "", "NATS server address", false, false),
                  ("subject", "", "NATS subject for events", true, false),
                  ("username", "", "NATS username", true, false),
                  ("password", "", "NATS password", true, true),
                  ("tls", off, "enable TLS for the connection", true, false)],
            )
            .subsystem(
                SubSys::NotifyNsq,
                "NSQ notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("nsqd_address", "", "nsqd server address", false, false),
                  ("topic", "", "NSQ topic for events", true, false),
                  ("tls", off, "enable TLS for the connection", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            .subsystem(
                SubSys::NotifyPostgres,
                "PostgreSQL notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("connection_string", "", "PostgreSQL connection string", false, true),
                  ("table", "", "table to store events", true, false),
                  ("format", "namespace", "namespace or access format", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            .subsystem(
                SubSys::NotifyRedis,
                "Redis notifications",
                &[(STATE_KEY, off, "enable or disable the target", true, false),
                  ("address", "", "Redis server address", false, false),
                  ("password", "", "Redis password", true, true),
                  ("key", "", "Redis key to store events", true, false),
                  ("format", "namespace", "namespace or access format", true, false),
                  ("queue_limit", "0", "maximum limit for undelivered events", true, false)],
            )
            // Legacy region sub-system, superseded by site. Kept so old
            // stores keep resolving; listed after the primary entries.
            .deprecated_subsystem(
                SubSys::Region,
                "legacy server region",
                &[("name", "", "physical location of the server", true, false)],
            )
            .rename("crawler", SubSys::Scanner)
            .build();
        Arc::new(schema)
    }
}

/// Builder for [`ConfigSchema`]. The builder is consumed by `build`;
/// the resulting schema is immutable.
pub struct ConfigSchemaBuilder {
    schema: ConfigSchema,
}

impl ConfigSchemaBuilder {
    /// Register a sub-system with its description and key table. Each
    /// key entry is `(key, default, description, optional, sensitive)`;
    /// entry order is the declaration order used in listings.
    pub fn subsystem(
        mut self,
        subsys: SubSys,
        description: &str,
        keys: &[(&str, &str, &str, bool, bool)],
    ) -> Self {
        self.register(subsys, keys);
        self.schema
            .global_help
            .push(HelpKv::new(subsys.as_str(), description, false, false));
        self
    }

    /// Register a deprecated sub-system: same tables, but the listing
    /// entry goes after all primary entries.
    pub fn deprecated_subsystem(
        mut self,
        subsys: SubSys,
        description: &str,
        keys: &[(&str, &str, &str, bool, bool)],
    ) -> Self {
        self.register(subsys, keys);
        self.schema
            .deprecated_help
            .push(HelpKv::new(subsys.as_str(), description, true, false));
        self
    }

    /// Record a sub-system rename, applied transparently by `merge`.
    pub fn rename(mut self, old_name: &str, new: SubSys) -> Self {
        self.schema.renames.insert(old_name.to_string(), new);
        self
    }

    pub fn build(self) -> ConfigSchema {
        self.schema
    }

    fn register(&mut self, subsys: SubSys, keys: &[(&str, &str, &str, bool, bool)]) {
        let mut defaults = Kvs::new();
        let mut help = HelpKvs::with_capacity(keys.len());
        for (key, default, description, optional, sensitive) in keys {
            defaults.set(key, default);
            help.push(HelpKv::new(key, description, *optional, *sensitive));
        }
        self.schema.defaults.insert(subsys, defaults);
        self.schema.help.insert(subsys, help);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_all_subsystems() {
        let schema = ConfigSchema::builtin();
        for &s in SubSys::ALL {
            assert!(
                !schema.default_kvs(s).is_empty(),
                "no defaults registered for {}",
                s
            );
            assert!(
                !schema.help(s).is_empty(),
                "no help registered for {}",
                s
            );
        }
    }

    #[test]
    fn test_site_defaults() {
        let schema = ConfigSchema::builtin();
        let site = schema.default_kvs(SubSys::Site);
        assert_eq!(site.lookup("name"), Some(""));
        assert_eq!(site.lookup("region"), Some(""));
        assert!(!schema.declares_state(SubSys::Site));
        assert!(schema.declares_state(SubSys::NotifyWebhook));
    }

    #[test]
    fn test_sensitive_flags() {
        let schema = ConfigSchema::builtin();
        let creds = schema.help(SubSys::Credentials);
        let secret = creds.iter().find(|h| h.key == "secret_key").unwrap();
        assert!(secret.sensitive);
        let access = creds.iter().find(|h| h.key == "access_key").unwrap();
        assert!(!access.sensitive);
    }

    #[test]
    fn test_listing_order_deprecated_last() {
        let schema = ConfigSchema::builtin();
        let order: Vec<&str> = schema.listing_order().map(|h| h.key.as_str()).collect();
        let region_pos = order.iter().position(|k| *k == "region").unwrap();
        assert_eq!(region_pos, order.len() - 1);
        assert!(order.contains(&"site"));
    }

    #[test]
    fn test_rename_table() {
        let schema = ConfigSchema::builtin();
        assert_eq!(schema.renamed("crawler"), Some(SubSys::Scanner));
        assert_eq!(schema.renamed("cache"), None);
    }
}
