//! Site identity lookup, including the legacy region fallback.
//!
//! The site name and region can come from environment variables, the
//! `site` sub-system, or (for deployments configured before the
//! rename) the legacy `region` sub-system. An invalid legacy region
//! configuration cannot be reset through the legacy sub-system, so the
//! error points the operator at the replacement command.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::env::env_get;
use crate::error::{Error, Result};
use crate::kv::Kvs;
use crate::schema::ConfigSchema;
use crate::subsys::{SubSys, NAME_KEY, REGION_KEY, STATE_OFF};
use crate::validate::check_valid_keys_kvs;

pub const ENV_SITE_NAME: &str = "STRATUM_SITE_NAME";
pub const ENV_SITE_REGION: &str = "STRATUM_SITE_REGION";
/// Legacy environment names, still honored for old deployments.
pub const ENV_REGION: &str = "STRATUM_REGION";
pub const ENV_REGION_NAME: &str = "STRATUM_REGION_NAME";
/// Legacy write-once-read-many toggle.
pub const ENV_WORM: &str = "STRATUM_WORM";

/// Site identity: name and region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub region: String,
}

fn valid_region_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-zA-Z][a-zA-Z0-9-_]+$").unwrap())
}

/// Lowercase letters, digits and '-', starting with a letter, at least
/// two characters long.
fn valid_site_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z][a-z0-9-]+$").unwrap())
}

/// Resolves the site identity from environment variables and the given
/// `site`/`region` sub-system KVS, falling back to the legacy region
/// sub-system when the site carries none.
pub fn lookup_site(schema: &ConfigSchema, site_kvs: &Kvs, region_kvs: &Kvs) -> Result<Site> {
    check_valid_keys_kvs(SubSys::Site, site_kvs, schema.default_kvs(SubSys::Site))?;

    let mut region = env_get(ENV_REGION, "");
    if region.is_empty() {
        region = env_get(ENV_REGION_NAME, "");
    }
    if region.is_empty() {
        region = env_get(ENV_SITE_REGION, site_kvs.get(REGION_KEY));
    }
    if region.is_empty() {
        // No region in the site sub-system, look up the legacy region
        // sub-system. It cannot be (re)set, so an invalid key there
        // needs the operator to move to the site sub-system.
        if let Err(err) = check_valid_keys_kvs(
            SubSys::Region,
            region_kvs,
            schema.default_kvs(SubSys::Region),
        ) {
            return Err(Error::LegacyRegion(err.to_string()));
        }
        region = region_kvs.get(NAME_KEY).to_string();
    }

    let mut site = Site::default();
    if !region.is_empty() {
        if !valid_region_regex().is_match(&region) {
            return Err(Error::InvalidRegion(region));
        }
        site.region = region;
    }

    let name = env_get(ENV_SITE_NAME, site_kvs.get(NAME_KEY));
    if !name.is_empty() {
        if !valid_site_name_regex().is_match(&name) {
            return Err(Error::InvalidSiteName(name));
        }
        site.name = name;
    }
    Ok(site)
}

/// Whether write-once-read-many mode is enabled, per the legacy
/// environment toggle.
pub fn lookup_worm() -> Result<bool> {
    parse_bool(&env_get(ENV_WORM, STATE_OFF))
}

/// Parses the on/off flag values used across legacy toggles.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "t" | "yes" => Ok(true),
        "off" | "false" | "0" | "f" | "no" => Ok(false),
        _ => Err(Error::InvalidBool(value.to_string())),
    }
}
