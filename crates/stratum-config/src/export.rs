//! Serialization of listing output to directive text.

use std::io::Write;

use crate::error::Result;
use crate::store::ConfigStore;
use crate::subsys::KV_NEWLINE;

/// Writes the targets matched by a `subsystem[:target]` query as
/// directive lines: `subsystem[:target] key=value ...`, newline-joined
/// when more than one target is present.
pub fn write_config_to<W: Write>(store: &ConfigStore, query: &str, writer: &mut W) -> Result<()> {
    let targets = store.get_kvs(query)?;
    let multiple = targets.len() > 1;
    for target in &targets {
        write!(writer, "{} {}", target.subsystem, target.kvs)?;
        if multiple {
            write!(writer, "{}", KV_NEWLINE)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ConfigSchema;

    #[test]
    fn test_single_target_no_trailing_newline() {
        let mut store = ConfigStore::new(ConfigSchema::builtin());
        store.set_kvs("site name=rack0 region=us-east-1").unwrap();

        let mut out = Vec::new();
        write_config_to(&store, "site", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "site name=rack0 region=us-east-1");
    }

    #[test]
    fn test_multiple_targets_one_per_line() {
        let mut store = ConfigStore::new(ConfigSchema::builtin());
        store.set_kvs("notify_webhook:primary endpoint=http://a/").unwrap();

        let mut out = Vec::new();
        write_config_to(&store, "notify_webhook", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.trim_end().lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("notify_webhook "));
        assert!(lines[1].starts_with("notify_webhook:primary "));
        // The implicit state=on is elided from output.
        assert!(!lines[1].contains("state=on"));
    }

    #[test]
    fn test_export_round_trips_through_read_config() {
        let mut store = ConfigStore::new(ConfigSchema::builtin());
        store.set_kvs("site name=rack0 region=us-east-1").unwrap();

        let mut out = Vec::new();
        write_config_to(&store, "site", &mut out).unwrap();

        let mut restored = ConfigStore::new(ConfigSchema::builtin());
        restored.read_config(&out[..]).unwrap();
        assert_eq!(
            restored.get_kvs("site").unwrap(),
            store.get_kvs("site").unwrap()
        );
    }
}
