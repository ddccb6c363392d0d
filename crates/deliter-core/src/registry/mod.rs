//! Plugin registry
//!
//! Maps legacy plugin identifiers to their canonical GUID, current version,
//! and loader renames. Built once per run and shared read-only between
//! workers.

pub mod parser;
pub mod schema;

use std::collections::{BTreeMap, BTreeSet};

pub use parser::{load_registry, parse_registry_str};
pub use schema::{RegistryConfig, RegistryEntry};

/// Read-only lookup tables built from [`RegistryConfig`]
#[derive(Debug, Clone, Default)]
pub struct Registry {
    ignore: BTreeSet<String>,
    plugins: BTreeMap<String, RegistryEntry>,
}

impl Registry {
    pub fn new(config: RegistryConfig) -> Self {
        Self {
            ignore: config.ignore,
            plugins: config.plugins,
        }
    }

    /// Look up a legacy plugin identifier.
    pub fn lookup_plugin(&self, id: &str) -> Option<&RegistryEntry> {
        self.plugins.get(id)
    }

    /// Look up the new name of a legacy loader of a known plugin.
    pub fn lookup_loader<'a>(&self, entry: &'a RegistryEntry, legacy_name: &str) -> Option<&'a str> {
        entry.loaders.get(legacy_name).map(String::as_str)
    }

    /// Whether a package directory name is excluded from conversion.
    ///
    /// Package names have the form `author-name`; only names that split on
    /// `-` into exactly two parts are checked, against the second part.
    pub fn is_ignored(&self, package_name: &str) -> bool {
        let mut parts = package_name.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some(name), None) => self.ignore.contains(name),
            _ => false,
        }
    }

    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }
}

impl From<RegistryConfig> for Registry {
    fn from(config: RegistryConfig) -> Self {
        Registry::new(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Registry {
        parse_registry_str(
            r#"
ignore = ["Deliter", "Stratum"]

[plugins.h3vr]
guid = "h3vr.otherloader"
version = "1.0.0"

[plugins.h3vr.loaders]
item = "item"
"item_first" = "item"
"#,
        )
        .expect("valid registry")
    }

    #[test]
    fn test_lookup_plugin() {
        let registry = registry();
        let entry = registry.lookup_plugin("h3vr").unwrap();
        assert_eq!(entry.guid, "h3vr.otherloader");
        assert_eq!(entry.version, "1.0.0");
        assert!(registry.lookup_plugin("unknown").is_none());
    }

    #[test]
    fn test_lookup_loader() {
        let registry = registry();
        let entry = registry.lookup_plugin("h3vr").unwrap();
        assert_eq!(registry.lookup_loader(entry, "item_first"), Some("item"));
        assert_eq!(registry.lookup_loader(entry, "scene"), None);
    }

    #[test]
    fn test_is_ignored_matches_second_part() {
        let registry = registry();
        assert!(registry.is_ignored("nrgill28-Deliter"));
        assert!(registry.is_ignored("Stratum-Stratum"));
        assert!(!registry.is_ignored("author-OtherMod"));
    }

    #[test]
    fn test_is_ignored_requires_exactly_two_parts() {
        let registry = registry();
        assert!(!registry.is_ignored("Deliter"));
        assert!(!registry.is_ignored("a-b-Deliter"));
        assert!(!registry.is_ignored("a-Deliter-1.0"));
    }
}
