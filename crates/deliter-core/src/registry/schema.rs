//! Registry configuration schema
//!
//! Defines the structure of `deliter.toml`: the package-name ignore list
//! and the table of legacy plugins the new loader understands.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// A legacy plugin known to the new system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Canonical GUID of the plugin in the new system
    pub guid: String,

    /// Current version, emitted for hard dependencies
    pub version: String,

    /// Legacy loader name -> new loader name
    #[serde(default)]
    pub loaders: BTreeMap<String, String>,
}

impl RegistryEntry {
    /// Validate a single plugin entry
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.guid.trim().is_empty() {
            anyhow::bail!("Plugin 'guid' must not be empty");
        }
        if self.version.trim().is_empty() {
            anyhow::bail!("Plugin 'version' must not be empty");
        }
        for (legacy, current) in &self.loaders {
            if legacy.is_empty() || current.is_empty() {
                anyhow::bail!(
                    "Loader aliases must not be empty (found '{}' = '{}')",
                    legacy,
                    current
                );
            }
        }
        Ok(())
    }
}

/// Root structure of deliter.toml
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Package name suffixes (the part after `author-`) never converted
    #[serde(default)]
    pub ignore: BTreeSet<String>,

    /// Legacy plugin identifier -> plugin entry
    #[serde(default)]
    pub plugins: BTreeMap<String, RegistryEntry>,
}

impl RegistryConfig {
    /// Validate every plugin entry
    pub fn validate(&self) -> anyhow::Result<()> {
        use anyhow::Context;

        for (name, entry) in &self.plugins {
            entry
                .validate()
                .with_context(|| format!("Invalid plugin configuration: '{}'", name))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(guid: &str, version: &str) -> RegistryEntry {
        RegistryEntry {
            guid: guid.to_string(),
            version: version.to_string(),
            loaders: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validate_accepts_complete_entry() {
        let mut plugin = entry("h3vr.otherloader", "1.0.0");
        plugin
            .loaders
            .insert("item".to_string(), "item".to_string());
        assert!(plugin.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_guid() {
        let err = entry("  ", "1.0.0").validate().unwrap_err();
        assert!(err.to_string().contains("guid"));
    }

    #[test]
    fn test_validate_rejects_empty_version() {
        let err = entry("a.b", "").validate().unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_validate_rejects_empty_loader_alias() {
        let mut plugin = entry("a.b", "1.0.0");
        plugin.loaders.insert("item".to_string(), String::new());
        assert!(plugin.validate().is_err());
    }

    #[test]
    fn test_config_validate_names_plugin() {
        let mut config = RegistryConfig::default();
        config.plugins.insert("broken".to_string(), entry("", "1.0.0"));

        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("broken"));
    }
}
