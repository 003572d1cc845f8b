//! Carve configuration.
//!
//! A `CarveConfig` is fixed for the duration of a run. It names the root
//! functions to carve from and decides what happens when no roots are given
//! or when a named root does not exist.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::canonical::canonical_hash_hex;
use crate::DEFAULT_CONFIG_VERSION;

/// Roots used when no root names are configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRoots {
    /// Every function named `main`.
    #[default]
    MainOnly,
    /// Every top-level function with a body in the main file.
    MainFileFunctions,
}

/// What to do with a configured root that does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedRootPolicy {
    /// Fail the run.
    #[default]
    Abort,
    /// Log a warning and carry on with the other roots.
    Skip,
}

/// Configuration of one carve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarveConfig {
    /// Configuration version identifier.
    #[serde(default = "default_version")]
    pub version: String,
    /// Names of the root functions.
    #[serde(default)]
    pub roots: BTreeSet<String>,
    /// Roots used when `roots` is empty.
    #[serde(default)]
    pub default_roots: DefaultRoots,
    /// Handling of roots that cannot be found.
    #[serde(default)]
    pub unresolved_root: UnresolvedRootPolicy,
}

fn default_version() -> String {
    DEFAULT_CONFIG_VERSION.to_string()
}

impl Default for CarveConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            roots: BTreeSet::new(),
            default_roots: DefaultRoots::default(),
            unresolved_root: UnresolvedRootPolicy::default(),
        }
    }
}

impl CarveConfig {
    /// Configuration carving from the given root names.
    pub fn with_roots<I, S>(roots: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Replace the default-roots preset.
    pub fn default_roots(mut self, preset: DefaultRoots) -> Self {
        self.default_roots = preset;
        self
    }

    /// Replace the unresolved-root policy.
    pub fn unresolved_root(mut self, policy: UnresolvedRootPolicy) -> Self {
        self.unresolved_root = policy;
        self
    }

    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get the configuration ID.
    pub fn config_id(&self) -> &str {
        &self.version
    }

    /// Hash of the configuration parameters.
    pub fn params_hash(&self) -> String {
        canonical_hash_hex(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CarveConfig::default();
        assert_eq!(config.version, DEFAULT_CONFIG_VERSION);
        assert!(config.roots.is_empty());
        assert_eq!(config.default_roots, DefaultRoots::MainOnly);
        assert_eq!(config.unresolved_root, UnresolvedRootPolicy::Abort);
    }

    #[test]
    fn test_params_hash_deterministic() {
        let a = CarveConfig::with_roots(["f", "g"]);
        let b = CarveConfig::with_roots(["g", "f"]);
        assert_eq!(a.params_hash(), b.params_hash());
        assert_eq!(a.params_hash().len(), 16);
    }

    #[test]
    fn test_params_hash_tracks_changes() {
        let base = CarveConfig::with_roots(["f"]);
        let skip = base.clone().unresolved_root(UnresolvedRootPolicy::Skip);
        let other = CarveConfig::with_roots(["g"]);
        assert_ne!(base.params_hash(), skip.params_hash());
        assert_ne!(base.params_hash(), other.params_hash());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = CarveConfig::from_json(r#"{"roots": ["f"]}"#).unwrap();
        assert_eq!(config.version, DEFAULT_CONFIG_VERSION);
        assert!(config.roots.contains("f"));
        assert_eq!(config.unresolved_root, UnresolvedRootPolicy::Abort);

        let config =
            CarveConfig::from_json(r#"{"default_roots": "main_file_functions"}"#).unwrap();
        assert_eq!(config.default_roots, DefaultRoots::MainFileFunctions);
    }
}
