//! Environment variable overlays.
//!
//! Groups variables to add with keys to remove, so `--envvars` input can be
//! layered over persisted `setenv` state over manifest-declared defaults.
//! An empty value in the `K=V,K2=` input form marks `K2` for removal.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// An immutable add/remove overlay of environment variables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnvvarCollector {
    map: HashMap<String, String>,
    to_remove: HashSet<String>,
}

impl EnvvarCollector {
    /// Create an overlay from explicit parts.
    pub fn new(map: HashMap<String, String>, to_remove: HashSet<String>) -> Self {
        Self { map, to_remove }
    }

    /// Parse a `K=V,K2=,K3=V3` string. A key with an empty value is a
    /// removal; a token without `=` is ignored.
    pub fn from_str(envvars: Option<&str>) -> Self {
        let Some(envvars) = envvars else {
            return Self::default();
        };

        let mut map = HashMap::new();
        let mut to_remove = HashSet::new();

        for pair in envvars.split(',') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            if let Some((key, value)) = pair.split_once('=') {
                if value.is_empty() {
                    to_remove.insert(key.to_string());
                } else {
                    map.insert(key.to_string(), value.to_string());
                }
            }
        }

        Self { map, to_remove }
    }

    /// Variables to add.
    pub fn map(&self) -> &HashMap<String, String> {
        &self.map
    }

    /// Keys marked for removal.
    pub fn to_remove(&self) -> &HashSet<String> {
        &self.to_remove
    }

    /// Merge with a higher-priority overlay: its values win on key
    /// conflicts and removal sets are unioned.
    pub fn merge(&self, higher_priority: &EnvvarCollector) -> EnvvarCollector {
        let mut map = self.map.clone();
        map.extend(
            higher_priority
                .map
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        let to_remove = self
            .to_remove
            .union(&higher_priority.to_remove)
            .cloned()
            .collect();

        EnvvarCollector::new(map, to_remove)
    }

    /// Drop every variable marked for removal, yielding a clean overlay.
    pub fn filtered(&self) -> EnvvarCollector {
        let map = self
            .map
            .iter()
            .filter(|(k, _)| !self.to_remove.contains(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        EnvvarCollector::new(map, HashSet::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_parses_adds_and_removes() {
        let env = EnvvarCollector::from_str(Some("A=1,B=,C=three"));
        assert_eq!(env.map().get("A").unwrap(), "1");
        assert_eq!(env.map().get("C").unwrap(), "three");
        assert!(env.to_remove().contains("B"));
        assert!(!env.map().contains_key("B"));
    }

    #[test]
    fn test_from_str_none_is_empty() {
        let env = EnvvarCollector::from_str(None);
        assert!(env.map().is_empty());
        assert!(env.to_remove().is_empty());
    }

    #[test]
    fn test_merge_higher_priority_wins() {
        let base = EnvvarCollector::from_str(Some("A=1,B=2"));
        let overlay = EnvvarCollector::from_str(Some("B=override,C="));

        let merged = base.merge(&overlay);
        assert_eq!(merged.map().get("A").unwrap(), "1");
        assert_eq!(merged.map().get("B").unwrap(), "override");
        assert!(merged.to_remove().contains("C"));
    }

    #[test]
    fn test_filtered_drops_removed_keys() {
        let base = EnvvarCollector::from_str(Some("A=1,B=2"));
        let overlay = EnvvarCollector::from_str(Some("B="));

        let merged = base.merge(&overlay).filtered();
        assert_eq!(merged.map().get("A").unwrap(), "1");
        assert!(!merged.map().contains_key("B"));
        assert!(merged.to_remove().is_empty());
    }
}
