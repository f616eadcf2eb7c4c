//! Registry for looking up OS profiles by name.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;

use super::DEFAULT_PROFILE;
use super::definition::OsProfile;
use super::vendors;
use crate::error::Result;

/// Registry of OS profiles, shared read-only by every session.
#[derive(Debug, Default, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, Arc<OsProfile>>,
}

impl ProfileRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            profiles: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in profiles.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for profile in vendors::all() {
            registry
                .profiles
                .insert(profile.name.clone(), Arc::new(profile));
        }
        registry
    }

    /// Register a profile, replacing any existing one of the same name.
    pub fn register(&mut self, profile: OsProfile) -> Result<()> {
        profile.validate()?;
        if self.profiles.contains_key(&profile.name) {
            debug!("OS profile '{}' overrides an earlier definition", profile.name);
        }
        self.profiles.insert(profile.name.clone(), Arc::new(profile));
        Ok(())
    }

    /// Get a profile by name.
    pub fn get(&self, name: &str) -> Option<Arc<OsProfile>> {
        self.profiles.get(name).cloned()
    }

    /// Get a profile by name, falling back to the `default` profile.
    pub fn resolve(&self, name: &str) -> Arc<OsProfile> {
        self.get(name)
            .or_else(|| self.get(DEFAULT_PROFILE))
            .unwrap_or_else(|| Arc::new(OsProfile::default()))
    }

    /// Check if a profile is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.profiles.contains_key(name)
    }

    /// List all registered profile names.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.profiles.keys()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        let registry = ProfileRegistry::with_builtins();
        for name in ["default", "ios", "nxos", "eos", "junos", "sros"] {
            assert!(registry.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let registry = ProfileRegistry::with_builtins();
        let profile = registry.resolve("unknown-os");
        assert_eq!(profile.name, "default");
        assert!(!profile.is_interactive());

        let empty = ProfileRegistry::new();
        assert_eq!(empty.resolve("ios").show_running, "show running-config");
    }

    #[test]
    fn test_register_overrides_builtin() {
        let mut registry = ProfileRegistry::with_builtins();
        registry
            .register(OsProfile::new("ios").with_show_running("show startup-config"))
            .unwrap();
        let ios = registry.get("ios").unwrap();
        assert_eq!(ios.show_running, "show startup-config");
        assert!(!ios.is_interactive());
    }

    #[test]
    fn test_register_rejects_invalid() {
        let mut registry = ProfileRegistry::new();
        assert!(registry.register(OsProfile::new("bad").with_show_running("")).is_err());
        assert!(!registry.contains("bad"));
    }
}
