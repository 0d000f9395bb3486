//! Tree providers
//!
//! A provider turns raw document text into a [`TreeValue`]. The query engine
//! does not care which decoder produced a tree, but plans are cached per
//! provider so different backends never share cache entries.

use crate::error::{Error, Result};
use crate::value::TreeValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Name of the provider used when a request does not pick one
pub const DEFAULT_PROVIDER: &str = "standard";

/// Decodes document text into a tree
pub trait TreeProvider: Send + Sync {
    /// Stable name used in requests and cache keys
    fn name(&self) -> &str;

    /// Decode `text` into a tree
    fn parse(&self, text: &str) -> Result<TreeValue>;
}

/// Decodes through an intermediate `serde_json::Value`
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardJsonProvider;

impl TreeProvider for StandardJsonProvider {
    fn name(&self) -> &str {
        DEFAULT_PROVIDER
    }

    fn parse(&self, text: &str) -> Result<TreeValue> {
        if text.trim().is_empty() {
            return Err(Error::TreeParse("input document is empty".to_string()));
        }
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(TreeValue::from(value))
    }
}

/// Deserializes straight into [`TreeValue`] with no intermediate value
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectJsonProvider;

impl TreeProvider for DirectJsonProvider {
    fn name(&self) -> &str {
        "direct"
    }

    fn parse(&self, text: &str) -> Result<TreeValue> {
        if text.trim().is_empty() {
            return Err(Error::TreeParse("input document is empty".to_string()));
        }
        Ok(serde_json::from_str(text)?)
    }
}

/// Named set of providers
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: BTreeMap<String, Arc<dyn TreeProvider>>,
}

impl ProviderRegistry {
    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            providers: BTreeMap::new(),
        }
    }

    /// Create a registry holding the bundled JSON providers
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(StandardJsonProvider));
        registry.register(Arc::new(DirectJsonProvider));
        registry
    }

    /// Add or replace a provider under its own name
    pub fn register(&mut self, provider: Arc<dyn TreeProvider>) {
        debug!("Registered tree provider {}", provider.name());
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Look up a provider by name
    pub fn get(&self, name: &str) -> Result<Arc<dyn TreeProvider>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownProvider(name.to_string()))
    }

    /// Names of all registered providers, sorted
    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }

    /// Iterate over the registered providers in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn TreeProvider>)> {
        self.providers
            .iter()
            .map(|(name, provider)| (name.as_str(), provider))
    }

    /// Number of registered providers
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_providers_agree() {
        let text = r#"{"a":{"b":[10,20,30]},"c":"x"}"#;
        let standard = StandardJsonProvider.parse(text).unwrap();
        let direct = DirectJsonProvider.parse(text).unwrap();
        assert_eq!(standard, direct);
    }

    #[test]
    fn test_invalid_document() {
        let err = StandardJsonProvider.parse("{\"a\":").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Document);

        let err = DirectJsonProvider.parse("   ").unwrap_err();
        assert_eq!(err, Error::TreeParse("input document is empty".to_string()));
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProviderRegistry::new();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), vec!["direct".to_string(), "standard".to_string()]);
        assert_eq!(registry.get(DEFAULT_PROVIDER).unwrap().name(), "standard");
        for (name, provider) in registry.iter() {
            assert_eq!(provider.name(), name);
        }
        assert_eq!(
            registry.get("fastjson").err(),
            Some(Error::UnknownProvider("fastjson".to_string()))
        );
    }

    #[test]
    fn test_registry_custom_provider() {
        struct Constant;
        impl TreeProvider for Constant {
            fn name(&self) -> &str {
                "constant"
            }
            fn parse(&self, _text: &str) -> Result<TreeValue> {
                Ok(TreeValue::Bool(true))
            }
        }

        let mut registry = ProviderRegistry::empty();
        assert!(registry.is_empty());
        registry.register(Arc::new(Constant));
        let tree = registry.get("constant").unwrap().parse("anything").unwrap();
        assert_eq!(tree, TreeValue::Bool(true));
    }
}
