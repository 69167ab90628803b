// Stream Provider Factory
//
// Name -> instance registry and sole construction point for providers

use super::{AgoraProvider, HundredMsProvider, ProviderError, Result, StreamProvider};
use crate::config::StreamingConfig;
use std::collections::HashMap;
use std::sync::Arc;

/// Provider constructor function type
pub type ProviderBuilder = Box<dyn Fn() -> Arc<dyn StreamProvider> + Send + Sync>;

/// Registry of available stream providers
///
/// Providers are stateless, so each `create_provider` call returns a fresh
/// instance; callers must not assume instance identity across calls. The
/// registry itself is immutable after startup registration.
pub struct StreamProviderFactory {
    builders: HashMap<String, ProviderBuilder>,
}

impl StreamProviderFactory {
    /// Empty registry; new providers are added via [`Self::register`]
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Registry with the built-in providers (Agora, 100ms)
    pub fn with_defaults(config: &StreamingConfig) -> Self {
        let mut factory = Self::new();

        let agora = config.agora.clone();
        factory.register(
            super::agora::PROVIDER_NAME,
            Box::new(move || Arc::new(AgoraProvider::new(agora.clone()))),
        );

        let hundredms = config.hundredms.clone();
        factory.register(
            super::hundredms::PROVIDER_NAME,
            Box::new(move || Arc::new(HundredMsProvider::new(hundredms.clone()))),
        );

        factory
    }

    /// Register a provider builder under a canonical name
    pub fn register(&mut self, name: &str, builder: ProviderBuilder) {
        self.builders.insert(Self::normalize(name), builder);
    }

    /// Create a fresh provider instance by name (case-insensitive)
    pub fn create_provider(&self, name: &str) -> Result<Arc<dyn StreamProvider>> {
        let normalized = Self::normalize(name);
        if normalized.is_empty() {
            return Err(ProviderError::UnknownProvider(name.to_string()));
        }

        self.builders
            .get(&normalized)
            .map(|builder| builder())
            .ok_or_else(|| ProviderError::UnknownProvider(name.to_string()))
    }

    /// Registered canonical provider names, sorted for stable discovery
    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }

    /// Existence check with the same normalization as `create_provider`
    pub fn is_provider_available(&self, name: &str) -> bool {
        self.builders.contains_key(&Self::normalize(name))
    }

    /// Lowercase the name and fold the "hundredms" spelling into the
    /// canonical "100ms"
    fn normalize(name: &str) -> String {
        let lowered = name.trim().to_ascii_lowercase();
        if lowered == "hundredms" {
            "100ms".to_string()
        } else {
            lowered
        }
    }
}

impl Default for StreamProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}
