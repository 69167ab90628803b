//! Stream Adapter Factory
//!
//! Resolves a provider name to an adapter. Unlike the backend factory this
//! one falls back to Agora on an unknown name: a stale provider string from
//! the server must not take a booth page down.

use super::agora::AgoraAdapter;
use super::engine::RtcEngine;
use super::error::{AdapterError, Result};
use super::hundredms::HundredMsAdapter;
use super::traits::StreamAdapter;
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_PROVIDER: &str = "agora";

/// Builds an adapter around the engine the embedder supplies
pub type AdapterBuilder = Box<dyn Fn(Arc<dyn RtcEngine>) -> Arc<dyn StreamAdapter> + Send + Sync>;

pub struct StreamAdapterFactory {
    builders: HashMap<String, AdapterBuilder>,
}

impl StreamAdapterFactory {
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// Factory with both stock adapters registered
    pub fn with_defaults() -> Self {
        let mut factory = Self::new();
        factory.register("agora", Box::new(|engine| Arc::new(AgoraAdapter::new(engine))));
        factory.register(
            "100ms",
            Box::new(|engine| Arc::new(HundredMsAdapter::new(engine))),
        );
        factory
    }

    pub fn register(&mut self, name: &str, builder: AdapterBuilder) {
        self.builders.insert(normalize(name), builder);
    }

    /// Create an adapter for the named provider, defaulting to Agora when the
    /// name is not recognized.
    pub fn create_adapter(
        &self,
        provider: &str,
        engine: Arc<dyn RtcEngine>,
    ) -> Result<Arc<dyn StreamAdapter>> {
        let name = normalize(provider);
        if let Some(builder) = self.builders.get(&name) {
            return Ok(builder(engine));
        }

        tracing::warn!(provider = %provider, "unknown provider, falling back to {DEFAULT_PROVIDER}");
        self.builders
            .get(DEFAULT_PROVIDER)
            .map(|builder| builder(engine))
            .ok_or_else(|| AdapterError::UnknownProvider(provider.to_string()))
    }

    pub fn is_provider_available(&self, provider: &str) -> bool {
        self.builders.contains_key(&normalize(provider))
    }

    pub fn available_providers(&self) -> Vec<String> {
        let mut names: Vec<String> = self.builders.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for StreamAdapterFactory {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn normalize(name: &str) -> String {
    let name = name.trim().to_lowercase();
    match name.as_str() {
        "hundredms" => "100ms".to_string(),
        _ => name,
    }
}
