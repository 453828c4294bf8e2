//! Provider registry
//!
//! Maps provider selector names to factories, so the provider is chosen
//! once at startup by name instead of a hardcoded if-else chain.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use siip_core::ProviderRegistry;
//!
//! let registry = ProviderRegistry::new();
//! siip_provider_route53::register(&registry);
//! siip_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&config)?;
//! ```

use crate::config::Config;
use crate::error::{Error, Result};
use crate::traits::{DnsProvider, DnsProviderFactory};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Provider registry for name-based DNS provider creation
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories, keyed by lowercase name
    providers: RwLock<BTreeMap<String, Box<dyn DnsProviderFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider selector (e.g., "aws", "cloudflare"); case-insensitive
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let name = name.into().to_lowercase();
        let mut providers = self
            .providers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.insert(name, factory);
    }

    /// Create the DNS provider selected by `config.provider`
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error::Config)`: If the provider is not registered or creation fails
    pub fn create_provider(&self, config: &Config) -> Result<Box<dyn DnsProvider>> {
        let key = config.provider_key();
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let factory = providers.get(&key).ok_or_else(|| {
            let available: Vec<&str> = providers.keys().map(String::as_str).collect();
            Error::config(format!(
                "Provider '{}' not supported. Available providers: {}",
                config.provider,
                available.join(", ")
            ))
        })?;

        factory.create(config)
    }

    /// List all registered provider names, sorted
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.keys().cloned().collect()
    }

    /// Check if a provider name is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self
            .providers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        providers.contains_key(&name.to_lowercase())
    }
}
