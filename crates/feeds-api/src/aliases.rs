//! # Alias Resolution
//!
//! Maps addresses to display aliases for feed titles and message issuer
//! names. Falls back to the raw address when no alias is registered.

use parking_lot::RwLock;
use shared_types::Address;
use std::collections::HashMap;

/// Resolves display aliases for addresses.
pub trait AliasProvider: Send + Sync {
    /// The alias registered for `address`, if any.
    fn alias_for(&self, address: &Address) -> Option<String>;

    /// The alias or, when none is registered, the address itself.
    fn alias_or_address(&self, address: &Address) -> String {
        self.alias_for(address)
            .unwrap_or_else(|| address.as_str().to_owned())
    }
}

/// Map-backed alias provider for single-node operation and tests.
#[derive(Default)]
pub struct InMemoryAliasProvider {
    aliases: RwLock<HashMap<Address, String>>,
}

impl InMemoryAliasProvider {
    /// Create an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an alias.
    pub fn register(&self, address: Address, alias: impl Into<String>) {
        self.aliases.write().insert(address, alias.into());
    }
}

impl AliasProvider for InMemoryAliasProvider {
    fn alias_for(&self, address: &Address) -> Option<String> {
        self.aliases.read().get(address).cloned()
    }
}
