//! App adapter hooks and the hook registry.
//!
//! Each DeFi protocol is integrated through a [`PositionsHook`]: it lists
//! position definitions for an address and, when the protocol issues
//! intermediary app tokens (LP tokens inside farms, etc.), resolves a bare
//! token reference into an app-token definition. The latter capability is
//! optional and modeled as an explicit `Option` accessor - the engine
//! treats a missing resolver as a fatal configuration error when one is
//! needed.

use std::sync::Arc;

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Serialize;

use crate::error::HookError;
use crate::networks::NetworkId;
use crate::positions::{AppTokenDefinition, PositionDefinition, TokenDefinition};

/// Generic info about an app.
#[derive(Debug, Clone, Serialize)]
pub struct AppInfo {
    /// Example: "ubeswap"
    pub id: String,
    /// Example: "Ubeswap"
    pub name: String,
    /// Example: "Decentralized exchange on Celo"
    pub description: String,
}

/// Optional capability: resolve a bare token reference into an app-token
/// definition, for protocols whose positions nest intermediary app tokens.
#[async_trait]
pub trait AppTokenResolver: Send + Sync {
    /// Returns [`HookError::UnknownAppToken`] when the address is not one
    /// of the app's tokens; the engine then falls back to a generic ERC20
    /// read instead of failing the request.
    async fn get_app_token_definition(
        &self,
        definition: &TokenDefinition,
    ) -> Result<AppTokenDefinition, HookError>;
}

/// Interface implemented by every per-protocol adapter.
#[async_trait]
pub trait PositionsHook: Send + Sync {
    fn get_info(&self) -> AppInfo;

    /// Position definitions for an address. `None` requests network-wide,
    /// non-address-specific positions.
    async fn get_position_definitions(
        &self,
        network_id: NetworkId,
        address: Option<Address>,
    ) -> eyre::Result<Vec<PositionDefinition>>;

    /// The optional app-token resolution capability, `None` by default.
    fn app_token_resolver(&self) -> Option<&dyn AppTokenResolver> {
        None
    }
}

/// Runtime registry mapping app ids to their hooks.
///
/// Registration order is preserved; it determines the order definitions
/// are discovered in, and with it which definition wins when two apps
/// produce one at the same address.
#[derive(Default, Clone)]
pub struct HookRegistry {
    hooks: Vec<(String, Arc<dyn PositionsHook>)>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn PositionsHook>) {
        let id = hook.get_info().id;
        self.hooks.push((id, hook));
    }

    pub fn get(&self, app_id: &str) -> Option<&Arc<dyn PositionsHook>> {
        self.hooks
            .iter()
            .find(|(id, _)| id == app_id)
            .map(|(_, hook)| hook)
    }

    /// Hooks for the requested app ids, in registration order. An empty
    /// request enables every registered hook.
    pub fn enabled(&self, app_ids: &[String]) -> Vec<(String, Arc<dyn PositionsHook>)> {
        self.hooks
            .iter()
            .filter(|(id, _)| app_ids.is_empty() || app_ids.iter().any(|a| a == id))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NullHook {
        id: &'static str,
    }

    #[async_trait]
    impl PositionsHook for NullHook {
        fn get_info(&self) -> AppInfo {
            AppInfo {
                id: self.id.to_string(),
                name: self.id.to_string(),
                description: String::new(),
            }
        }

        async fn get_position_definitions(
            &self,
            _network_id: NetworkId,
            _address: Option<Address>,
        ) -> eyre::Result<Vec<PositionDefinition>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_registry_preserves_registration_order() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(NullHook { id: "beta" }));
        registry.register(Arc::new(NullHook { id: "alpha" }));

        let enabled = registry.enabled(&[]);
        let ids: Vec<_> = enabled.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["beta", "alpha"]);
    }

    #[test]
    fn test_registry_filters_enabled_apps() {
        let mut registry = HookRegistry::new();
        registry.register(Arc::new(NullHook { id: "beta" }));
        registry.register(Arc::new(NullHook { id: "alpha" }));

        let enabled = registry.enabled(&["alpha".to_string()]);
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].0, "alpha");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_app_token_resolver_defaults_to_none() {
        let hook = NullHook { id: "plain" };
        assert!(hook.app_token_resolver().is_none());
    }
}
