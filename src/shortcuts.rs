//! Shortcuts: protocol-specific transaction builders.
//!
//! A shortcut produces unsigned transactions (claim, deposit, withdraw)
//! for a client wallet to sign. The engine only carries the definitions
//! and dispatches triggers; it never encodes protocol calldata, submits
//! or signs anything.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, Bytes};
use eyre::{eyre, Result};
use futures::future::BoxFuture;
use serde::Serialize;

use crate::networks::NetworkId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShortcutCategory {
    Claim,
}

/// An unsigned transaction for the client wallet to sign.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub network_id: NetworkId,
    pub from: Address,
    pub to: Address,
    pub data: Bytes,
}

/// Trigger signature: (network, user address, position address) to the
/// transactions the user must sign (zero or more).
pub type TriggerFn = Box<
    dyn Fn(NetworkId, Address, Address) -> BoxFuture<'static, Result<Vec<Transaction>>>
        + Send
        + Sync,
>;

pub struct ShortcutDefinition {
    /// Example: "claim-reward"
    pub id: String,
    /// Example: "Claim"
    pub name: String,
    /// Example: "Claim your reward"
    pub description: String,
    pub networks: Vec<NetworkId>,
    pub category: Option<ShortcutCategory>,
    pub on_trigger: TriggerFn,
}

impl fmt::Debug for ShortcutDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShortcutDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("networks", &self.networks)
            .finish_non_exhaustive()
    }
}

/// Serializable shortcut listing (everything minus the trigger).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortcutInfo {
    pub app_id: String,
    pub id: String,
    pub name: String,
    pub description: String,
    pub networks: Vec<NetworkId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ShortcutCategory>,
}

/// Per-protocol shortcut provider.
pub trait ShortcutsHook: Send + Sync {
    fn app_id(&self) -> String;
    fn get_shortcut_definitions(&self) -> Vec<ShortcutDefinition>;
}

/// Registry of shortcut hooks by app id, in registration order.
#[derive(Default, Clone)]
pub struct ShortcutRegistry {
    hooks: Vec<(String, Arc<dyn ShortcutsHook>)>,
}

impl ShortcutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn ShortcutsHook>) {
        let id = hook.app_id();
        self.hooks.push((id, hook));
    }

    /// Listing of available shortcuts for the requested apps (all apps
    /// when the filter is empty).
    pub fn get_shortcuts(&self, app_ids: &[String]) -> Vec<ShortcutInfo> {
        self.hooks
            .iter()
            .filter(|(id, _)| app_ids.is_empty() || app_ids.iter().any(|a| a == id))
            .flat_map(|(app_id, hook)| {
                hook.get_shortcut_definitions()
                    .into_iter()
                    .map(|definition| ShortcutInfo {
                        app_id: app_id.clone(),
                        id: definition.id,
                        name: definition.name,
                        description: definition.description,
                        networks: definition.networks,
                        category: definition.category,
                    })
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Run a shortcut's trigger and return the unsigned transactions.
    pub async fn trigger(
        &self,
        app_id: &str,
        shortcut_id: &str,
        network_id: NetworkId,
        address: Address,
        position_address: Address,
    ) -> Result<Vec<Transaction>> {
        let (_, hook) = self
            .hooks
            .iter()
            .find(|(id, _)| id == app_id)
            .ok_or_else(|| eyre!("no shortcuts registered for app '{app_id}'"))?;
        let definition = hook
            .get_shortcut_definitions()
            .into_iter()
            .find(|d| d.id == shortcut_id)
            .ok_or_else(|| eyre!("app '{app_id}' has no shortcut '{shortcut_id}'"))?;
        if !definition.networks.contains(&network_id) {
            return Err(eyre!(
                "shortcut '{shortcut_id}' is not available on {network_id}"
            ));
        }
        (definition.on_trigger)(network_id, address, position_address).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use futures::FutureExt;

    struct ClaimHook;

    impl ShortcutsHook for ClaimHook {
        fn app_id(&self) -> String {
            "farm".to_string()
        }

        fn get_shortcut_definitions(&self) -> Vec<ShortcutDefinition> {
            vec![ShortcutDefinition {
                id: "claim-reward".to_string(),
                name: "Claim".to_string(),
                description: "Claim your reward".to_string(),
                networks: vec![NetworkId::CeloMainnet],
                category: Some(ShortcutCategory::Claim),
                on_trigger: Box::new(|network_id, from, to| {
                    async move {
                        Ok(vec![Transaction {
                            network_id,
                            from,
                            to,
                            data: Bytes::from_static(&[0xab, 0xcd]),
                        }])
                    }
                    .boxed()
                }),
            }]
        }
    }

    #[test]
    fn test_get_shortcuts_listing() {
        let mut registry = ShortcutRegistry::new();
        registry.register(Arc::new(ClaimHook));

        let shortcuts = registry.get_shortcuts(&[]);
        assert_eq!(shortcuts.len(), 1);
        assert_eq!(shortcuts[0].app_id, "farm");
        assert_eq!(shortcuts[0].id, "claim-reward");

        assert!(registry.get_shortcuts(&["other".to_string()]).is_empty());
    }

    #[tokio::test]
    async fn test_trigger_produces_unsigned_transactions() {
        let mut registry = ShortcutRegistry::new();
        registry.register(Arc::new(ClaimHook));

        let user = address!("1111111111111111111111111111111111111111");
        let position = address!("2222222222222222222222222222222222222222");
        let txs = registry
            .trigger("farm", "claim-reward", NetworkId::CeloMainnet, user, position)
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].from, user);

        let err = registry
            .trigger("farm", "claim-reward", NetworkId::OpMainnet, user, position)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not available"));
    }
}
