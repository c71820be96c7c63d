//! Position definition resolution engine.
//!
//! The engine discovers every position and token definition reachable from
//! an initial adapter-provided set, resolving intermediary app tokens to a
//! fixed point, then evaluates each definition's valuation function in
//! dependency order to produce fully resolved positions with USD pricing
//! propagated through nested token compositions.
//!
//! Resolution-scoped state (visited definitions, resolved tokens) is owned
//! per request; nothing is shared across concurrent requests.

mod valuation;

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::Address;
use eyre::{eyre, Result, WrapErr};
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::chain::ChainReader;
use crate::error::HookError;
use crate::hooks::{HookRegistry, PositionsHook};
use crate::networks::{token_id, NetworkId};
use crate::numbers::DecimalNumber;
use crate::positions::{BaseToken, Position, PositionDefinition, Token, TokenDefinition};
use crate::tokens_info::{TokenInfo, TokenInfoSource, TokensByAddress};

use valuation::{resolve_app_token_position, resolve_contract_position};

/// A position definition tagged with its originating app id.
struct AppPositionDefinition {
    app_id: String,
    definition: PositionDefinition,
}

impl AppPositionDefinition {
    fn address(&self) -> &str {
        self.definition.address()
    }

    fn is_app_token(&self) -> bool {
        matches!(self.definition, PositionDefinition::AppToken(_))
    }
}

/// Outcome of resolving one unknown token reference.
enum ResolvedTokenDefinition {
    /// The source hook recognized it as one of its app tokens.
    AppToken(AppPositionDefinition),
    /// Not an app token; re-classified as an unlisted base ERC20.
    UnlistedBase(TokenInfo),
}

/// Resolves positions for an address across all enabled app hooks.
pub struct PositionResolver {
    registry: HookRegistry,
    chain: Arc<dyn ChainReader>,
    token_info: Arc<dyn TokenInfoSource>,
}

impl PositionResolver {
    pub fn new(
        registry: HookRegistry,
        chain: Arc<dyn ChainReader>,
        token_info: Arc<dyn TokenInfoSource>,
    ) -> Self {
        Self {
            registry,
            chain,
            token_info,
        }
    }

    /// Produce fully resolved positions for `address` on `network_id`,
    /// one per initially-discovered definition, in discovery order.
    ///
    /// `address: None` requests network-wide, non-address-specific
    /// positions. `app_ids` filters the enabled hooks; empty enables all.
    ///
    /// A failing hook contributes zero definitions; a token that turns out
    /// not to be an app token falls back to a generic ERC20 read. Any
    /// other resolution failure aborts the whole request - partial token
    /// metadata would produce silently wrong USD valuations.
    pub async fn get_positions(
        &self,
        network_id: NetworkId,
        address: Option<Address>,
        app_ids: &[String],
    ) -> Result<Vec<Position>> {
        let hooks = self.registry.enabled(app_ids);
        let hooks_by_id: HashMap<String, Arc<dyn PositionsHook>> = hooks.iter().cloned().collect();

        // Step 1-2: query every enabled hook concurrently; tag each
        // definition with its app id. Per-hook failures are logged and
        // contribute nothing, so one broken adapter can't take down the
        // whole request.
        let definitions = self
            .fetch_definitions(&hooks, network_id, address)
            .await;
        info!(
            network_id = %network_id,
            definitions = definitions.len(),
            "discovered position definitions"
        );

        // Addresses in discovery order, pre-dedup: the final output maps
        // this list (duplicates included) to resolved positions.
        let initial_addresses: Vec<String> = definitions
            .iter()
            .map(|d| d.address().to_lowercase())
            .collect();

        // Step 3: bulk base-token metadata, keyed by lowercased address.
        let base_tokens_info = self.token_info.get_base_tokens_info().await?;

        // Steps 4a-4f: fixed-point discovery loop.
        let (mut visited, unlisted_tokens_info) = self
            .resolve_to_fixed_point(network_id, definitions, &base_tokens_info, &hooks_by_id)
            .await?;

        // Step 5: every visited app token still needs at least minimal
        // display metadata (symbol/decimals) even when unlisted.
        let app_tokens_info = self
            .fetch_missing_app_token_info(&visited, &base_tokens_info, &unlisted_tokens_info)
            .await?;

        // Step 6: merged metadata map, plus the resolved-token map seeded
        // with every base/unlisted token.
        let mut tokens_by_address = base_tokens_info.clone();
        tokens_by_address.extend(unlisted_tokens_info.clone());
        tokens_by_address.extend(app_tokens_info);

        let mut resolved_tokens: HashMap<String, Token> = HashMap::new();
        for (addr, info) in base_tokens_info.into_iter().chain(unlisted_tokens_info) {
            resolved_tokens.insert(
                addr,
                Token::Base(BaseToken {
                    network_id: info.network_id,
                    token_id: token_id(info.network_id, Some(&info.address), false),
                    address: info.address,
                    symbol: info.symbol,
                    decimals: info.decimals,
                    price_usd: info.price_usd,
                    balance: DecimalNumber::zero(),
                    category: None,
                }),
            );
        }

        // Step 7: two-tier evaluation order - app tokens first, since they
        // may be referenced as underlying tokens of later positions. The
        // sort is stable, so ties keep discovery order. Within the app
        // token tier this relies on app tokens not depending on app tokens
        // discovered after them; see resolve_to_fixed_point.
        visited.sort_by_key(|d| !d.is_app_token());

        let mut resolved_positions: HashMap<String, Position> = HashMap::new();
        for entry in &visited {
            let hook = hooks_by_id
                .get(&entry.app_id)
                .ok_or_else(|| eyre!("no enabled hook for app '{}'", entry.app_id))?;
            let app_info = hook.get_info();

            debug!(
                app_id = %entry.app_id,
                address = %entry.address(),
                "resolving definition"
            );

            match &entry.definition {
                PositionDefinition::AppToken(definition) => {
                    let position = resolve_app_token_position(
                        address,
                        definition,
                        &entry.app_id,
                        &app_info,
                        &tokens_by_address,
                        &resolved_tokens,
                        self.chain.as_ref(),
                    )
                    .await?;
                    // Later positions may reference this app token as an
                    // underlying token with a balance.
                    resolved_tokens
                        .insert(definition.address.clone(), Token::App(position.clone()));
                    resolved_positions
                        .insert(definition.address.clone(), Position::AppToken(position));
                }
                PositionDefinition::ContractPosition(definition) => {
                    // Contract positions are not valid underlying tokens
                    // of other positions; final output only.
                    let position = resolve_contract_position(
                        definition,
                        &entry.app_id,
                        &app_info,
                        &resolved_tokens,
                    )
                    .await?;
                    resolved_positions.insert(
                        definition.address.clone(),
                        Position::ContractPosition(position),
                    );
                }
            }
        }

        // Step 8: map the original discovery list back to positions. A
        // miss here is an internal consistency bug, not a user error.
        initial_addresses
            .into_iter()
            .map(|addr| {
                resolved_positions
                    .get(&addr)
                    .cloned()
                    .ok_or_else(|| eyre!("could not resolve position definition at {addr}"))
            })
            .collect()
    }

    async fn fetch_definitions(
        &self,
        hooks: &[(String, Arc<dyn PositionsHook>)],
        network_id: NetworkId,
        address: Option<Address>,
    ) -> Vec<AppPositionDefinition> {
        let fetches = hooks.iter().map(|(app_id, hook)| {
            let app_id = app_id.clone();
            let hook = Arc::clone(hook);
            async move {
                match hook.get_position_definitions(network_id, address).await {
                    // Addresses are lookup keys from here on; normalize
                    // casing once at ingestion.
                    Ok(definitions) => definitions
                        .into_iter()
                        .map(|definition| AppPositionDefinition {
                            app_id: app_id.clone(),
                            definition: definition.into_normalized(),
                        })
                        .collect(),
                    Err(err) => {
                        // A failing adapter contributes zero definitions
                        // rather than aborting the whole request.
                        error!(
                            app_id = %app_id,
                            network_id = %network_id,
                            error = %err,
                            "failed to get position definitions"
                        );
                        Vec::new()
                    }
                }
            }
        });
        join_all(fetches).await.into_iter().flatten().collect()
    }

    /// The fixed-point loop: visit each round's frontier, collect its
    /// unknown token references, resolve them through their source hooks
    /// (or fall back to generic ERC20 metadata), and feed newly obtained
    /// app-token definitions into the next round. Terminates when a round
    /// discovers nothing new.
    ///
    /// First visit wins, keyed by address alone: if two apps contribute a
    /// definition at the same address, only the first-discovered one is
    /// retained.
    async fn resolve_to_fixed_point(
        &self,
        network_id: NetworkId,
        definitions: Vec<AppPositionDefinition>,
        base_tokens_info: &TokensByAddress,
        hooks_by_id: &HashMap<String, Arc<dyn PositionsHook>>,
    ) -> Result<(Vec<AppPositionDefinition>, TokensByAddress)> {
        let mut visited: Vec<AppPositionDefinition> = Vec::new();
        let mut visited_addresses: HashSet<String> = HashSet::new();
        let mut unlisted_tokens_info = TokensByAddress::new();
        let mut frontier = definitions;

        loop {
            let round_start = visited.len();
            for definition in frontier {
                if visited_addresses.insert(definition.address().to_lowercase()) {
                    visited.push(definition);
                }
            }
            let fresh = &visited[round_start..];
            if fresh.is_empty() {
                debug!("no more positions to resolve");
                break;
            }

            // Token references named by this round's definitions, each
            // tagged with the app id of the defining position so we know
            // which hook can resolve it.
            let token_definitions: Vec<(TokenDefinition, String)> = fresh
                .iter()
                .flat_map(|entry| {
                    entry
                        .definition
                        .tokens()
                        .iter()
                        .map(|token| (token.clone(), entry.app_id.clone()))
                        .collect::<Vec<_>>()
                })
                .collect();
            debug!(tokens = token_definitions.len(), "collected token references");

            let unresolved: Vec<(TokenDefinition, String)> = token_definitions
                .into_iter()
                .filter(|(token, _)| {
                    !base_tokens_info.contains_key(&token.address)
                        && !unlisted_tokens_info.contains_key(&token.address)
                        && !visited_addresses.contains(&token.address)
                })
                .collect();
            debug!(unresolved = unresolved.len(), "unresolved token references");

            let resolutions = join_all(unresolved.into_iter().map(|(token, source_app_id)| {
                self.resolve_token_definition(token, source_app_id, hooks_by_id)
            }))
            .await;

            let mut next_frontier = Vec::new();
            for resolution in resolutions {
                match resolution? {
                    ResolvedTokenDefinition::AppToken(definition) => {
                        next_frontier.push(definition)
                    }
                    ResolvedTokenDefinition::UnlistedBase(info) => {
                        unlisted_tokens_info.insert(info.address.clone(), info);
                    }
                }
            }
            frontier = next_frontier;
        }

        info!(
            network_id = %network_id,
            visited = visited.len(),
            unlisted = unlisted_tokens_info.len(),
            "reached resolution fixed point"
        );
        Ok((visited, unlisted_tokens_info))
    }

    /// Resolve one unknown token reference through its source hook.
    ///
    /// A hook without the app-token resolution capability is a fatal
    /// configuration error: it produced a definition referencing a token
    /// nobody can explain. A recognized-but-not-an-app-token answer falls
    /// back to a generic ERC20 read; any other failure propagates.
    async fn resolve_token_definition(
        &self,
        token: TokenDefinition,
        source_app_id: String,
        hooks_by_id: &HashMap<String, Arc<dyn PositionsHook>>,
    ) -> Result<ResolvedTokenDefinition> {
        let hook = hooks_by_id
            .get(&source_app_id)
            .ok_or_else(|| eyre!("no enabled hook for app '{source_app_id}'"))?;

        let resolver = hook.app_token_resolver().ok_or_else(|| {
            eyre!(
                "positions hook for app '{source_app_id}' does not implement \
                 get_app_token_definition; implement it to resolve the intermediary \
                 app token {} ({})",
                token.address,
                token.network_id
            )
        })?;

        match resolver.get_app_token_definition(&token).await {
            Ok(definition) => Ok(ResolvedTokenDefinition::AppToken(AppPositionDefinition {
                app_id: source_app_id,
                definition: PositionDefinition::AppToken(definition).into_normalized(),
            })),
            Err(HookError::UnknownAppToken { .. }) => {
                warn!(
                    app_id = %source_app_id,
                    address = %token.address,
                    network_id = %token.network_id,
                    "not a recognized app token, falling back to generic ERC20"
                );
                let contract = Address::from_str(&token.address)
                    .wrap_err_with(|| format!("invalid token address: {}", token.address))?;
                let mut info = self
                    .chain
                    .erc20_token_info(token.network_id, contract)
                    .await?;
                if let Some(fallback_price) = token.fallback_price_usd {
                    info.price_usd = fallback_price;
                }
                Ok(ResolvedTokenDefinition::UnlistedBase(info))
            }
            Err(HookError::Other(report)) => Err(report.wrap_err(format!(
                "failed to resolve app token {} ({}) via '{source_app_id}'",
                token.address, token.network_id
            ))),
        }
    }

    /// Generic symbol/decimals for every visited app token the metadata
    /// sources don't know, so each has at least minimal display metadata.
    async fn fetch_missing_app_token_info(
        &self,
        visited: &[AppPositionDefinition],
        base_tokens_info: &TokensByAddress,
        unlisted_tokens_info: &TokensByAddress,
    ) -> Result<TokensByAddress> {
        let missing: Vec<(NetworkId, String)> = visited
            .iter()
            .filter(|entry| entry.is_app_token())
            .map(|entry| (entry.definition.network_id(), entry.address().to_string()))
            .filter(|(_, addr)| {
                !base_tokens_info.contains_key(addr) && !unlisted_tokens_info.contains_key(addr)
            })
            .collect();

        let fetched = join_all(missing.into_iter().map(|(network_id, addr)| {
            let chain = Arc::clone(&self.chain);
            async move {
                let contract = Address::from_str(&addr)
                    .wrap_err_with(|| format!("invalid app token address: {addr}"))?;
                let info = chain.erc20_token_info(network_id, contract).await?;
                Ok::<TokenInfo, eyre::Report>(info)
            }
        }))
        .await;

        let mut tokens = TokensByAddress::new();
        for info in fetched {
            let info = info?;
            tokens.insert(info.address.clone(), info);
        }
        Ok(tokens)
    }
}
