//! The ordering orchestrator: drives one run from deficits to cart.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use restock_engine::{DecisionEngine, ModelClient};
use restock_protocols::{
    AdapterError, Deficit, ItemCatalog, ItemOutcome, ItemResult, OrderRunResult, Preference,
    RunFailure, RunStatus, SessionStatus, Storefront,
};

use crate::locks::ProviderLocks;

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

/// Phases an ordering run moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunPhase {
    Resolving,
    Deciding,
    Automating,
}

/// Behavior toggles for a run.
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Empty the provider cart before the first add, so the run starts
    /// from a known state.
    pub clear_cart_first: bool,
    /// Navigate to the cart page once a run has added something, leaving
    /// it on screen for a human to review and pay.
    pub open_cart_after: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            clear_cart_first: false,
            open_cart_after: true,
        }
    }
}

/// Takes a deficit list to a provider cart, one item at a time.
///
/// Items are processed sequentially: every cart mutation happens on a
/// single live page whose state a parallel item would corrupt. One
/// item's failure is recorded and the run moves on; only a missing
/// session fails the run as a whole. Runs against the same provider
/// are serialized by an internal per-provider lock.
pub struct Orchestrator<C> {
    engine: DecisionEngine<C>,
    locks: ProviderLocks,
    options: OrchestratorOptions,
}

impl<C: ModelClient> Orchestrator<C> {
    pub fn new(engine: DecisionEngine<C>) -> Self {
        Self {
            engine,
            locks: ProviderLocks::new(),
            options: OrchestratorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one order against `storefront`.
    ///
    /// The browser session is left open on return: after a successful
    /// run the cart page is showing and checkout belongs to a human.
    /// `cancel` is honored between items, never mid-item: an add that
    /// has started always runs to its verdict so the cart is never left
    /// half-mutated.
    pub async fn place_order(
        &self,
        storefront: &dyn Storefront,
        deficits: &[Deficit],
        preference: &Preference,
        catalog: &ItemCatalog,
        cancel: CancellationToken,
    ) -> OrderRunResult {
        let run_id = Uuid::new_v4().to_string();
        let provider = storefront.id();
        info!(run_id = %run_id, provider = %provider, items = deficits.len(), "Order run starting");

        // Nothing missing is a completed run, not an error.
        if deficits.is_empty() {
            debug!(run_id = %run_id, "No deficits, nothing to order");
            return OrderRunResult {
                run_id,
                provider,
                status: RunStatus::Completed,
                items: Vec::new(),
            };
        }

        let _run_slot = self.locks.acquire(provider).await;
        debug!(run_id = %run_id, phase = ?RunPhase::Resolving, "Provider lock acquired, opening session");

        match storefront.ensure_session().await {
            Ok(SessionStatus::Ready) => {}
            Ok(SessionStatus::NeedsManualLogin) => {
                warn!(run_id = %run_id, provider = %provider, "Session needs manual login, no items attempted");
                return OrderRunResult {
                    run_id,
                    provider,
                    status: RunStatus::Failed(RunFailure::NeedsManualLogin),
                    items: Vec::new(),
                };
            }
            Err(e) => {
                warn!(run_id = %run_id, provider = %provider, error = %e, "Session setup failed");
                return OrderRunResult {
                    run_id,
                    provider,
                    status: RunStatus::Failed(RunFailure::SessionSetup {
                        message: e.to_string(),
                    }),
                    items: Vec::new(),
                };
            }
        }

        if self.options.clear_cart_first {
            // A stale cart only skews what the human reviews; not fatal.
            if let Err(e) = storefront.clear_cart().await {
                warn!(run_id = %run_id, error = %e, "Cart clear failed, continuing with existing cart");
            }
        }

        let mut items = Vec::with_capacity(deficits.len());
        let mut cancelled = false;

        for deficit in deficits {
            if cancel.is_cancelled() {
                info!(
                    run_id = %run_id,
                    attempted = items.len(),
                    requested = deficits.len(),
                    "Run cancelled between items"
                );
                cancelled = true;
                break;
            }
            items.push(
                self.order_item(storefront, deficit, preference, catalog, &run_id)
                    .await,
            );
        }

        let status = if cancelled {
            RunStatus::Aborted
        } else if items
            .iter()
            .all(|item| matches!(item.outcome, ItemOutcome::Added { .. }))
        {
            RunStatus::Completed
        } else {
            RunStatus::PartiallyCompleted
        };

        let result = OrderRunResult {
            run_id,
            provider,
            status,
            items,
        };

        if self.options.open_cart_after && !cancelled && result.added_count() > 0 {
            if let Err(e) = storefront.open_cart().await {
                warn!(run_id = %result.run_id, error = %e, "Could not open the cart for review");
            }
        }

        info!(
            run_id = %result.run_id,
            status = ?result.status,
            added = result.added_count(),
            "Order run finished"
        );
        result
    }

    /// Search, decide, add. Every deficit gets exactly one outcome.
    async fn order_item(
        &self,
        storefront: &dyn Storefront,
        deficit: &Deficit,
        preference: &Preference,
        catalog: &ItemCatalog,
        run_id: &str,
    ) -> ItemResult {
        let query = catalog.search_term(&deficit.item_key);
        debug!(
            run_id = %run_id,
            item = %deficit.item_key,
            phase = ?RunPhase::Deciding,
            query = %query,
            "Searching"
        );

        let candidates = match storefront.search(query).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!(run_id = %run_id, item = %deficit.item_key, error = %e, "Search failed");
                return failed(deficit, &e);
            }
        };

        if candidates.is_empty() {
            info!(run_id = %run_id, item = %deficit.item_key, "No candidates found");
            return ItemResult {
                item_key: deficit.item_key.clone(),
                requested_quantity: deficit.quantity,
                outcome: ItemOutcome::NoCandidates,
            };
        }

        let Some(choice) = self
            .engine
            .choose_product(deficit, &candidates, preference, catalog)
            .await
        else {
            // Unreachable with a non-empty candidate list; recorded
            // rather than panicking so a run can never die here.
            return ItemResult {
                item_key: deficit.item_key.clone(),
                requested_quantity: deficit.quantity,
                outcome: ItemOutcome::NoCandidates,
            };
        };

        debug!(
            run_id = %run_id,
            item = %deficit.item_key,
            phase = ?RunPhase::Automating,
            product = %choice.decision.candidate.title,
            quantity = choice.decision.quantity,
            fallback = choice.fallback,
            "Adding to cart"
        );

        match storefront
            .add_to_cart(&choice.decision.candidate, choice.decision.quantity)
            .await
        {
            Ok(receipt) => ItemResult {
                item_key: deficit.item_key.clone(),
                requested_quantity: deficit.quantity,
                outcome: ItemOutcome::Added {
                    title: receipt.title,
                    quantity: receipt.quantity,
                    fallback_used: choice.fallback,
                },
            },
            Err(e) => {
                warn!(run_id = %run_id, item = %deficit.item_key, error = %e, "Add to cart failed");
                failed(deficit, &e)
            }
        }
    }
}

fn failed(deficit: &Deficit, error: &AdapterError) -> ItemResult {
    ItemResult {
        item_key: deficit.item_key.clone(),
        requested_quantity: deficit.quantity,
        outcome: ItemOutcome::Failed {
            kind: error.failure_kind(),
            message: error.to_string(),
        },
    }
}
