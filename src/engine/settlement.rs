// Settlement engine: one-time resolution of a market, converting its pools
// into proportional payouts for the winning orders.

use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::models::Market;
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Market not found")]
    MarketNotFound,
    #[error("Market already resolved")]
    AlreadyResolved,
    #[error("Invalid outcome: {0}")]
    InvalidOutcome(String),
}

/// One winning order's credit.
#[derive(Debug, Clone, PartialEq)]
pub struct Payout {
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub amount: u64,
}

/// Outcome of a resolution, including the rounding remainder the house
/// retains so the books can be reconciled later.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementReport {
    pub market: Market,
    pub total_pool: u64,
    pub winning_pool: u64,
    /// Sum of all payouts actually credited.
    pub distributed: u64,
    /// total_pool - distributed: floor rounding loss plus, in the degenerate
    /// empty-winning-pool case, the whole pool.
    pub retained: u64,
    pub payouts: Vec<Payout>,
    /// Orders whose user credit or payout write failed and needs a manual
    /// retry. The market is RESOLVED regardless.
    pub failed_orders: u64,
}

/// Resolve a market: flip it RESOLVED (the barrier against late stakes and
/// double resolution), then pay every winning order its floor pool share.
///
/// Per-order failures are logged and skipped; a partial resolution with
/// some users pending-on-retry beats a stuck one, because the RESOLVED flip
/// cannot be replayed.
pub fn resolve_market(
    store: &LedgerStore,
    market_id: Uuid,
    winning_outcome: &str,
) -> Result<SettlementReport, ResolveError> {
    // Happens-before the payout loop: after this write no new stake can be
    // accepted and no second resolution can start.
    let market = store
        .resolve_if_open(market_id, winning_outcome)
        .map_err(|e| match e {
            StoreError::MarketNotFound => ResolveError::MarketNotFound,
            StoreError::AlreadyResolved => ResolveError::AlreadyResolved,
            StoreError::UnknownOutcome(o) => ResolveError::InvalidOutcome(o),
            _ => ResolveError::MarketNotFound,
        })?;

    let total_pool = market.total_pool();
    let winning_pool = *market.outcome_pools.get(winning_outcome).unwrap_or(&0);

    // Nobody staked the winner: no payouts, the house keeps the pool. An
    // accepted outcome, not an error.
    if winning_pool == 0 {
        info!(
            market = %market_id,
            winning_outcome,
            total_pool,
            "resolved with empty winning pool; full pool retained"
        );
        return Ok(SettlementReport {
            market,
            total_pool,
            winning_pool,
            distributed: 0,
            retained: total_pool,
            payouts: Vec::new(),
            failed_orders: 0,
        });
    }

    let winning_orders = store.orders_for_market_outcome(market_id, winning_outcome);

    let mut distributed: u64 = 0;
    let mut payouts = Vec::with_capacity(winning_orders.len());
    let mut failed_orders: u64 = 0;

    for order in &winning_orders {
        // floor(amount / winning_pool * total_pool), computed in u128 so
        // large pools cannot overflow. The floor's under-distribution is
        // kept as-is for reproducibility.
        let payout = (order.amount as u128 * total_pool as u128 / winning_pool as u128) as u64;

        if let Err(e) = store.credit(order.user_id, payout) {
            error!(
                order = %order.id,
                user = %order.user_id,
                payout,
                error = %e,
                "payout credit failed; order left pending for manual retry"
            );
            failed_orders += 1;
            continue;
        }
        distributed += payout;
        payouts.push(Payout {
            order_id: order.id,
            user_id: order.user_id,
            amount: payout,
        });

        if let Err(e) = store.set_order_payout(order.id, payout) {
            // User was paid; only the order record is stale.
            error!(
                order = %order.id,
                payout,
                error = %e,
                "payout recorded on user but not on order"
            );
        }
    }

    let retained = total_pool - distributed;
    if failed_orders > 0 {
        warn!(
            market = %market_id,
            failed_orders,
            "resolution completed with pending payouts"
        );
    }
    info!(
        market = %market_id,
        winning_outcome,
        total_pool,
        winning_pool,
        distributed,
        retained,
        winners = payouts.len(),
        "market resolved"
    );

    Ok(SettlementReport {
        market,
        total_pool,
        winning_pool,
        distributed,
        retained,
        payouts,
        failed_orders,
    })
}
