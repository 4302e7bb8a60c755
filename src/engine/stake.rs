// Stake engine: moves points from a user's balance into a market's outcome
// pool as one logical unit, with a compensating refund if the market turns
// out to be closed after the debit.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{Market, Order, User};
use crate::store::{LedgerStore, StoreError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StakeError {
    #[error("Amount must be positive")]
    InvalidAmount,
    #[error("User not found")]
    UserNotFound,
    #[error("Admin users cannot place predictions")]
    Forbidden,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Market is closed")]
    MarketClosed,
    #[error("Market not found")]
    MarketNotFound,
    #[error("Invalid outcome: {0}")]
    InvalidOutcome(String),
}

/// Snapshots returned to the caller after an accepted stake: the post-debit
/// user, the post-credit market and the recorded order.
#[derive(Debug, Clone, PartialEq)]
pub struct StakeReceipt {
    pub user: User,
    pub market: Market,
    pub order: Order,
}

/// Place a stake: validate, conditionally debit the balance, verify the
/// market still accepts stakes, credit the outcome pool and record the
/// order.
///
/// The debit happens before the market-open check on purpose: a stake
/// racing a resolution gets debited, sees the flipped status and refunds
/// itself, so the in-flight window stays small and self-healing.
pub fn place_stake(
    store: &LedgerStore,
    user_id: Uuid,
    market_id: Uuid,
    outcome: &str,
    amount: i64,
) -> Result<StakeReceipt, StakeError> {
    if amount <= 0 {
        return Err(StakeError::InvalidAmount);
    }
    let amount = amount as u64;

    // Admins resolve markets, so they are barred from staking in them.
    let bettor = store.get_user(user_id).ok_or(StakeError::UserNotFound)?;
    if bettor.is_admin {
        return Err(StakeError::Forbidden);
    }

    // Single atomic conditional decrement. Two concurrent stakes cannot
    // both pass a stale balance check because the check and the write are
    // one indivisible store operation.
    let user = store
        .debit_if_sufficient(user_id, amount)
        .map_err(|e| match e {
            StoreError::InsufficientBalance => StakeError::InsufficientBalance,
            _ => StakeError::UserNotFound,
        })?;

    // Re-fetch the market after the debit. Anything wrong from here on
    // must refund the debit before reporting the failure.
    let market = match store.get_market(market_id) {
        Some(m) => m,
        None => {
            compensate(store, user_id, amount, market_id);
            return Err(StakeError::MarketNotFound);
        }
    };
    if !market.is_open_at(Utc::now()) {
        compensate(store, user_id, amount, market_id);
        return Err(StakeError::MarketClosed);
    }
    if !market.has_outcome(outcome) {
        compensate(store, user_id, amount, market_id);
        return Err(StakeError::InvalidOutcome(outcome.to_string()));
    }

    // Independent atomic pool increment; commutative with concurrent
    // stakes on the same market. Refused if a resolution landed between
    // the open-check and here, in which case the debit is refunded.
    let market = match store.pool_credit(market_id, outcome, amount) {
        Ok(m) => m,
        Err(StoreError::AlreadyResolved) => {
            compensate(store, user_id, amount, market_id);
            return Err(StakeError::MarketClosed);
        }
        Err(StoreError::UnknownOutcome(o)) => {
            compensate(store, user_id, amount, market_id);
            return Err(StakeError::InvalidOutcome(o));
        }
        Err(_) => {
            compensate(store, user_id, amount, market_id);
            return Err(StakeError::MarketNotFound);
        }
    };

    let order = store.insert_order(Order::new(user_id, market_id, outcome, amount));

    info!(
        user = %user.username,
        market = %market_id,
        outcome,
        amount,
        "stake accepted"
    );

    Ok(StakeReceipt {
        user,
        market,
        order,
    })
}

/// Best-effort refund of a debit whose stake could not complete. A failure
/// here means points left circulation; log everything needed for manual
/// reconciliation.
fn compensate(store: &LedgerStore, user_id: Uuid, amount: u64, market_id: Uuid) {
    if let Err(e) = store.credit(user_id, amount) {
        error!(
            user = %user_id,
            amount,
            market = %market_id,
            error = %e,
            "compensating refund failed; manual reconciliation required"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Market;
    use chrono::Duration;

    fn store_with_market(closes_in_hours: i64) -> (LedgerStore, Market) {
        let store = LedgerStore::new(1000);
        let market = store.insert_market(Market::new(
            "Will it rain tomorrow?".into(),
            "Test market".into(),
            "All".into(),
            vec!["Yes".into(), "No".into()],
            Utc::now() + Duration::hours(closes_in_hours),
        ));
        (store, market)
    }

    #[test]
    fn accepted_stake_debits_and_credits_pool() {
        let (store, market) = store_with_market(24);
        let user = store.login_or_create("alice");

        let receipt = place_stake(&store, user.id, market.id, "Yes", 100).unwrap();

        assert_eq!(receipt.user.points, 900);
        assert_eq!(receipt.market.outcome_pools["Yes"], 100);
        assert_eq!(receipt.order.amount, 100);
        assert_eq!(receipt.order.payout, 0);
    }

    #[test]
    fn rejects_non_positive_amount() {
        let (store, market) = store_with_market(24);
        let user = store.login_or_create("alice");

        assert_eq!(
            place_stake(&store, user.id, market.id, "Yes", 0),
            Err(StakeError::InvalidAmount)
        );
        assert_eq!(
            place_stake(&store, user.id, market.id, "Yes", -50),
            Err(StakeError::InvalidAmount)
        );
        assert_eq!(store.get_user(user.id).unwrap().points, 1000);
    }

    #[test]
    fn admins_cannot_stake() {
        let (store, market) = store_with_market(24);
        let admin = store.seed_admin("admin", 10_000);

        assert_eq!(
            place_stake(&store, admin.id, market.id, "Yes", 10),
            Err(StakeError::Forbidden)
        );
        assert_eq!(store.get_user(admin.id).unwrap().points, 10_000);
    }

    #[test]
    fn insufficient_balance_leaves_state_untouched() {
        let (store, market) = store_with_market(24);
        let user = store.login_or_create("alice");

        assert_eq!(
            place_stake(&store, user.id, market.id, "Yes", 2000),
            Err(StakeError::InsufficientBalance)
        );
        assert_eq!(store.get_user(user.id).unwrap().points, 1000);
        assert_eq!(store.get_market(market.id).unwrap().total_pool(), 0);
    }

    #[test]
    fn stake_of_exact_balance_succeeds() {
        let (store, market) = store_with_market(24);
        let user = store.login_or_create("alice");

        let receipt = place_stake(&store, user.id, market.id, "No", 1000).unwrap();
        assert_eq!(receipt.user.points, 0);
    }

    #[test]
    fn past_deadline_is_rejected_and_refunded() {
        let (store, market) = store_with_market(-1);
        let user = store.login_or_create("alice");

        assert_eq!(
            place_stake(&store, user.id, market.id, "Yes", 100),
            Err(StakeError::MarketClosed)
        );
        // Compensation restored the debited amount.
        assert_eq!(store.get_user(user.id).unwrap().points, 1000);
        assert_eq!(store.get_market(market.id).unwrap().total_pool(), 0);
    }

    #[test]
    fn resolved_market_is_rejected_and_refunded() {
        let (store, market) = store_with_market(24);
        let user = store.login_or_create("alice");
        store.resolve_if_open(market.id, "Yes").unwrap();

        assert_eq!(
            place_stake(&store, user.id, market.id, "Yes", 100),
            Err(StakeError::MarketClosed)
        );
        assert_eq!(store.get_user(user.id).unwrap().points, 1000);
    }

    #[test]
    fn unknown_outcome_is_rejected_and_refunded() {
        let (store, market) = store_with_market(24);
        let user = store.login_or_create("alice");

        assert!(matches!(
            place_stake(&store, user.id, market.id, "Maybe", 100),
            Err(StakeError::InvalidOutcome(_))
        ));
        assert_eq!(store.get_user(user.id).unwrap().points, 1000);
    }

    #[test]
    fn missing_market_is_rejected_and_refunded() {
        let store = LedgerStore::new(1000);
        let user = store.login_or_create("alice");

        assert_eq!(
            place_stake(&store, user.id, Uuid::new_v4(), "Yes", 100),
            Err(StakeError::MarketNotFound)
        );
        assert_eq!(store.get_user(user.id).unwrap().points, 1000);
    }

    #[test]
    fn pools_conserve_accepted_stakes() {
        let (store, market) = store_with_market(24);
        let alice = store.login_or_create("alice");
        let bob = store.login_or_create("bob");

        place_stake(&store, alice.id, market.id, "Yes", 300).unwrap();
        place_stake(&store, bob.id, market.id, "No", 450).unwrap();
        place_stake(&store, alice.id, market.id, "No", 250).unwrap();

        let market = store.get_market(market.id).unwrap();
        let yes_orders = store.orders_for_market_outcome(market.id, "Yes");
        let no_orders = store.orders_for_market_outcome(market.id, "No");
        let staked: u64 = yes_orders
            .iter()
            .chain(no_orders.iter())
            .map(|o| o.amount)
            .sum();
        assert_eq!(market.total_pool(), staked);
        assert_eq!(market.total_pool(), 1000);
    }
}
