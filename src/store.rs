// Ledger Store: the durable key-value view of users, markets and orders.
//
// Every mutation here is a single lock-scoped read-modify-write, so the
// conditional debit and the pool increment are indivisible operations. The
// engines rely on that and take no locks of their own.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::models::{Market, MarketStatus, Order, User};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("User not found")]
    UserNotFound,
    #[error("Market not found")]
    MarketNotFound,
    #[error("Order not found")]
    OrderNotFound,
    #[error("Insufficient balance")]
    InsufficientBalance,
    #[error("Market already resolved")]
    AlreadyResolved,
    #[error("Unknown outcome: {0}")]
    UnknownOutcome(String),
    #[error("Order payout already set")]
    PayoutAlreadySet,
    #[error("Market has orders and cannot be deleted")]
    MarketHasOrders,
}

pub struct LedgerStore {
    users: Mutex<HashMap<Uuid, User>>,
    markets: Mutex<HashMap<Uuid, Market>>,
    orders: Mutex<HashMap<Uuid, Order>>,
    /// Points granted to a user on first login.
    starting_points: u64,
}

impl LedgerStore {
    pub fn new(starting_points: u64) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            markets: Mutex::new(HashMap::new()),
            orders: Mutex::new(HashMap::new()),
            starting_points,
        }
    }

    // ===== USERS =====

    /// Login-by-name: returns the existing user if the name is taken,
    /// otherwise creates one with the starting grant.
    pub fn login_or_create(&self, username: &str) -> User {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.values().find(|u| u.username == username) {
            return user.clone();
        }
        let user = User::new(username, self.starting_points);
        users.insert(user.id, user.clone());
        info!(username, points = user.points, "registered user");
        user
    }

    /// Create-or-promote the bootstrap admin account.
    pub fn seed_admin(&self, username: &str, points: u64) -> User {
        let mut users = self.users.lock().unwrap();
        if let Some(user) = users.values_mut().find(|u| u.username == username) {
            user.is_admin = true;
            return user.clone();
        }
        let mut admin = User::new(username, points);
        admin.is_admin = true;
        users.insert(admin.id, admin.clone());
        info!(username, points, "seeded admin user");
        admin
    }

    pub fn get_user(&self, id: Uuid) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }

    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        self.users
            .lock()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned()
    }

    /// Conditional decrement: debits `amount` only if the balance covers it.
    /// Indivisible under the users lock, so two concurrent debits can never
    /// jointly overdraw.
    pub fn debit_if_sufficient(&self, user_id: Uuid, amount: u64) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(StoreError::UserNotFound)?;
        if user.points < amount {
            return Err(StoreError::InsufficientBalance);
        }
        user.points -= amount;
        Ok(user.clone())
    }

    /// Unconditional increment, used for payouts and compensating refunds.
    pub fn credit(&self, user_id: Uuid, amount: u64) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        let user = users.get_mut(&user_id).ok_or(StoreError::UserNotFound)?;
        user.points += amount;
        Ok(user.clone())
    }

    pub fn set_admin(&self, username: &str, is_admin: bool) -> Result<User, StoreError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .values_mut()
            .find(|u| u.username == username)
            .ok_or(StoreError::UserNotFound)?;
        user.is_admin = is_admin;
        Ok(user.clone())
    }

    /// Non-admin users ranked by points, highest first.
    pub fn leaderboard(&self, limit: usize) -> Vec<User> {
        let users = self.users.lock().unwrap();
        let mut ranked: Vec<User> = users.values().filter(|u| !u.is_admin).cloned().collect();
        ranked.sort_by(|a, b| b.points.cmp(&a.points));
        ranked.truncate(limit);
        ranked
    }

    // ===== MARKETS =====

    pub fn insert_market(&self, market: Market) -> Market {
        let mut markets = self.markets.lock().unwrap();
        markets.insert(market.id, market.clone());
        market
    }

    pub fn get_market(&self, id: Uuid) -> Option<Market> {
        self.markets.lock().unwrap().get(&id).cloned()
    }

    pub fn list_markets(&self, category: Option<&str>) -> Vec<Market> {
        let markets = self.markets.lock().unwrap();
        let mut listed: Vec<Market> = markets
            .values()
            .filter(|m| match category {
                Some(c) if c != "All" => m.category == c,
                _ => true,
            })
            .cloned()
            .collect();
        listed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        listed
    }

    /// Atomic pool increment for one outcome. Increments by concurrent
    /// stakers commute; none is lost under interleaving. Refused once the
    /// market is RESOLVED, so a frozen pool can never grow.
    pub fn pool_credit(
        &self,
        market_id: Uuid,
        outcome: &str,
        amount: u64,
    ) -> Result<Market, StoreError> {
        let mut markets = self.markets.lock().unwrap();
        let market = markets
            .get_mut(&market_id)
            .ok_or(StoreError::MarketNotFound)?;
        if market.status != MarketStatus::Open {
            return Err(StoreError::AlreadyResolved);
        }
        let pool = market
            .outcome_pools
            .get_mut(outcome)
            .ok_or_else(|| StoreError::UnknownOutcome(outcome.to_string()))?;
        *pool += amount;
        Ok(market.clone())
    }

    /// One-way OPEN -> RESOLVED compare-and-set. This is the settlement
    /// barrier: once it lands, the stake engine's open-check fails every
    /// later stake and a second resolution fails here with AlreadyResolved.
    pub fn resolve_if_open(&self, market_id: Uuid, outcome: &str) -> Result<Market, StoreError> {
        let mut markets = self.markets.lock().unwrap();
        let market = markets
            .get_mut(&market_id)
            .ok_or(StoreError::MarketNotFound)?;
        if market.status != MarketStatus::Open {
            return Err(StoreError::AlreadyResolved);
        }
        if !market.has_outcome(outcome) {
            return Err(StoreError::UnknownOutcome(outcome.to_string()));
        }
        market.status = MarketStatus::Resolved;
        market.resolved_outcome = Some(outcome.to_string());
        market.resolved_at = Some(Utc::now());
        Ok(market.clone())
    }

    /// Deleting a market with orders would orphan their market reference,
    /// so it is refused. Holds both locks so no order can slip in between
    /// the check and the removal; locks are taken in the global order
    /// (markets before orders) so it cannot deadlock with the snapshot.
    pub fn delete_market(&self, market_id: Uuid) -> Result<Market, StoreError> {
        let mut markets = self.markets.lock().unwrap();
        let orders = self.orders.lock().unwrap();
        if !markets.contains_key(&market_id) {
            return Err(StoreError::MarketNotFound);
        }
        if orders.values().any(|o| o.market_id == market_id) {
            return Err(StoreError::MarketHasOrders);
        }
        Ok(markets.remove(&market_id).unwrap())
    }

    // ===== ORDERS =====

    pub fn insert_order(&self, order: Order) -> Order {
        let mut orders = self.orders.lock().unwrap();
        orders.insert(order.id, order.clone());
        order
    }

    pub fn orders_for_market_outcome(&self, market_id: Uuid, outcome: &str) -> Vec<Order> {
        let orders = self.orders.lock().unwrap();
        orders
            .values()
            .filter(|o| o.market_id == market_id && o.outcome == outcome)
            .cloned()
            .collect()
    }

    /// All orders by one user, newest first.
    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<Order> {
        let orders = self.orders.lock().unwrap();
        let mut owned: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        owned
    }

    /// Set-once payout write. A second write to the same order is refused,
    /// which keeps settled orders immutable even if a retry path misfires.
    pub fn set_order_payout(&self, order_id: Uuid, payout: u64) -> Result<Order, StoreError> {
        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(&order_id).ok_or(StoreError::OrderNotFound)?;
        if order.payout != 0 {
            return Err(StoreError::PayoutAlreadySet);
        }
        order.payout = payout;
        Ok(order.clone())
    }

    // ===== PERSISTENCE =====

    pub fn save_to_disk(&self, path: &str) -> Result<(), String> {
        // Clone one collection at a time so only a single guard is ever
        // alive; holding several here could deadlock against writers that
        // take the same locks in another order.
        let users = self.users.lock().unwrap().clone();
        let markets = self.markets.lock().unwrap().clone();
        let orders = self.orders.lock().unwrap().clone();
        let state = PersistedState {
            users,
            markets,
            orders,
        };

        let json = serde_json::to_string_pretty(&state)
            .map_err(|e| format!("Failed to serialize state: {}", e))?;

        if let Some(parent) = std::path::Path::new(path).parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data directory: {}", e))?;
        }
        std::fs::write(path, json).map_err(|e| format!("Failed to write state file: {}", e))?;

        info!(path, "state saved to disk");
        Ok(())
    }

    pub fn load_from_disk(&self, path: &str) -> Result<(), String> {
        let json = std::fs::read_to_string(path).map_err(|_| "No state file found".to_string())?;

        let state: PersistedState = serde_json::from_str(&json)
            .map_err(|e| format!("Failed to deserialize state: {}", e))?;

        *self.users.lock().unwrap() = state.users;
        *self.markets.lock().unwrap() = state.markets;
        *self.orders.lock().unwrap() = state.orders;

        info!(path, "state loaded from disk");
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedState {
    users: HashMap<Uuid, User>,
    markets: HashMap<Uuid, Market>,
    orders: HashMap<Uuid, Order>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn open_market(store: &LedgerStore) -> Market {
        store.insert_market(Market::new(
            "Will it rain tomorrow?".into(),
            "Test market".into(),
            "All".into(),
            vec!["Yes".into(), "No".into()],
            Utc::now() + Duration::days(1),
        ))
    }

    #[test]
    fn login_is_idempotent() {
        let store = LedgerStore::new(1000);
        let first = store.login_or_create("alice");
        let second = store.login_or_create("alice");
        assert_eq!(first.id, second.id);
        assert_eq!(second.points, 1000);
    }

    #[test]
    fn conditional_debit_never_overdraws() {
        let store = LedgerStore::new(100);
        let user = store.login_or_create("bob");

        assert!(store.debit_if_sufficient(user.id, 60).is_ok());
        assert_eq!(
            store.debit_if_sufficient(user.id, 60),
            Err(StoreError::InsufficientBalance)
        );
        assert_eq!(store.get_user(user.id).unwrap().points, 40);
    }

    #[test]
    fn debit_of_exact_balance_lands_at_zero() {
        let store = LedgerStore::new(250);
        let user = store.login_or_create("carol");
        let updated = store.debit_if_sufficient(user.id, 250).unwrap();
        assert_eq!(updated.points, 0);
    }

    #[test]
    fn pool_credit_rejects_unknown_outcome() {
        let store = LedgerStore::new(0);
        let market = open_market(&store);
        assert!(matches!(
            store.pool_credit(market.id, "Maybe", 10),
            Err(StoreError::UnknownOutcome(_))
        ));
    }

    #[test]
    fn resolve_gate_is_one_way() {
        let store = LedgerStore::new(0);
        let market = open_market(&store);

        let resolved = store.resolve_if_open(market.id, "Yes").unwrap();
        assert_eq!(resolved.status, MarketStatus::Resolved);
        assert_eq!(resolved.resolved_outcome.as_deref(), Some("Yes"));

        assert_eq!(
            store.resolve_if_open(market.id, "No"),
            Err(StoreError::AlreadyResolved)
        );
    }

    #[test]
    fn delete_refused_once_orders_exist() {
        let store = LedgerStore::new(1000);
        let user = store.login_or_create("dave");
        let market = open_market(&store);
        store.insert_order(Order::new(user.id, market.id, "Yes", 50));

        assert_eq!(
            store.delete_market(market.id),
            Err(StoreError::MarketHasOrders)
        );
    }

    #[test]
    fn payout_is_set_once() {
        let store = LedgerStore::new(1000);
        let user = store.login_or_create("erin");
        let market = open_market(&store);
        let order = store.insert_order(Order::new(user.id, market.id, "Yes", 50));

        assert!(store.set_order_payout(order.id, 120).is_ok());
        assert_eq!(
            store.set_order_payout(order.id, 999),
            Err(StoreError::PayoutAlreadySet)
        );
    }
}
