// Data models for the PointPool prediction market

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A registered player. Balance is mutated only by the stake and settlement
/// engines, never directly by request handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub points: u64,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: &str, starting_points: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            points: starting_points,
            is_admin: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketStatus {
    #[serde(rename = "OPEN")]
    Open,
    #[serde(rename = "RESOLVED")]
    Resolved,
}

/// A market with one parimutuel pool per outcome.
///
/// While OPEN the pool total only grows; once RESOLVED the pools are frozen
/// and `resolved_outcome` is set exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    pub id: Uuid,
    pub question: String,
    pub description: String,
    pub category: String,
    /// Ordered outcome labels, distinct, at least two.
    pub outcomes: Vec<String>,
    /// Accumulated stake per outcome. Every outcome has an entry from
    /// creation so a pool credit never inserts a key.
    pub outcome_pools: HashMap<String, u64>,
    pub status: MarketStatus,
    /// Soft boundary: stakes stop at this instant, resolution may happen any
    /// time after.
    pub closes_at: DateTime<Utc>,
    pub resolved_outcome: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Market {
    pub fn new(
        question: String,
        description: String,
        category: String,
        outcomes: Vec<String>,
        closes_at: DateTime<Utc>,
    ) -> Self {
        let outcome_pools = outcomes.iter().map(|o| (o.clone(), 0u64)).collect();
        Self {
            id: Uuid::new_v4(),
            question,
            description,
            category,
            outcomes,
            outcome_pools,
            status: MarketStatus::Open,
            closes_at,
            resolved_outcome: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    /// Whether the market accepts stakes at `now`.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.status == MarketStatus::Open && now < self.closes_at
    }

    pub fn has_outcome(&self, outcome: &str) -> bool {
        self.outcomes.iter().any(|o| o == outcome)
    }

    /// Sum of all outcome pools, losing outcomes included.
    pub fn total_pool(&self) -> u64 {
        self.outcome_pools.values().sum()
    }
}

/// A single accepted stake. Never deleted; the only field ever updated is
/// `payout`, set at most once when the market settles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub market_id: Uuid,
    pub outcome: String,
    pub amount: u64,
    pub payout: u64,
    pub timestamp: DateTime<Utc>,
}

impl Order {
    pub fn new(user_id: Uuid, market_id: Uuid, outcome: &str, amount: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            market_id,
            outcome: outcome.to_string(),
            amount,
            payout: 0,
            timestamp: Utc::now(),
        }
    }
}

// ===== REQUEST TYPES =====

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateMarketRequest {
    pub question: String,
    #[serde(default)]
    pub description: String,
    pub outcomes: Vec<String>,
    pub closes_at: DateTime<Utc>,
    #[serde(default)]
    pub category: Option<String>,
    /// Caller identity for the admin gate.
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct PlaceOrderRequest {
    pub user_id: Uuid,
    pub market_id: Uuid,
    pub outcome: String,
    /// Signed on the wire so a negative amount gets a clear validation error
    /// instead of a deserialization failure.
    pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub struct ResolveMarketRequest {
    pub outcome: String,
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct AdminTargetRequest {
    pub user_id: Uuid,
    pub target_username: String,
}
