// PointPool parimutuel prediction market
// Exports all modules for use as a library crate

pub mod app_state;
pub mod audit;
pub mod auth;
pub mod engine;
pub mod handlers;
pub mod models;
pub mod store;

pub use app_state::{AppState, SharedState};
pub use audit::{AuditAction, AuditEntry, AuditTrail};
pub use engine::{
    place_stake, resolve_market, Payout, ResolveError, SettlementReport, StakeError, StakeReceipt,
};
pub use models::{Market, MarketStatus, Order, User};
pub use store::{LedgerStore, StoreError};
