// Core engines: stake placement and market settlement.
//
// Both engines are synchronous and re-entrant; the only synchronization
// they rely on is the ledger store's conditional atomic primitives.

pub mod settlement;
pub mod stake;

pub use settlement::{resolve_market, Payout, ResolveError, SettlementReport};
pub use stake::{place_stake, StakeError, StakeReceipt};
