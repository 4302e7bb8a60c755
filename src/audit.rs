// Audit trail for administrative actions.
//
// Each action kind carries its own structured payload instead of an
// untyped details blob, serialized with the same tags the surrounding
// layer displays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", content = "details")]
pub enum AuditAction {
    #[serde(rename = "CREATE_MARKET")]
    CreateMarket { question: String, category: String },
    #[serde(rename = "RESOLVE_MARKET")]
    ResolveMarket {
        outcome: String,
        total_pool: u64,
        winning_pool: u64,
        distributed: u64,
        /// Floor-rounding remainder kept by the house.
        retained: u64,
        winning_orders: u64,
    },
    #[serde(rename = "DELETE_MARKET")]
    DeleteMarket { question: String },
    #[serde(rename = "GRANT_ADMIN")]
    GrantAdmin { username: String },
    #[serde(rename = "REVOKE_ADMIN")]
    RevokeAdmin { username: String },
}

/// One administrative action: who did what to which entity, when.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Denormalized for easy display.
    pub username: String,
    #[serde(flatten)]
    pub action: AuditAction,
    pub target_id: Uuid,
    pub timestamp: DateTime<Utc>,
}

#[derive(Default)]
pub struct AuditTrail {
    entries: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, user_id: Uuid, username: &str, target_id: Uuid, action: AuditAction) {
        let entry = AuditEntry {
            id: Uuid::new_v4(),
            user_id,
            username: username.to_string(),
            action,
            target_id,
            timestamp: Utc::now(),
        };
        self.entries.lock().unwrap().push(entry);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        let entries = self.entries.lock().unwrap();
        entries.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_returned_newest_first() {
        let trail = AuditTrail::new();
        let admin = Uuid::new_v4();

        trail.record(
            admin,
            "admin",
            Uuid::new_v4(),
            AuditAction::CreateMarket {
                question: "First?".into(),
                category: "All".into(),
            },
        );
        trail.record(
            admin,
            "admin",
            Uuid::new_v4(),
            AuditAction::DeleteMarket {
                question: "First?".into(),
            },
        );

        let recent = trail.recent(10);
        assert_eq!(recent.len(), 2);
        assert!(matches!(recent[0].action, AuditAction::DeleteMarket { .. }));
        assert!(matches!(recent[1].action, AuditAction::CreateMarket { .. }));
    }

    #[test]
    fn actions_serialize_with_stable_tags() {
        let action = AuditAction::ResolveMarket {
            outcome: "Yes".into(),
            total_pool: 1000,
            winning_pool: 300,
            distributed: 999,
            retained: 1,
            winning_orders: 2,
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["action"], "RESOLVE_MARKET");
        assert_eq!(json["details"]["retained"], 1);
    }

    #[test]
    fn limit_caps_the_returned_entries() {
        let trail = AuditTrail::new();
        let admin = Uuid::new_v4();
        for i in 0..5 {
            trail.record(
                admin,
                "admin",
                Uuid::new_v4(),
                AuditAction::GrantAdmin {
                    username: format!("user{}", i),
                },
            );
        }
        assert_eq!(trail.recent(3).len(), 3);
    }
}
