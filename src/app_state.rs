// Application state management

use std::sync::Arc;

use crate::audit::AuditTrail;
use crate::store::LedgerStore;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub store: LedgerStore,
    pub audit: AuditTrail,
    pub data_file: String,
}

impl AppState {
    /// Build state from the environment: starting grant, persistence path
    /// and the bootstrap admin account.
    pub fn from_env() -> Self {
        let starting_points = std::env::var("STARTING_POINTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let data_file =
            std::env::var("DATA_FILE").unwrap_or_else(|_| "data/state.json".to_string());

        let store = LedgerStore::new(starting_points);

        let state = Self {
            store,
            audit: AuditTrail::new(),
            data_file,
        };

        if state.store.load_from_disk(&state.data_file).is_err() {
            tracing::info!("no persisted state found, starting fresh");
        }

        // Bootstrap admin, create-or-promote (idempotent across restarts).
        let admin_username = std::env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_points = std::env::var("ADMIN_POINTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);
        state.store.seed_admin(&admin_username, admin_points);

        state
    }

    pub fn save_to_disk(&self) -> Result<(), String> {
        self.store.save_to_disk(&self.data_file)
    }
}
