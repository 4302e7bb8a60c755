// Admin gate for protected routes.
//
// No session state: the caller supplies its user id with each request and
// the gate resolves it against the store.

use axum::http::StatusCode;
use axum::response::Json;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::models::User;
use crate::store::LedgerStore;

pub type AuthRejection = (StatusCode, Json<Value>);

/// Resolve the caller and require the admin flag. Distinguishes "who are
/// you" (401), "you don't exist" (404) and "you are not an admin" (403).
pub fn require_admin(store: &LedgerStore, user_id: Option<Uuid>) -> Result<User, AuthRejection> {
    let user_id = user_id.ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Authentication required. Please provide user_id." })),
        )
    })?;

    let user = store.get_user(user_id).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "User not found" })),
        )
    })?;

    if !user.is_admin {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": "Forbidden. Admin privileges required." })),
        ));
    }

    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_is_unauthorized() {
        let store = LedgerStore::new(1000);
        let err = require_admin(&store, None).unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn non_admin_is_forbidden() {
        let store = LedgerStore::new(1000);
        let user = store.login_or_create("alice");
        let err = require_admin(&store, Some(user.id)).unwrap_err();
        assert_eq!(err.0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn admin_passes() {
        let store = LedgerStore::new(1000);
        let admin = store.seed_admin("admin", 10_000);
        let user = require_admin(&store, Some(admin.id)).unwrap();
        assert_eq!(user.id, admin.id);
    }
}
