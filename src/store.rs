// 🗄️ Store abstraction - the six venue tables
//
// Every call is a single attempt. Callers apply a change locally only after
// the store reports success.

use crate::billing::BillingConfig;
use crate::entities::{Car, CarStatus, Expense, ExpenseDraft, MenuItem, MenuItemDraft};
use crate::session::{ActiveSession, CompletedTransaction};
use thiserror::Error;

const CONNECTIVITY_HINT: &str = "The data store could not be reached. Check the network connection, \
     and that the database path or service URL is correct and reachable from this machine.";

const AUTH_HINT: &str = "Authentication with the data store failed. Check the configured \
     credentials (API key or file permissions) for the data store.";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Network / connectivity failure
    #[error("data store unavailable: {0}")]
    Unavailable(String),

    /// Authentication or permission failure
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("{entity} '{id}' not found in store")]
    NotFound { entity: &'static str, id: String },

    /// Unique or foreign-key constraint violated
    #[error("conflict: {0}")]
    Conflict(String),

    /// Part of a multi-step write landed and part did not
    #[error("inconsistent write: {0}")]
    Inconsistent(String),

    #[error("store error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classify a raw backend error message by its known signatures
    pub fn classify(message: &str) -> StoreError {
        let lower = message.to_lowercase();

        if lower.contains("failed to fetch")
            || lower.contains("connection refused")
            || lower.contains("unable to open")
            || lower.contains("timed out")
        {
            StoreError::Unavailable(message.to_string())
        } else if lower.contains("jwt")
            || lower.contains("unauthorized")
            || lower.contains("api key")
            || lower.contains("permission denied")
        {
            StoreError::Unauthorized(message.to_string())
        } else {
            StoreError::Backend(message.to_string())
        }
    }

    /// Guidance text shown to the operator next to the raw error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            StoreError::Unavailable(_) => Some(CONNECTIVITY_HINT),
            StoreError::Unauthorized(_) => Some(AUTH_HINT),
            _ => None,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Table operations used by the venue.
///
/// Multi-table operations (`begin_session`, `complete_session`) must either
/// apply completely or not at all. An implementation that cannot guarantee
/// this returns `StoreError::Inconsistent` when it stops half way.
pub trait Store {
    // cars
    fn fetch_cars(&self) -> StoreResult<Vec<Car>>;
    fn upsert_car(&mut self, car: &Car) -> StoreResult<Car>;
    fn set_car_status(&mut self, car_id: &str, status: CarStatus) -> StoreResult<()>;
    fn delete_car(&mut self, car_id: &str) -> StoreResult<()>;

    // menu items
    fn fetch_menu_items(&self) -> StoreResult<Vec<MenuItem>>;
    fn insert_menu_item(&mut self, draft: &MenuItemDraft) -> StoreResult<MenuItem>;
    fn update_menu_item(&mut self, item: &MenuItem) -> StoreResult<MenuItem>;
    fn delete_menu_item(&mut self, id: i64) -> StoreResult<()>;

    // expenses
    fn fetch_expenses(&self) -> StoreResult<Vec<Expense>>;
    fn insert_expense(&mut self, draft: &ExpenseDraft) -> StoreResult<Expense>;
    fn update_expense(&mut self, expense: &Expense) -> StoreResult<Expense>;
    fn delete_expense(&mut self, id: &str) -> StoreResult<()>;

    // billing config (singleton)
    fn fetch_billing_config(&self) -> StoreResult<Option<BillingConfig>>;
    fn upsert_billing_config(&mut self, config: &BillingConfig) -> StoreResult<()>;

    // sessions and transactions
    fn fetch_active_sessions(&self) -> StoreResult<Vec<ActiveSession>>;
    fn fetch_transactions(&self) -> StoreResult<Vec<CompletedTransaction>>;

    /// Mark the session's cars in use and record the session
    fn begin_session(&mut self, session: &ActiveSession) -> StoreResult<()>;

    /// Replace the stored order lines of an active session
    fn update_session_order(&mut self, session: &ActiveSession) -> StoreResult<()>;

    /// Record the transaction, release its cars, drop the active session
    fn complete_session(&mut self, transaction: &CompletedTransaction) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known_signatures() {
        assert!(matches!(
            StoreError::classify("TypeError: Failed to fetch"),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            StoreError::classify("Invalid API key"),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            StoreError::classify("JWT expired"),
            StoreError::Unauthorized(_)
        ));
        assert!(matches!(
            StoreError::classify("syntax error near SELECT"),
            StoreError::Backend(_)
        ));
    }

    #[test]
    fn test_hints() {
        assert_eq!(
            StoreError::Unavailable("x".into()).hint(),
            Some(CONNECTIVITY_HINT)
        );
        assert_eq!(StoreError::Unauthorized("x".into()).hint(), Some(AUTH_HINT));
        assert_eq!(StoreError::Conflict("x".into()).hint(), None);
    }
}
