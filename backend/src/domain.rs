use anyhow::Result;
use serde_json::Value;
use shared::Expense;
use tracing::info;

use crate::db::Database;
use crate::normalize;

/// Repository for expense records. Owns the storage adapter handle and applies
/// normalization on both directions; constructed once at startup and cloned
/// into handlers.
#[derive(Clone)]
pub struct ExpenseService {
    db: Database,
}

impl ExpenseService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// List all expenses, newest first. Outbound normalization runs per row.
    pub async fn list_expenses(&self) -> Result<Vec<Expense>> {
        let rows = self.db.fetch_expenses().await?;
        Ok(rows.into_iter().map(normalize::expense_from_row).collect())
    }

    /// Normalize a raw payload and insert it. Returns the assigned id.
    /// No field-level validation: malformed dates or amounts are stored as given.
    pub async fn create_expense(&self, payload: &Value) -> Result<i64> {
        let record = normalize::normalize(payload);
        let id = self.db.insert_expense(&record).await?;
        info!("Created expense {}", id);
        Ok(id)
    }

    /// Delete one expense. Ok(false) means no row matched, a distinct
    /// outcome from a storage failure, so callers can answer "not found".
    pub async fn delete_expense(&self, id: i64) -> Result<bool> {
        self.db.delete_expense(id).await
    }

    /// Remove every expense. Idempotent; returns the number deleted.
    pub async fn clear_expenses(&self) -> Result<u64> {
        let deleted = self.db.delete_all_expenses().await?;
        info!("Cleared {} expenses", deleted);
        Ok(deleted)
    }
}
