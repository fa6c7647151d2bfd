use serde::{Deserialize, Serialize};

/// One recorded expense as returned by the API.
///
/// Field names match the storage columns. Every field except `id` is supplied
/// by the client at creation time and stored as given, so all of them are
/// optional on the way back out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    /// Storage-assigned identifier, unique and monotonically increasing
    pub id: i64,
    /// Expense date (YYYY-MM-DD expected, not validated)
    pub date: Option<String>,
    /// Merchant or description
    pub expense_name: Option<String>,
    pub amount: Option<f64>,
    /// 3-letter currency code expected, not validated
    pub currency: Option<String>,
    pub paid_by: Option<String>,
    /// Free text; a list submitted at creation time is joined with ", "
    pub category: Option<String>,
    /// Ordered sequence of opaque location objects, possibly empty.
    /// Never exposed as a raw string.
    pub locations: Vec<serde_json::Value>,
    /// Workflow status, free text
    pub status: Option<String>,
    /// Path to an uploaded receipt image, if any
    pub receipt_url: Option<String>,
    pub notes: Option<String>,
}

/// Best-effort field guesses extracted from a receipt image.
///
/// Key names follow the client-side form contract (capitalized), which is
/// also what the vision model is instructed to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedExpense {
    /// YYYY-MM-DD
    #[serde(rename = "Date", skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// Merchant name
    #[serde(rename = "Expense_Name", skip_serializing_if = "Option::is_none")]
    pub expense_name: Option<String>,
    /// Receipt total
    #[serde(rename = "Amount", skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    /// 3-letter code, e.g. THB, EUR, USD
    #[serde(rename = "Currency", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    /// One of: Food, Transport, Lodging, Entertainment, Supplies, Other
    #[serde(rename = "Category", skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Response after a successful expense creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateExpenseResponse {
    pub status: String,
    /// Identifier assigned by storage
    pub id: i64,
}

/// Response after a successful single-expense deletion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteExpenseResponse {
    pub status: String,
}

/// Response after clearing all expenses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClearExpensesResponse {
    pub status: String,
    /// Number of rows removed (0 on an already-empty table)
    pub deleted: u64,
}

/// Response after a successful receipt upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    /// Path the stored file can be fetched back from, e.g. "/uploads/169..._receipt.jpg"
    #[serde(rename = "filePath")]
    pub file_path: String,
}

/// Structured error payload returned for every client-visible failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
