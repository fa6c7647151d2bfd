//! # Expense Normalization
//!
//! Reconciles loosely-shaped client payloads into the canonical expense
//! record (inbound) and maps stored rows back into API objects (outbound).
//! Every rule here is lenient: a missing or oddly-typed field resolves to
//! an empty value, never an error.

use serde_json::Value;
use shared::Expense;

use crate::db::{ExpenseRow, NewExpense};

/// Accepted aliases for "who paid", in precedence order: the capitalized
/// client field wins when both are present.
const PAID_BY_KEYS: [&str; 2] = ["Paid_By", "paid_by"];

/// Accepted aliases for the category field, same precedence rule.
const CATEGORY_KEYS: [&str; 2] = ["Category", "category"];

/// Map an untrusted request payload into a canonical record ready for storage.
///
/// Pass-through fields are read by their exact expected key; a missing key
/// yields None. Non-object payloads behave like an empty object.
pub fn normalize(payload: &Value) -> NewExpense {
    NewExpense {
        date: string_field(payload, "Date"),
        expense_name: string_field(payload, "Expense_Name"),
        amount: payload.get("Amount").and_then(Value::as_f64),
        currency: string_field(payload, "Currency"),
        paid_by: aliased_string(payload, &PAID_BY_KEYS),
        category: category_field(payload),
        locations: encode_locations(payload.get("locations")),
        status: string_field(payload, "Status"),
        receipt_url: string_field(payload, "Receipt_URL"),
        notes: string_field(payload, "Notes"),
    }
}

/// Map a stored row to its API-facing shape. The locations blob is decoded
/// leniently per row, so one corrupt row cannot fail a whole listing.
pub fn expense_from_row(row: ExpenseRow) -> Expense {
    Expense {
        id: row.id,
        date: row.date,
        expense_name: row.expense_name,
        amount: row.amount,
        currency: row.currency,
        paid_by: row.paid_by,
        category: row.category,
        locations: decode_locations(row.locations.as_deref()),
        status: row.status,
        receipt_url: row.receipt_url,
        notes: row.notes,
    }
}

/// Serialize a locations value to its storage blob. Only a JSON array is
/// accepted; any other shape (missing, scalar, object) serializes as "[]".
pub fn encode_locations(value: Option<&Value>) -> String {
    match value {
        Some(list @ Value::Array(_)) => list.to_string(),
        _ => "[]".to_string(),
    }
}

/// Lenient decode of a stored locations blob. NULL, empty, malformed, or
/// non-array JSON all come back as an empty sequence.
pub fn decode_locations(blob: Option<&str>) -> Vec<Value> {
    let Some(text) = blob else {
        return Vec::new();
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items,
        _ => Vec::new(),
    }
}

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_owned)
}

/// Resolve the first non-null value among the accepted key aliases.
fn aliased_string(payload: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
        .and_then(Value::as_str)
        .map(str::to_owned)
}

/// Resolve the category, joining a submitted list into one comma-separated
/// string. The join is lossy: the original list is not recoverable on read.
fn category_field(payload: &Value) -> Option<String> {
    let value = CATEGORY_KEYS
        .iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))?;

    match value {
        Value::Array(items) => {
            let joined = items.iter().map(display_string).collect::<Vec<_>>().join(", ");
            Some(joined)
        }
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// String representation of one list element: strings verbatim, anything
/// else in its JSON form.
fn display_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
