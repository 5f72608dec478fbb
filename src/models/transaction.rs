//! Circulation transaction model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Direction of a circulation transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Issue,
    Return,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Issue => "issue",
            TransactionType::Return => "return",
        }
    }

    /// Confirmation shown at the desk once the transaction is recorded
    pub fn confirmation(&self) -> &'static str {
        match self {
            TransactionType::Issue => "Book issued to the student!",
            TransactionType::Return => "Book returned to the library!",
        }
    }

    /// Change applied to the student's issued-book counter
    pub fn issued_delta(&self) -> i64 {
        match self {
            TransactionType::Issue => 1,
            TransactionType::Return => -1,
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields written to a `transactions` document.
///
/// The store adds `date` when the document is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEntry {
    pub student_id: String,
    pub student_name: String,
    pub book_id: String,
    pub book_name: String,
    pub transaction_type: TransactionType,
}

/// Transaction as returned by history queries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionRecord {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    pub book_id: String,
    pub book_name: String,
    pub date: DateTime<Utc>,
    pub transaction_type: TransactionType,
}

impl TransactionRecord {
    pub fn from_entry(id: String, date: DateTime<Utc>, entry: TransactionEntry) -> Self {
        Self {
            id,
            student_id: entry.student_id,
            student_name: entry.student_name,
            book_id: entry.book_id,
            book_name: entry.book_name,
            date,
            transaction_type: entry.transaction_type,
        }
    }
}

/// Result of an accepted issue or return
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TransactionOutcome {
    pub transaction_id: String,
    pub transaction_type: TransactionType,
    pub book_id: String,
    pub book_name: String,
    pub student_id: String,
    pub student_name: String,
    pub date: DateTime<Utc>,
    /// Confirmation message for the user
    pub message: String,
}

/// Transaction history search parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TransactionSearch {
    /// Book id (starting with B) or student id (starting with S)
    pub q: Option<String>,
    /// Id of the last transaction of the previous page
    pub after: Option<String>,
    pub limit: Option<usize>,
}

/// One page of transaction history
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TransactionPage {
    pub items: Vec<TransactionRecord>,
    /// Pass as `after` to fetch the next page
    pub next_cursor: Option<String>,
}
