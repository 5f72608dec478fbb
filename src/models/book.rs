//! Book document model

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Descriptive fields nested under `book_details`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookDetails {
    #[serde(default)]
    pub book_name: String,
}

/// Book document from the `books` collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub book_id: String,
    #[serde(default)]
    pub book_details: BookDetails,
    /// False while the book is issued to a student
    pub is_book_available: bool,
}

impl Book {
    pub fn name(&self) -> &str {
        &self.book_details.book_name
    }
}
