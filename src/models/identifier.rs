//! Book and student identifiers captured at the desk

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// What a captured identifier refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdentifierKind {
    Book,
    Student,
}

impl IdentifierKind {
    /// Classify a search term by its prefix (`B...` books, `S...` students)
    pub fn classify(text: &str) -> Option<Self> {
        match text.trim_start().chars().next().map(|c| c.to_ascii_uppercase()) {
            Some('B') => Some(IdentifierKind::Book),
            Some('S') => Some(IdentifierKind::Student),
            _ => None,
        }
    }

    /// Field holding this kind of identifier in transaction documents
    pub fn field(&self) -> &'static str {
        match self {
            IdentifierKind::Book => "book_id",
            IdentifierKind::Student => "student_id",
        }
    }
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IdentifierKind::Book => write!(f, "book"),
            IdentifierKind::Student => write!(f, "student"),
        }
    }
}

/// How the identifier was entered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Decoded from a camera barcode scan
    Scan,
    #[default]
    Manual,
}

/// A trimmed, non-empty identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedIdentifier {
    pub kind: IdentifierKind,
    pub value: String,
    pub source: CaptureSource,
}

impl CapturedIdentifier {
    pub fn new(kind: IdentifierKind, raw: &str, source: CaptureSource) -> AppResult<Self> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(AppError::Validation(format!("{} id is required", kind)));
        }
        Ok(Self {
            kind,
            value: value.to_string(),
            source,
        })
    }

    pub fn book(raw: &str) -> AppResult<Self> {
        Self::new(IdentifierKind::Book, raw, CaptureSource::Manual)
    }

    pub fn student(raw: &str) -> AppResult<Self> {
        Self::new(IdentifierKind::Student, raw, CaptureSource::Manual)
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}
