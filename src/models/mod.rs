//! Data models for the circulation desk

pub mod book;
pub mod identifier;
pub mod librarian;
pub mod student;
pub mod transaction;

// Re-export commonly used types
pub use book::Book;
pub use identifier::{CaptureSource, CapturedIdentifier, IdentifierKind};
pub use librarian::{Librarian, LibrarianClaims};
pub use student::Student;
pub use transaction::{TransactionOutcome, TransactionRecord, TransactionType};
