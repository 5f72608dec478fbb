//! Circulation rules
//!
//! Pure decisions over already-loaded documents. The circulation service does
//! the lookups and writes around these.

use crate::{
    error::CirculationError,
    models::{book::Book, student::Student, transaction::{TransactionRecord, TransactionType}},
};

/// An available book is being issued; anything else is coming back
pub fn direction_for(book: &Book) -> TransactionType {
    if book.is_book_available {
        TransactionType::Issue
    } else {
        TransactionType::Return
    }
}

/// A student may take another book while under the cap
pub fn check_issue(student_id: &str, student: Option<&Student>, cap: i64) -> Result<(), CirculationError> {
    let student = student.ok_or_else(|| CirculationError::UnknownStudent {
        student_id: student_id.to_string(),
    })?;

    if student.number_of_books_issued >= cap {
        return Err(CirculationError::IssueQuotaExceeded {
            student_id: student_id.to_string(),
            issued: student.number_of_books_issued,
            cap,
        });
    }
    Ok(())
}

/// Only the student named on the book's latest transaction may return it
pub fn check_return(
    book_id: &str,
    student_id: &str,
    latest: Option<&TransactionRecord>,
) -> Result<(), CirculationError> {
    match latest {
        Some(last) if last.student_id == student_id => Ok(()),
        _ => Err(CirculationError::ReturnMismatch {
            book_id: book_id.to_string(),
            student_id: student_id.to_string(),
            issued_to: latest.map(|t| t.student_id.clone()),
        }),
    }
}
