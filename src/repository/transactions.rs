//! Transactions repository

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::Book,
        identifier::IdentifierKind,
        student::Student,
        transaction::{TransactionEntry, TransactionRecord},
    },
    repository::store::{
        Document, DocumentStore, DocumentStoreExt, Query, Stored, WriteBatch, BOOKS, STUDENTS,
        TRANSACTIONS,
    },
};

#[derive(Clone)]
pub struct TransactionsRepository {
    store: Arc<dyn DocumentStore>,
}

/// Field the store stamps with the creation time
const DATE_FIELD: &str = "date";

#[derive(Deserialize)]
struct StoredEntry {
    #[serde(flatten)]
    entry: TransactionEntry,
    date: Option<DateTime<Utc>>,
}

fn to_record(doc: Document) -> AppResult<TransactionRecord> {
    let stored = doc.decode::<StoredEntry>()?;
    let date = stored.value.date.unwrap_or(stored.created_at);
    Ok(TransactionRecord::from_entry(stored.id, date, stored.value.entry))
}

impl TransactionsRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Most recent transaction recorded for a book
    pub async fn latest_for_book(&self, book_id: &str) -> AppResult<Option<TransactionRecord>> {
        self.store
            .find_latest_by_field(TRANSACTIONS, "book_id", book_id)
            .await?
            .map(to_record)
            .transpose()
    }

    /// List transactions in recording order, optionally for one book or student
    pub async fn list(
        &self,
        filter: Option<(IdentifierKind, &str)>,
        after: Option<String>,
        limit: usize,
    ) -> AppResult<Vec<TransactionRecord>> {
        let mut query = Query::collection(TRANSACTIONS).start_after(after).limit(limit);
        if let Some((kind, value)) = filter {
            query = query.where_eq(kind.field(), value);
        }

        self.store
            .find(query)
            .await?
            .into_iter()
            .map(to_record)
            .collect()
    }

    /// Record an accepted issue or return.
    ///
    /// Appends the transaction, flips the book's availability and moves the
    /// student's issued count in one batch, guarded on the availability and
    /// count the decision was based on.
    pub async fn commit(
        &self,
        book: &Stored<Book>,
        student: &Stored<Student>,
        entry: TransactionEntry,
    ) -> AppResult<TransactionRecord> {
        let was_available = book.value.is_book_available;
        let delta = entry.transaction_type.issued_delta();

        let batch = WriteBatch::new()
            .expect(BOOKS, &book.id, "is_book_available", was_available)
            .expect_count(
                STUDENTS,
                &student.id,
                "number_of_books_issued",
                student.value.number_of_books_issued,
            )
            .insert_stamped(TRANSACTIONS, DATE_FIELD, serde_json::to_value(&entry)?)
            .update_fields(BOOKS, &book.id, json!({ "is_book_available": !was_available }))
            .increment(STUDENTS, &student.id, "number_of_books_issued", delta);

        let inserted = self.store.commit(batch).await?;
        let doc = inserted
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal("transaction insert returned no document".to_string()))?;

        to_record(doc)
    }
}
