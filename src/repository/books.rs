//! Books repository

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::book::Book,
    repository::store::{DocumentStore, DocumentStoreExt, Stored, BOOKS},
};

#[derive(Clone)]
pub struct BooksRepository {
    store: Arc<dyn DocumentStore>,
}

impl BooksRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Find a book by its `book_id` field
    pub async fn get_by_book_id(&self, book_id: &str) -> AppResult<Option<Stored<Book>>> {
        self.store
            .find_one_by_field(BOOKS, "book_id", book_id)
            .await?
            .map(|doc| doc.decode())
            .transpose()
    }

    /// Create or replace a book, keyed by its identifier
    pub async fn put(&self, book: &Book) -> AppResult<()> {
        self.store
            .put(BOOKS, &book.book_id, serde_json::to_value(book)?)
            .await?;
        Ok(())
    }
}
