//! Librarian accounts repository

use std::sync::Arc;

use crate::{
    error::AppResult,
    models::librarian::Librarian,
    repository::store::{DocumentStore, DocumentStoreExt, LIBRARIANS},
};

#[derive(Clone)]
pub struct LibrariansRepository {
    store: Arc<dyn DocumentStore>,
}

impl LibrariansRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<Librarian>> {
        self.store
            .find_one_by_field(LIBRARIANS, "email", email)
            .await?
            .map(|doc| doc.decode().map(|stored| stored.value))
            .transpose()
    }

    /// Create or replace the account for `librarian.email`
    pub async fn put(&self, librarian: &Librarian) -> AppResult<()> {
        self.store
            .put(LIBRARIANS, &librarian.email, serde_json::to_value(librarian)?)
            .await?;
        Ok(())
    }
}
