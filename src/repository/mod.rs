//! Repository layer for document store access

pub mod books;
pub mod librarians;
pub mod memory;
pub mod postgres;
pub mod seed;
pub mod store;
pub mod students;
pub mod transactions;

use std::sync::Arc;

use crate::{
    config::{StoreBackend, StoreConfig},
    error::AppResult,
};

pub use store::DocumentStore;

/// Main repository struct holding the document store
#[derive(Clone)]
pub struct Repository {
    pub store: Arc<dyn DocumentStore>,
    pub books: books::BooksRepository,
    pub students: students::StudentsRepository,
    pub transactions: transactions::TransactionsRepository,
    pub librarians: librarians::LibrariansRepository,
}

impl Repository {
    /// Create a new repository over the given store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            books: books::BooksRepository::new(store.clone()),
            students: students::StudentsRepository::new(store.clone()),
            transactions: transactions::TransactionsRepository::new(store.clone()),
            librarians: librarians::LibrariansRepository::new(store.clone()),
            store,
        }
    }

    /// Open the backend selected in configuration
    pub async fn connect(config: &StoreConfig) -> AppResult<Self> {
        let store: Arc<dyn DocumentStore> = match config.backend {
            StoreBackend::Memory => Arc::new(memory::MemoryStore::new()),
            StoreBackend::Postgres => Arc::new(postgres::PgDocumentStore::connect(config).await?),
        };
        Ok(Self::new(store))
    }
}
