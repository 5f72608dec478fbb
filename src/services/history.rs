//! Transaction history search

use crate::{
    error::AppResult,
    models::{
        identifier::IdentifierKind,
        transaction::{TransactionPage, TransactionSearch},
    },
    repository::Repository,
};

const MAX_PAGE_SIZE: usize = 100;

#[derive(Clone)]
pub struct HistoryService {
    repository: Repository,
    page_size: usize,
}

impl HistoryService {
    pub fn new(repository: Repository, page_size: usize) -> Self {
        Self {
            repository,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Search transactions by book id (`B...`) or student id (`S...`).
    ///
    /// Terms are upper-cased; an empty term lists every transaction and an
    /// unrecognised prefix matches nothing.
    pub async fn search(&self, search: TransactionSearch) -> AppResult<TransactionPage> {
        let limit = search
            .limit
            .unwrap_or(self.page_size)
            .clamp(1, MAX_PAGE_SIZE);

        let term = search
            .q
            .as_deref()
            .map(|q| q.trim().to_uppercase())
            .filter(|q| !q.is_empty());

        let filter = match &term {
            None => None,
            Some(q) => match IdentifierKind::classify(q) {
                Some(kind) => Some((kind, q.as_str())),
                None => {
                    tracing::debug!(term = %q, "Search term matches neither books nor students");
                    return Ok(TransactionPage {
                        items: Vec::new(),
                        next_cursor: None,
                    });
                }
            },
        };

        let items = self
            .repository
            .transactions
            .list(filter, search.after, limit)
            .await?;

        let next_cursor = if items.len() == limit {
            items.last().map(|t| t.id.clone())
        } else {
            None
        };

        Ok(TransactionPage { items, next_cursor })
    }
}
