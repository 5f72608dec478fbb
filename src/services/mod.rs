//! Business logic services

pub mod auth;
pub mod circulation;
pub mod eligibility;
pub mod history;

use crate::{config::AppConfig, error::AppResult, repository::{seed::SeedData, Repository}};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub repository: Repository,
    pub auth: auth::AuthService,
    pub circulation: circulation::CirculationService,
    pub history: history::HistoryService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            auth: auth::AuthService::new(repository.clone(), config.auth.clone()),
            circulation: circulation::CirculationService::new(
                repository.clone(),
                config.circulation.clone(),
            ),
            history: history::HistoryService::new(repository.clone(), config.circulation.page_size),
            repository,
        }
    }

    /// Preload books, students and librarian accounts
    pub async fn apply_seed(&self, seed: SeedData) -> AppResult<()> {
        for book in &seed.books {
            self.repository.books.put(book).await?;
        }
        for student in &seed.students {
            self.repository.students.put(student).await?;
        }
        for librarian in seed.librarians {
            self.auth
                .create_librarian(&librarian.email, &librarian.password, librarian.name)
                .await?;
        }
        tracing::info!(
            books = seed.books.len(),
            students = seed.students.len(),
            "Seed data loaded"
        );
        Ok(())
    }
}
