//! Development seed data

use std::path::Path;

use serde::Deserialize;

use crate::{
    error::{AppError, AppResult},
    models::{book::Book, student::Student},
};

/// Librarian entry in a seed file; the password is hashed on load
#[derive(Debug, Clone, Deserialize)]
pub struct SeedLibrarian {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Books, students and librarian accounts to preload
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    #[serde(default)]
    pub books: Vec<Book>,
    #[serde(default)]
    pub students: Vec<Student>,
    #[serde(default)]
    pub librarians: Vec<SeedLibrarian>,
}

impl SeedData {
    pub async fn load(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to read seed file {}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&raw)?)
    }
}
