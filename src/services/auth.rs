//! Librarian authentication service

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::librarian::{Librarian, LibrarianClaims},
    repository::Repository,
};

/// Issued token and its lifetime in seconds
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: i64,
    pub librarian: Librarian,
}

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Authenticate a librarian by email and password and return a JWT
    pub async fn login(&self, email: &str, password: &str) -> AppResult<IssuedToken> {
        let email = email.trim();
        let librarian = self
            .repository
            .librarians
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !Self::verify_password(&librarian, password)? {
            tracing::warn!(email, "Rejected login");
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        let now = Utc::now().timestamp();
        let expires_in = self.config.jwt_expiration_hours as i64 * 3600;

        let claims = LibrarianClaims {
            sub: librarian.email.clone(),
            name: librarian.name.clone(),
            exp: now + expires_in,
            iat: now,
        };

        let token = claims
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))?;

        tracing::info!(email, "Librarian logged in");

        Ok(IssuedToken {
            token,
            expires_in,
            librarian,
        })
    }

    /// Validate a bearer token
    pub fn verify_token(&self, token: &str) -> AppResult<LibrarianClaims> {
        LibrarianClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    /// Create or replace a librarian account
    pub async fn create_librarian(&self, email: &str, password: &str, name: Option<String>) -> AppResult<()> {
        let librarian = Librarian {
            email: email.trim().to_string(),
            password_hash: Self::hash_password(password)?,
            name,
        };
        self.repository.librarians.put(&librarian).await
    }

    fn verify_password(librarian: &Librarian, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&librarian.password_hash)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
