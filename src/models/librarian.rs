//! Librarian account model and JWT claims

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Librarian document from the `librarians` collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Librarian {
    pub email: String,
    /// Hashed password (argon2)
    pub password_hash: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Login request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// JWT claims for an authenticated librarian
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarianClaims {
    pub sub: String,
    pub name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

impl LibrarianClaims {
    /// Create a new JWT token
    pub fn create_token(&self, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{encode, EncodingKey, Header};
        encode(
            &Header::default(),
            self,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
    }

    /// Parse JWT token
    pub fn from_token(token: &str, secret: &str) -> Result<Self, jsonwebtoken::errors::Error> {
        use jsonwebtoken::{decode, DecodingKey, Validation};
        let token_data = decode::<Self>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(token_data.claims)
    }
}
