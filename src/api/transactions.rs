//! Circulation endpoints

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{
        identifier::{CaptureSource, CapturedIdentifier, IdentifierKind},
        transaction::{TransactionOutcome, TransactionPage, TransactionSearch},
    },
};

use super::AuthenticatedUser;

/// Issue/return request
#[derive(Deserialize, ToSchema)]
pub struct SubmitTransactionRequest {
    /// Book identifier, typed or scanned
    pub book_id: String,
    /// Student identifier, typed or scanned
    pub student_id: String,
    /// How the book id was captured (defaults to manual)
    #[serde(default)]
    pub book_source: CaptureSource,
    /// How the student id was captured (defaults to manual)
    #[serde(default)]
    pub student_source: CaptureSource,
}

/// Issue or return a book; the direction follows the book's availability
#[utoipa::path(
    post,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    request_body = SubmitTransactionRequest,
    responses(
        (status = 201, description = "Transaction recorded", body = TransactionOutcome),
        (status = 400, description = "Missing identifier"),
        (status = 404, description = "Unknown book or student"),
        (status = 409, description = "Book changed concurrently, resubmit"),
        (status = 422, description = "Issue quota reached or book not issued to this student"),
        (status = 503, description = "Document store unavailable")
    )
)]
pub async fn submit_transaction(
    State(state): State<crate::AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<SubmitTransactionRequest>,
) -> AppResult<(StatusCode, Json<TransactionOutcome>)> {
    let book = CapturedIdentifier::new(IdentifierKind::Book, &request.book_id, request.book_source)?;
    let student = CapturedIdentifier::new(IdentifierKind::Student, &request.student_id, request.student_source)?;

    tracing::debug!(
        librarian = %claims.sub,
        book_source = ?book.source,
        student_source = ?student.source,
        "Transaction submitted"
    );

    let outcome = state.services.circulation.submit(&book, &student).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Search transaction history by book or student id
#[utoipa::path(
    get,
    path = "/transactions",
    tag = "transactions",
    security(("bearer_auth" = [])),
    params(TransactionSearch),
    responses(
        (status = 200, description = "Page of transactions", body = TransactionPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn search_transactions(
    State(state): State<crate::AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(search): Query<TransactionSearch>,
) -> AppResult<Json<TransactionPage>> {
    let page = state.services.history.search(search).await?;
    Ok(Json(page))
}
