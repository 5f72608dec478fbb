//! Book issue and return workflow

use std::time::Duration;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult, CirculationError},
    models::{
        identifier::CapturedIdentifier,
        transaction::{TransactionEntry, TransactionOutcome, TransactionType},
    },
    repository::Repository,
    services::eligibility,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    config: CirculationConfig,
}

impl CirculationService {
    pub fn new(repository: Repository, config: CirculationConfig) -> Self {
        Self { repository, config }
    }

    /// Issue or return a book from raw (typed or scanned) identifiers
    pub async fn submit_transaction(&self, book_id: &str, student_id: &str) -> AppResult<TransactionOutcome> {
        let book = CapturedIdentifier::book(book_id)?;
        let student = CapturedIdentifier::student(student_id)?;
        self.submit(&book, &student).await
    }

    /// Issue or return a book.
    ///
    /// The direction is derived from the book's current availability; the
    /// whole lookup-check-commit sequence is bounded by the configured timeout.
    pub async fn submit(
        &self,
        book: &CapturedIdentifier,
        student: &CapturedIdentifier,
    ) -> AppResult<TransactionOutcome> {
        let limit = Duration::from_secs(self.config.request_timeout_secs);

        match tokio::time::timeout(limit, self.process(book.as_str(), student.as_str())).await {
            Ok(result) => {
                match &result {
                    Err(e) if e.is_store_failure() => {
                        tracing::error!(
                            book_id = book.as_str(),
                            student_id = student.as_str(),
                            "Transaction failed: {}",
                            e
                        );
                    }
                    Err(e) => {
                        tracing::warn!(
                            book_id = book.as_str(),
                            student_id = student.as_str(),
                            "Transaction refused: {}",
                            e
                        );
                    }
                    Ok(_) => {}
                }
                result
            }
            Err(_) => {
                tracing::error!(
                    book_id = book.as_str(),
                    student_id = student.as_str(),
                    "Transaction timed out after {:?}",
                    limit
                );
                Err(AppError::StoreUnavailable(format!(
                    "transaction timed out after {}s",
                    limit.as_secs()
                )))
            }
        }
    }

    async fn process(&self, book_id: &str, student_id: &str) -> AppResult<TransactionOutcome> {
        let book = self
            .repository
            .books
            .get_by_book_id(book_id)
            .await?
            .ok_or_else(|| CirculationError::UnknownBook {
                book_id: book_id.to_string(),
            })?;

        // Looked up for display; absence only matters once eligibility is checked
        let student = self.repository.students.get_by_student_id(student_id).await?;

        let direction = eligibility::direction_for(&book.value);
        tracing::debug!(book_id, student_id, %direction, "Resolved transaction direction");

        match direction {
            TransactionType::Issue => {
                eligibility::check_issue(
                    student_id,
                    student.as_ref().map(|s| &s.value),
                    self.config.max_books_per_student,
                )?;
            }
            TransactionType::Return => {
                let latest = self.repository.transactions.latest_for_book(book_id).await?;
                eligibility::check_return(book_id, student_id, latest.as_ref())?;
            }
        }

        let student = student.ok_or_else(|| CirculationError::UnknownStudent {
            student_id: student_id.to_string(),
        })?;

        if direction == TransactionType::Return && student.value.number_of_books_issued <= 0 {
            tracing::warn!(
                student_id,
                issued = student.value.number_of_books_issued,
                "Returning a book for a student with no recorded issues"
            );
        }

        let entry = TransactionEntry {
            student_id: student_id.to_string(),
            student_name: student.value.name().to_string(),
            book_id: book_id.to_string(),
            book_name: book.value.name().to_string(),
            transaction_type: direction,
        };

        let record = self
            .repository
            .transactions
            .commit(&book, &student, entry)
            .await?;

        tracing::info!(
            transaction_id = %record.id,
            book_id,
            student_id,
            %direction,
            "Transaction recorded"
        );

        Ok(TransactionOutcome {
            message: direction.confirmation().to_string(),
            transaction_id: record.id,
            transaction_type: direction,
            book_id: record.book_id,
            book_name: record.book_name,
            student_id: record.student_id,
            student_name: record.student_name,
            date: record.date,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::{json, Value};
    use tokio_test::{assert_err, assert_ok};

    use crate::repository::{
        memory::MemoryStore,
        store::{Document, DocumentStore, MockDocumentStore, Query, WriteBatch, BOOKS, STUDENTS, TRANSACTIONS},
    };

    async fn desk() -> (CirculationService, MemoryStore) {
        let store = MemoryStore::new();
        store
            .put(BOOKS, "B001", json!({"book_id": "B001", "book_details": {"book_name": "The Hobbit"}, "is_book_available": true}))
            .await
            .unwrap();
        store
            .put(BOOKS, "B002", json!({"book_id": "B002", "book_details": {"book_name": "Dune"}, "is_book_available": true}))
            .await
            .unwrap();
        store
            .put(STUDENTS, "S001", json!({"student_id": "S001", "student_details": {"student_name": "Ada"}, "number_of_books_issued": 0}))
            .await
            .unwrap();
        store
            .put(STUDENTS, "S002", json!({"student_id": "S002", "student_details": {"student_name": "Alan"}, "number_of_books_issued": 3}))
            .await
            .unwrap();

        let repository = Repository::new(Arc::new(store.clone()));
        (CirculationService::new(repository, CirculationConfig::default()), store)
    }

    async fn field(store: &MemoryStore, collection: &str, id: &str, name: &str) -> serde_json::Value {
        store
            .get(collection, id)
            .await
            .unwrap()
            .unwrap()
            .field(name)
            .cloned()
            .unwrap()
    }

    /// Snapshot of everything a refused transaction must leave untouched
    async fn state(store: &MemoryStore, book_id: &str, student_id: &str) -> (usize, Value, Option<Value>) {
        let student = store
            .get(STUDENTS, student_id)
            .await
            .unwrap()
            .and_then(|d| d.field("number_of_books_issued").cloned());
        (
            store.count(TRANSACTIONS).await,
            field(store, BOOKS, book_id, "is_book_available").await,
            student,
        )
    }

    #[tokio::test]
    async fn test_issue_then_return() {
        let (service, store) = desk().await;

        let issued = assert_ok!(service.submit_transaction("B001", "S001").await);
        assert_eq!(issued.transaction_type, TransactionType::Issue);
        assert_eq!(issued.book_name, "The Hobbit");
        assert_eq!(issued.student_name, "Ada");
        assert_eq!(issued.message, "Book issued to the student!");
        assert_eq!(field(&store, BOOKS, "B001", "is_book_available").await, json!(false));
        assert_eq!(field(&store, STUDENTS, "S001", "number_of_books_issued").await, json!(1));

        let returned = assert_ok!(service.submit_transaction("B001", "S001").await);
        assert_eq!(returned.transaction_type, TransactionType::Return);
        assert_eq!(returned.message, "Book returned to the library!");
        assert_eq!(field(&store, BOOKS, "B001", "is_book_available").await, json!(true));
        assert_eq!(field(&store, STUDENTS, "S001", "number_of_books_issued").await, json!(0));
        assert_eq!(store.count(TRANSACTIONS).await, 2);
    }

    #[tokio::test]
    async fn test_outcome_date_is_assigned_by_store() {
        let (service, store) = desk().await;
        let before = Utc::now();
        let issued = assert_ok!(service.submit_transaction("B001", "S001").await);

        let doc = store.get(TRANSACTIONS, &issued.transaction_id).await.unwrap().unwrap();
        assert_eq!(issued.date, doc.created_at);
        assert_eq!(doc.field("date"), Some(&json!(doc.created_at)));
        assert!(issued.date >= before);
    }

    #[tokio::test]
    async fn test_return_by_other_student_writes_nothing() {
        let (service, store) = desk().await;
        assert_ok!(service.submit_transaction("B001", "S001").await);
        let before = state(&store, "B001", "S002").await;

        let err = assert_err!(service.submit_transaction("B001", "S002").await);
        assert!(matches!(
            err,
            AppError::Circulation(CirculationError::ReturnMismatch { ref issued_to, .. })
                if issued_to.as_deref() == Some("S001")
        ));
        assert_eq!(state(&store, "B001", "S002").await, before);
        assert_eq!(field(&store, STUDENTS, "S001", "number_of_books_issued").await, json!(1));
    }

    #[tokio::test]
    async fn test_return_without_history_is_mismatch() {
        let (service, store) = desk().await;
        store
            .put(BOOKS, "B003", json!({"book_id": "B003", "book_details": {"book_name": "Matilda"}, "is_book_available": false}))
            .await
            .unwrap();
        let before = state(&store, "B003", "S001").await;

        let err = assert_err!(service.submit_transaction("B003", "S001").await);
        assert!(matches!(
            err,
            AppError::Circulation(CirculationError::ReturnMismatch { issued_to: None, .. })
        ));
        assert_eq!(state(&store, "B003", "S001").await, before);
    }

    #[tokio::test]
    async fn test_return_by_issuer_without_student_record() {
        let (service, store) = desk().await;
        store
            .put(BOOKS, "B003", json!({"book_id": "B003", "book_details": {"book_name": "Matilda"}, "is_book_available": false}))
            .await
            .unwrap();
        store
            .insert(
                TRANSACTIONS,
                json!({
                    "student_id": "S009",
                    "student_name": "Gone",
                    "book_id": "B003",
                    "book_name": "Matilda",
                    "date": Utc::now(),
                    "transaction_type": "issue"
                }),
            )
            .await
            .unwrap();
        let before = state(&store, "B003", "S009").await;
        assert_eq!(before.2, None);

        let err = assert_err!(service.submit_transaction("B003", "S009").await);
        assert!(matches!(
            err,
            AppError::Circulation(CirculationError::UnknownStudent { .. })
        ));
        assert_eq!(state(&store, "B003", "S009").await, before);
    }

    /// Yields before every lookup and commit so concurrent submissions interleave
    struct Interleaving(MemoryStore);

    #[async_trait]
    impl DocumentStore for Interleaving {
        async fn find(&self, query: Query) -> AppResult<Vec<Document>> {
            tokio::task::yield_now().await;
            self.0.find(query).await
        }
        async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
            self.0.get(collection, id).await
        }
        async fn insert(&self, collection: &str, data: Value) -> AppResult<Document> {
            self.0.insert(collection, data).await
        }
        async fn put(&self, collection: &str, id: &str, data: Value) -> AppResult<Document> {
            self.0.put(collection, id, data).await
        }
        async fn update_fields(&self, collection: &str, id: &str, fields: Value) -> AppResult<()> {
            self.0.update_fields(collection, id, fields).await
        }
        async fn increment_field(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
            self.0.increment_field(collection, id, field, delta).await
        }
        async fn commit(&self, batch: WriteBatch) -> AppResult<Vec<Document>> {
            tokio::task::yield_now().await;
            self.0.commit(batch).await
        }
        async fn ping(&self) -> AppResult<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_issues_cannot_pass_quota() {
        let (_, store) = desk().await;
        store
            .update_fields(STUDENTS, "S001", json!({"number_of_books_issued": 2}))
            .await
            .unwrap();
        let service = CirculationService::new(
            Repository::new(Arc::new(Interleaving(store.clone()))),
            CirculationConfig::default(),
        );

        let (a, b) = tokio::join!(
            service.submit_transaction("B001", "S001"),
            service.submit_transaction("B002", "S001"),
        );

        let accepted = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(accepted, 1);
        let refused = a.err().or(b.err()).unwrap();
        assert!(matches!(refused, AppError::Conflict(_)));
        assert!(refused.is_retryable());

        assert_eq!(field(&store, STUDENTS, "S001", "number_of_books_issued").await, json!(3));
        assert_eq!(store.count(TRANSACTIONS).await, 1);
    }

    #[tokio::test]
    async fn test_identifiers_are_trimmed() {
        let (service, _) = desk().await;
        let outcome = service.submit_transaction("  B001 ", "\tS001\n").await.unwrap();
        assert_eq!(outcome.book_id, "B001");
        assert_eq!(outcome.student_id, "S001");
    }

    #[tokio::test]
    async fn test_unknown_book_writes_nothing() {
        let (service, store) = desk().await;
        let err = assert_err!(service.submit_transaction("B404", "S001").await);
        assert!(matches!(
            err,
            AppError::Circulation(CirculationError::UnknownBook { .. })
        ));
        assert_eq!(store.count(TRANSACTIONS).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_student_on_issue() {
        let (service, store) = desk().await;
        let err = service.submit_transaction("B001", "S404").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Circulation(CirculationError::UnknownStudent { .. })
        ));
        assert_eq!(field(&store, BOOKS, "B001", "is_book_available").await, json!(true));
    }

    #[tokio::test]
    async fn test_quota_exceeded() {
        let (service, store) = desk().await;
        let err = service.submit_transaction("B002", "S002").await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Circulation(CirculationError::IssueQuotaExceeded { issued: 3, cap: 3, .. })
        ));
        assert_eq!(store.count(TRANSACTIONS).await, 0);
        assert_eq!(field(&store, STUDENTS, "S002", "number_of_books_issued").await, json!(3));
    }

    #[tokio::test]
    async fn test_blank_identifier_rejected() {
        let (service, _) = desk().await;
        assert!(matches!(
            service.submit_transaction("B001", "  ").await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find()
            .returning(|_| Err(AppError::StoreUnavailable("connection refused".to_string())));
        store.expect_commit().never();

        let service = CirculationService::new(
            Repository::new(Arc::new(store)),
            CirculationConfig::default(),
        );
        let err = service.submit_transaction("B001", "S001").await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_commit_rejected_when_book_changed_underneath() {
        let mut store = MockDocumentStore::new();
        store.expect_find().returning(|query| {
            let data = match query.collection.as_str() {
                "books" => json!({"book_id": "B001", "is_book_available": true}),
                "students" => json!({"student_id": "S001", "number_of_books_issued": 0}),
                _ => return Ok(Vec::new()),
            };
            Ok(vec![Document {
                id: data.get("book_id").or(data.get("student_id")).and_then(|v| v.as_str()).unwrap_or_default().to_string(),
                created_at: Utc::now(),
                data,
            }])
        });
        store.expect_commit().times(1).returning(|batch| {
            assert_eq!(batch.guards.len(), 2);
            assert_eq!(batch.ops.len(), 3);
            Err(batch.guards[0].conflict())
        });

        let service = CirculationService::new(
            Repository::new(Arc::new(store)),
            CirculationConfig::default(),
        );
        let err = service.submit_transaction("B001", "S001").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_store_times_out() {
        #[derive(Clone)]
        struct Stalled;

        #[async_trait::async_trait]
        impl DocumentStore for Stalled {
            async fn find(&self, _query: crate::repository::store::Query) -> AppResult<Vec<Document>> {
                std::future::pending().await
            }
            async fn get(&self, _c: &str, _id: &str) -> AppResult<Option<Document>> {
                std::future::pending().await
            }
            async fn insert(&self, _c: &str, _data: serde_json::Value) -> AppResult<Document> {
                std::future::pending().await
            }
            async fn put(&self, _c: &str, _id: &str, _data: serde_json::Value) -> AppResult<Document> {
                std::future::pending().await
            }
            async fn update_fields(&self, _c: &str, _id: &str, _f: serde_json::Value) -> AppResult<()> {
                std::future::pending().await
            }
            async fn increment_field(&self, _c: &str, _id: &str, _f: &str, _d: i64) -> AppResult<()> {
                std::future::pending().await
            }
            async fn ping(&self) -> AppResult<()> {
                Ok(())
            }
        }

        let service = CirculationService::new(
            Repository::new(Arc::new(Stalled)),
            CirculationConfig {
                request_timeout_secs: 2,
                ..CirculationConfig::default()
            },
        );
        let err = service.submit_transaction("B001", "S001").await.unwrap_err();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
    }
}
