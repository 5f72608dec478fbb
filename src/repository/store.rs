//! Document store abstraction
//!
//! Books, students, transactions and librarians are kept as schema-flexible
//! JSON documents grouped in named collections. Backends implement
//! [`DocumentStore`]; typed repositories sit on top of it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AppError, AppResult};

pub const BOOKS: &str = "books";
pub const STUDENTS: &str = "students";
pub const TRANSACTIONS: &str = "transactions";
pub const LIBRARIANS: &str = "librarians";

/// A stored document with its store-managed metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub data: Value,
}

impl Document {
    /// Deserialize the document body into a model
    pub fn decode<T: DeserializeOwned>(&self) -> AppResult<Stored<T>> {
        Ok(Stored {
            id: self.id.clone(),
            created_at: self.created_at,
            value: serde_json::from_value(self.data.clone())?,
        })
    }

    /// Top-level field of the document body
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

/// A decoded model together with the id of the document it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub value: T,
}

/// Result ordering by insertion time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Order {
    #[default]
    OldestFirst,
    NewestFirst,
}

/// Query over a single collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    /// Top-level field equality filter
    pub filter: Option<(String, Value)>,
    pub order: Order,
    pub limit: Option<usize>,
    /// Only return documents positioned after this document id in `order`
    pub start_after: Option<String>,
}

impl Query {
    pub fn collection(name: &str) -> Self {
        Self {
            collection: name.to_string(),
            filter: None,
            order: Order::OldestFirst,
            limit: None,
            start_after: None,
        }
    }

    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filter = Some((field.to_string(), value.into()));
        self
    }

    pub fn newest_first(mut self) -> Self {
        self.order = Order::NewestFirst;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn start_after(mut self, id: Option<String>) -> Self {
        self.start_after = id;
        self
    }

    /// Whether a document body passes the equality filter
    pub fn matches(&self, data: &Value) -> bool {
        match &self.filter {
            Some((field, value)) => data.get(field) == Some(value),
            None => true,
        }
    }
}

/// A single write inside a [`WriteBatch`]
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    Insert {
        collection: String,
        data: Value,
        /// Field set to the document's creation timestamp by the store
        stamp: Option<String>,
    },
    UpdateFields {
        collection: String,
        id: String,
        fields: Value,
    },
    Increment {
        collection: String,
        id: String,
        field: String,
        delta: i64,
    },
}

/// Precondition checked before a batch is applied
#[derive(Debug, Clone, PartialEq)]
pub struct Guard {
    pub collection: String,
    pub id: String,
    pub field: String,
    pub expected: Value,
    /// Value the field is read as when the document lacks it
    pub absent_as: Option<Value>,
}

impl Guard {
    /// The document exists and its field still has the expected value
    pub fn holds(&self, doc: Option<&Document>) -> bool {
        let Some(doc) = doc else {
            return false;
        };
        match doc.field(&self.field) {
            Some(value) => value == &self.expected,
            None => self.absent_as.as_ref() == Some(&self.expected),
        }
    }

    pub fn conflict(&self) -> AppError {
        AppError::Conflict(format!(
            "{}/{} changed while the request was processed, please resubmit",
            self.collection, self.id
        ))
    }
}

/// Related writes submitted together
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pub guards: Vec<Guard>,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expect(mut self, collection: &str, id: &str, field: &str, expected: impl Into<Value>) -> Self {
        self.guards.push(Guard {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            expected: expected.into(),
            absent_as: None,
        });
        self
    }

    /// Guard an integer counter; a missing field counts as zero, as in `increment`
    pub fn expect_count(mut self, collection: &str, id: &str, field: &str, expected: i64) -> Self {
        self.guards.push(Guard {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            expected: expected.into(),
            absent_as: Some(Value::from(0)),
        });
        self
    }

    pub fn insert(mut self, collection: &str, data: Value) -> Self {
        self.ops.push(WriteOp::Insert {
            collection: collection.to_string(),
            data,
            stamp: None,
        });
        self
    }

    /// Insert with `stamp` set to the creation timestamp assigned by the store
    pub fn insert_stamped(mut self, collection: &str, stamp: &str, data: Value) -> Self {
        self.ops.push(WriteOp::Insert {
            collection: collection.to_string(),
            data,
            stamp: Some(stamp.to_string()),
        });
        self
    }

    pub fn update_fields(mut self, collection: &str, id: &str, fields: Value) -> Self {
        self.ops.push(WriteOp::UpdateFields {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        });
        self
    }

    pub fn increment(mut self, collection: &str, id: &str, field: &str, delta: i64) -> Self {
        self.ops.push(WriteOp::Increment {
            collection: collection.to_string(),
            id: id.to_string(),
            field: field.to_string(),
            delta,
        });
        self
    }
}

/// Storage backend for collections of JSON documents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run a query against one collection
    async fn find(&self, query: Query) -> AppResult<Vec<Document>>;

    /// Fetch a document by id
    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>>;

    /// Append a document with a generated id and creation timestamp
    async fn insert(&self, collection: &str, data: Value) -> AppResult<Document>;

    /// Create or replace the document with the given id
    async fn put(&self, collection: &str, id: &str, data: Value) -> AppResult<Document>;

    /// Shallow-merge `fields` into an existing document
    async fn update_fields(&self, collection: &str, id: &str, fields: Value) -> AppResult<()>;

    /// Add `delta` to an integer field (a missing field counts as zero)
    async fn increment_field(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()>;

    /// Check the batch guards, then apply its writes.
    ///
    /// Returns the documents created by `Insert` ops, in order. The default
    /// submits each write independently: a failure part way through leaves
    /// the earlier writes in place.
    async fn commit(&self, batch: WriteBatch) -> AppResult<Vec<Document>> {
        apply_sequentially(self, batch).await
    }

    /// Check that the backend is reachable
    async fn ping(&self) -> AppResult<()>;
}

/// Apply a batch one write at a time, without rollback
pub async fn apply_sequentially<S>(store: &S, batch: WriteBatch) -> AppResult<Vec<Document>>
where
    S: DocumentStore + ?Sized,
{
    for guard in &batch.guards {
        let current = store.get(&guard.collection, &guard.id).await?;
        if !guard.holds(current.as_ref()) {
            return Err(guard.conflict());
        }
    }

    let mut inserted = Vec::new();
    for op in batch.ops {
        match op {
            WriteOp::Insert { collection, mut data, stamp } => {
                if let (Some(field), Value::Object(body)) = (stamp, &mut data) {
                    body.insert(field, serde_json::json!(Utc::now()));
                }
                inserted.push(store.insert(&collection, data).await?);
            }
            WriteOp::UpdateFields { collection, id, fields } => {
                store.update_fields(&collection, &id, fields).await?;
            }
            WriteOp::Increment { collection, id, field, delta } => {
                store.increment_field(&collection, &id, &field, delta).await?;
            }
        }
    }
    Ok(inserted)
}

/// Lookup helpers available on every store
#[async_trait]
pub trait DocumentStoreExt {
    /// First document whose `field` equals `value`
    async fn find_one_by_field(&self, collection: &str, field: &str, value: &str) -> AppResult<Option<Document>>;

    /// Most recently inserted document whose `field` equals `value`
    async fn find_latest_by_field(&self, collection: &str, field: &str, value: &str) -> AppResult<Option<Document>>;
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {
    async fn find_one_by_field(&self, collection: &str, field: &str, value: &str) -> AppResult<Option<Document>> {
        let query = Query::collection(collection).where_eq(field, value).limit(1);
        Ok(self.find(query).await?.into_iter().next())
    }

    async fn find_latest_by_field(&self, collection: &str, field: &str, value: &str) -> AppResult<Option<Document>> {
        let query = Query::collection(collection)
            .where_eq(field, value)
            .newest_first()
            .limit(1);
        Ok(self.find(query).await?.into_iter().next())
    }
}
