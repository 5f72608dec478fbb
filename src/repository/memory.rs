//! In-memory document store
//!
//! Used for development and tests. A batch commit holds the write lock for
//! its guards and writes, so commits are atomic with respect to each other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{Document, DocumentStore, Order, Query, WriteBatch, WriteOp};
use crate::error::{AppError, AppResult};

type Collections = HashMap<String, Vec<Document>>;

#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<Collections>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

fn not_found(collection: &str, id: &str) -> AppError {
    AppError::NotFound(format!("{}/{} not found", collection, id))
}

fn find_mut<'a>(collections: &'a mut Collections, collection: &str, id: &str) -> AppResult<&'a mut Document> {
    collections
        .get_mut(collection)
        .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
        .ok_or_else(|| not_found(collection, id))
}

fn insert_doc(collections: &mut Collections, collection: &str, id: String, mut data: Value, stamp: Option<&str>) -> Document {
    let created_at = Utc::now();
    if let (Some(field), Value::Object(body)) = (stamp, &mut data) {
        body.insert(field.to_string(), json!(created_at));
    }
    let doc = Document {
        id,
        created_at,
        data,
    };
    collections
        .entry(collection.to_string())
        .or_default()
        .push(doc.clone());
    doc
}

fn merge_fields(collections: &mut Collections, collection: &str, id: &str, fields: Value) -> AppResult<()> {
    let doc = find_mut(collections, collection, id)?;
    let Value::Object(fields) = fields else {
        return Err(AppError::Validation("update fields must be a JSON object".to_string()));
    };
    if !doc.data.is_object() {
        doc.data = Value::Object(Map::new());
    }
    if let Value::Object(body) = &mut doc.data {
        body.extend(fields);
    }
    Ok(())
}

fn increment(collections: &mut Collections, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
    let doc = find_mut(collections, collection, id)?;
    let current = doc.data.get(field).and_then(Value::as_i64).unwrap_or(0);
    match &mut doc.data {
        Value::Object(body) => {
            body.insert(field.to_string(), Value::from(current + delta));
            Ok(())
        }
        _ => Err(AppError::Internal(format!("{}/{} is not an object", collection, id))),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, query: Query) -> AppResult<Vec<Document>> {
        let collections = self.collections.read().await;
        let Some(docs) = collections.get(&query.collection) else {
            return Ok(Vec::new());
        };

        let mut ordered: Box<dyn Iterator<Item = &Document> + Send + '_> = match query.order {
            Order::OldestFirst => Box::new(docs.iter()),
            Order::NewestFirst => Box::new(docs.iter().rev()),
        };

        if let Some(cursor) = &query.start_after {
            // Unknown cursor yields an empty page
            if !docs.iter().any(|d| &d.id == cursor) {
                return Ok(Vec::new());
            }
            for doc in ordered.by_ref() {
                if &doc.id == cursor {
                    break;
                }
            }
        }

        Ok(ordered
            .filter(|d| query.matches(&d.data))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn insert(&self, collection: &str, data: Value) -> AppResult<Document> {
        let mut collections = self.collections.write().await;
        Ok(insert_doc(&mut collections, collection, Uuid::new_v4().to_string(), data, None))
    }

    async fn put(&self, collection: &str, id: &str, data: Value) -> AppResult<Document> {
        let mut collections = self.collections.write().await;
        if let Ok(doc) = find_mut(&mut collections, collection, id) {
            doc.data = data;
            return Ok(doc.clone());
        }
        Ok(insert_doc(&mut collections, collection, id.to_string(), data, None))
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Value) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        merge_fields(&mut collections, collection, id, fields)
    }

    async fn increment_field(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
        let mut collections = self.collections.write().await;
        increment(&mut collections, collection, id, field, delta)
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<Vec<Document>> {
        let mut collections = self.collections.write().await;

        for guard in &batch.guards {
            let current = collections
                .get(&guard.collection)
                .and_then(|docs| docs.iter().find(|d| d.id == guard.id));
            if !guard.holds(current) {
                return Err(guard.conflict());
            }
        }

        // Validate targets up front so a failing write leaves nothing behind
        for op in &batch.ops {
            match op {
                WriteOp::Insert { .. } => {}
                WriteOp::UpdateFields { collection, id, .. } | WriteOp::Increment { collection, id, .. } => {
                    find_mut(&mut collections, collection, id)?;
                }
            }
        }

        let mut inserted = Vec::new();
        for op in batch.ops {
            match op {
                WriteOp::Insert { collection, data, stamp } => {
                    inserted.push(insert_doc(
                        &mut collections,
                        &collection,
                        Uuid::new_v4().to_string(),
                        data,
                        stamp.as_deref(),
                    ));
                }
                WriteOp::UpdateFields { collection, id, fields } => {
                    merge_fields(&mut collections, &collection, &id, fields)?;
                }
                WriteOp::Increment { collection, id, field, delta } => {
                    increment(&mut collections, &collection, &id, &field, delta)?;
                }
            }
        }
        Ok(inserted)
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }
}
