//! PostgreSQL document store
//!
//! Every collection lives in the single `documents` table as JSONB rows.
//! `commit` runs inside one SQL transaction and locks guarded rows with
//! `FOR UPDATE`, so two desks cannot issue the same book concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, Executor, FromRow, Pool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::store::{Document, DocumentStore, Order, Query, WriteBatch, WriteOp};
use crate::{
    config::StoreConfig,
    error::{AppError, AppResult},
};

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    data: Json<Value>,
    created_at: DateTime<Utc>,
}

impl From<DocumentRow> for Document {
    fn from(row: DocumentRow) -> Self {
        Document {
            id: row.id,
            created_at: row.created_at,
            data: row.data.0,
        }
    }
}

#[derive(Clone)]
pub struct PgDocumentStore {
    pool: Pool<Postgres>,
}

impl PgDocumentStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect, then bring the `documents` table up to date
    pub async fn connect(config: &StoreConfig) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect(&config.url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Document store migrations completed");

        Ok(Self::new(pool))
    }
}

async fn insert_row<'e, E>(
    executor: E,
    collection: &str,
    id: &str,
    data: Value,
    stamp: Option<&str>,
) -> AppResult<Document>
where
    E: Executor<'e, Database = Postgres>,
{
    // NOW() is the transaction start time, so the stamp equals created_at
    let row = sqlx::query_as::<_, DocumentRow>(
        r#"
        INSERT INTO documents (collection, id, data)
        VALUES (
            $1,
            $2,
            CASE WHEN $4::text IS NULL THEN $3::jsonb
                 ELSE jsonb_set($3::jsonb, ARRAY[$4::text], to_jsonb(NOW()))
            END
        )
        RETURNING id, data, created_at
        "#,
    )
    .bind(collection)
    .bind(id)
    .bind(Json(data))
    .bind(stamp)
    .fetch_one(executor)
    .await?;
    Ok(row.into())
}

async fn merge_row<'e, E>(executor: E, collection: &str, id: &str, fields: Value) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        "UPDATE documents SET data = data || $3 WHERE collection = $1 AND id = $2",
    )
    .bind(collection)
    .bind(id)
    .bind(Json(fields))
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{}/{} not found", collection, id)));
    }
    Ok(())
}

async fn increment_row<'e, E>(executor: E, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query(
        r#"
        UPDATE documents
        SET data = jsonb_set(
            data,
            ARRAY[$3::text],
            to_jsonb(COALESCE((data ->> $3)::bigint, 0) + $4)
        )
        WHERE collection = $1 AND id = $2
        "#,
    )
    .bind(collection)
    .bind(id)
    .bind(field)
    .bind(delta)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("{}/{} not found", collection, id)));
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn find(&self, query: Query) -> AppResult<Vec<Document>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, data, created_at FROM documents WHERE collection = ");
        builder.push_bind(query.collection.clone());

        if let Some((field, value)) = &query.filter {
            builder.push(" AND data -> ");
            builder.push_bind(field.clone());
            builder.push(" = ");
            builder.push_bind(Json(value.clone()));
        }

        let (cmp, direction) = match query.order {
            Order::OldestFirst => (">", "ASC"),
            Order::NewestFirst => ("<", "DESC"),
        };

        if let Some(cursor) = &query.start_after {
            builder.push(format!(" AND seq {} (SELECT seq FROM documents WHERE collection = ", cmp));
            builder.push_bind(query.collection.clone());
            builder.push(" AND id = ");
            builder.push_bind(cursor.clone());
            builder.push(")");
        }

        builder.push(format!(" ORDER BY seq {}", direction));

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ");
            builder.push_bind(limit as i64);
        }

        let rows = builder
            .build_query_as::<DocumentRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Document::from).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> AppResult<Option<Document>> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, data, created_at FROM documents WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Document::from))
    }

    async fn insert(&self, collection: &str, data: Value) -> AppResult<Document> {
        insert_row(&self.pool, collection, &Uuid::new_v4().to_string(), data, None).await
    }

    async fn put(&self, collection: &str, id: &str, data: Value) -> AppResult<Document> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET data = EXCLUDED.data
            RETURNING id, data, created_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(Json(data))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_fields(&self, collection: &str, id: &str, fields: Value) -> AppResult<()> {
        merge_row(&self.pool, collection, id, fields).await
    }

    async fn increment_field(&self, collection: &str, id: &str, field: &str, delta: i64) -> AppResult<()> {
        increment_row(&self.pool, collection, id, field, delta).await
    }

    async fn commit(&self, batch: WriteBatch) -> AppResult<Vec<Document>> {
        let mut tx = self.pool.begin().await?;

        for guard in &batch.guards {
            let current = sqlx::query_as::<_, DocumentRow>(
                r#"
                SELECT id, data, created_at FROM documents
                WHERE collection = $1 AND id = $2
                FOR UPDATE
                "#,
            )
            .bind(&guard.collection)
            .bind(&guard.id)
            .fetch_optional(&mut *tx)
            .await?
            .map(Document::from);

            if !guard.holds(current.as_ref()) {
                // Dropping the transaction rolls it back
                return Err(guard.conflict());
            }
        }

        let mut inserted = Vec::new();
        for op in batch.ops {
            match op {
                WriteOp::Insert { collection, data, stamp } => {
                    let id = Uuid::new_v4().to_string();
                    inserted.push(insert_row(&mut *tx, &collection, &id, data, stamp.as_deref()).await?);
                }
                WriteOp::UpdateFields { collection, id, fields } => {
                    merge_row(&mut *tx, &collection, &id, fields).await?;
                }
                WriteOp::Increment { collection, id, field, delta } => {
                    increment_row(&mut *tx, &collection, &id, &field, delta).await?;
                }
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}
