// src/database/postgres.rs
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    postgres::PgPoolOptions, types::Json, Pool, Postgres, QueryBuilder,
};
use tracing::{debug, info};

use super::{
    Collection, Document, DocumentStore, Filter, FindOptions, SortDirection, StoredDocument,
    UpdateOutcome,
};
use crate::errors::{StoreError, TrackerError};

/// PostgreSQL backed document store.
///
/// Every collection shares the `documents` table; bodies are JSONB and
/// filters use containment (`@>`), which is field equality for scalar values.
#[derive(Debug, Clone)]
pub struct PgDocumentStore {
    pool: Pool<Postgres>,
}

impl PgDocumentStore {
    /// Wrap an existing pool and apply pending migrations
    pub async fn new(pool: Pool<Postgres>) -> Result<Self, TrackerError> {
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| TrackerError::MigrationError(e.to_string()))?;

        Ok(Self { pool })
    }

    pub async fn from_url(url: &str, max_connections: u32) -> Result<Self, TrackerError> {
        info!("Connecting to database");
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| TrackerError::DatabaseConnectionError(e.to_string()))?;

        Self::new(pool).await
    }
}

fn into_stored(
    collection: Collection,
    (id, Json(body)): (i64, Json<Value>),
) -> Result<StoredDocument, StoreError> {
    match body {
        Value::Object(body) => Ok(StoredDocument {
            id: id.to_string(),
            body,
        }),
        other => Err(StoreError::MalformedDocument {
            collection: collection.name(),
            message: format!("document {} is not an object: {}", id, other),
        }),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<String, StoreError> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO documents (collection, body) VALUES ($1, $2) RETURNING id",
        )
        .bind(collection.name())
        .bind(Json(Value::Object(document)))
        .fetch_one(&self.pool)
        .await?;

        debug!("Inserted document {} into {}", id, collection.name());
        Ok(id.to_string())
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        fields: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let filter_json = Value::Object(filter.fields().clone());
        let mut tx = self.pool.begin().await?;

        // Serialize concurrent upserts of the same key
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(format!("{}:{}", collection.name(), filter_json))
            .execute(&mut *tx)
            .await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM documents
             WHERE collection = $1 AND body @> $2
             ORDER BY id
             LIMIT 1
             FOR UPDATE",
        )
        .bind(collection.name())
        .bind(Json(&filter_json))
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = match existing {
            Some(id) => {
                sqlx::query("UPDATE documents SET body = body || $1 WHERE id = $2")
                    .bind(Json(Value::Object(fields)))
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                UpdateOutcome::Matched { id: id.to_string() }
            }
            None if upsert => {
                let mut body = filter.into_document();
                body.extend(fields);
                let id: i64 = sqlx::query_scalar(
                    "INSERT INTO documents (collection, body) VALUES ($1, $2) RETURNING id",
                )
                .bind(collection.name())
                .bind(Json(Value::Object(body)))
                .fetch_one(&mut *tx)
                .await?;
                UpdateOutcome::Upserted { id: id.to_string() }
            }
            None => UpdateOutcome::NoMatch,
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let mut query =
            QueryBuilder::<Postgres>::new("SELECT id, body FROM documents WHERE collection = ");
        query.push_bind(collection.name());
        query.push(" AND body @> ");
        query.push_bind(Json(Value::Object(filter.into_document())));

        match options.sort {
            Some(sort) => {
                // Missing fields sort as the smallest value
                let (direction, nulls) = match sort.direction {
                    SortDirection::Ascending => ("ASC", "FIRST"),
                    SortDirection::Descending => ("DESC", "LAST"),
                };
                query.push(" ORDER BY body -> ");
                query.push_bind(sort.field);
                query.push(format!(" {direction} NULLS {nulls}, id {direction}"));
            }
            None => {
                query.push(" ORDER BY id");
            }
        }
        if let Some(limit) = options.limit {
            query.push(" LIMIT ");
            query.push_bind(limit.max(0));
        }

        let rows: Vec<(i64, Json<Value>)> = query.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| into_stored(collection, row))
            .collect()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
