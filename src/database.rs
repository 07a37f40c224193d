//! Document store used by the tracking service.
//!
//! Records live as schemaless JSON documents in named collections. The typed
//! records in [`crate::models`] are mapped to and from [`Document`]s at this
//! boundary, so nothing above it handles raw maps.

mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{Map, Value};

use crate::{errors::StoreError, models::Stored};

pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

/// Schemaless document body
pub type Document = Map<String, Value>;

/// Named collections of the tracking service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Positions,
    Vehicles,
    Routes,
    Status,
    Logins,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Positions => "vehicle_positions",
            Collection::Vehicles => "vehicles",
            Collection::Routes => "routes",
            Collection::Status => "status",
            Collection::Logins => "logins",
        }
    }
}

/// Field equality filter; an empty filter matches every document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(Document);

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by(field: &str, value: impl Into<Value>) -> Self {
        Self::default().and(field, value)
    }

    pub fn and(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn fields(&self) -> &Document {
        &self.0
    }

    pub fn matches(&self, document: &Document) -> bool {
        self.0
            .iter()
            .all(|(field, expected)| document.get(field) == Some(expected))
    }

    pub fn into_document(self) -> Document {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn descending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Descending,
        }
    }

    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            direction: SortDirection::Ascending,
        }
    }
}

/// Options for [`DocumentStore::find`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Option<Sort>,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn sorted(sort: Sort) -> Self {
        Self {
            sort: Some(sort),
            limit: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// A document together with its store-assigned identifier
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub body: Document,
}

/// Result of [`DocumentStore::update_one`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Matched { id: String },
    Upserted { id: String },
    NoMatch,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a document, returning the generated identifier
    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<String, StoreError>;

    /// Set `fields` on the first document matching `filter`. With `upsert`, a
    /// document made of the filter fields and `fields` is inserted if none match.
    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        fields: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError>;

    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Vec<StoredDocument>, StoreError>;

    async fn find_one(
        &self,
        collection: Collection,
        filter: Filter,
        sort: Option<Sort>,
    ) -> Result<Option<StoredDocument>, StoreError> {
        let options = FindOptions {
            sort,
            limit: Some(1),
        };
        Ok(self
            .find(collection, filter, options)
            .await?
            .into_iter()
            .next())
    }

    /// Check that the store is reachable
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Map a typed record onto a document body
pub fn to_document<T: Serialize>(
    collection: Collection,
    record: &T,
) -> Result<Document, StoreError> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::MalformedDocument {
            collection: collection.name(),
            message: format!("expected an object, got {}", other),
        }),
    }
}

/// Map a stored document back onto a typed record
pub fn from_document<T: DeserializeOwned>(
    collection: Collection,
    document: StoredDocument,
) -> Result<Stored<T>, StoreError> {
    let record = serde_json::from_value(Value::Object(document.body)).map_err(|e| {
        StoreError::MalformedDocument {
            collection: collection.name(),
            message: format!("document {}: {}", document.id, e),
        }
    })?;
    Ok(Stored {
        id: document.id,
        record,
    })
}
