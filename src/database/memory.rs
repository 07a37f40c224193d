// src/database/memory.rs
use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{
    Collection, Document, DocumentStore, Filter, FindOptions, Sort, SortDirection,
    StoredDocument, UpdateOutcome,
};
use crate::errors::StoreError;

#[derive(Debug, Default)]
struct Collections {
    next_id: u64,
    documents: HashMap<Collection, Vec<StoredDocument>>,
}

impl Collections {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }
}

/// In-process document store, used in tests and for local runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Collections>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection
    pub async fn count(&self, collection: Collection) -> usize {
        let inner = self.inner.lock().await;
        inner.documents.get(&collection).map_or(0, Vec::len)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_one(
        &self,
        collection: Collection,
        document: Document,
    ) -> Result<String, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.allocate_id();
        inner
            .documents
            .entry(collection)
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                body: document,
            });
        Ok(id)
    }

    async fn update_one(
        &self,
        collection: Collection,
        filter: Filter,
        fields: Document,
        upsert: bool,
    ) -> Result<UpdateOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let existing = inner
            .documents
            .entry(collection)
            .or_default()
            .iter_mut()
            .find(|doc| filter.matches(&doc.body));

        if let Some(doc) = existing {
            doc.body.extend(fields);
            return Ok(UpdateOutcome::Matched { id: doc.id.clone() });
        }
        if !upsert {
            return Ok(UpdateOutcome::NoMatch);
        }

        let mut body = filter.into_document();
        body.extend(fields);
        let id = inner.allocate_id();
        inner
            .documents
            .entry(collection)
            .or_default()
            .push(StoredDocument {
                id: id.clone(),
                body,
            });
        Ok(UpdateOutcome::Upserted { id })
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> Result<Vec<StoredDocument>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matched: Vec<StoredDocument> = inner
            .documents
            .get(&collection)
            .map(|docs| {
                docs.iter()
                    .filter(|doc| filter.matches(&doc.body))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        drop(inner);

        if let Some(sort) = &options.sort {
            sort_documents(&mut matched, sort);
        }
        if let Some(limit) = options.limit {
            matched.truncate(usize::try_from(limit).unwrap_or(0));
        }
        Ok(matched)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Missing fields sort before present ones; ties keep insertion order in the
/// requested direction.
fn sort_documents(documents: &mut [StoredDocument], sort: &Sort) {
    documents.sort_by(|a, b| {
        let ordering = compare_values(a.body.get(&sort.field), b.body.get(&sort.field))
            .then_with(|| compare_ids(&a.id, &b.id));
        match sort.direction {
            SortDirection::Ascending => ordering,
            SortDirection::Descending => ordering.reverse(),
        }
    });
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}
