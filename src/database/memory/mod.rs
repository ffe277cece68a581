// In-process vector store
// Exhaustive search over records held in memory. Used by tests and `memory://`.


use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    CollectionSchema, IndexConfig, NewRecord, SearchConfig, SearchHit, VectorStore,
    validate_records,
};
use crate::{DocvecError, Result};

#[derive(Debug)]
struct StoredRecord {
    id: i64,
    vector: Vec<f32>,
    text: Option<String>,
    doc_id: Option<String>,
}

#[derive(Debug)]
struct MemoryCollection {
    schema: CollectionSchema,
    records: Vec<StoredRecord>,
    index: Option<IndexConfig>,
    loaded: bool,
}

/// Vector store keeping every collection in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

impl MemoryStore {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records in a collection
    #[inline]
    pub async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;
        Ok(entry.records.len())
    }

    /// Index configuration currently built on a collection, if any
    #[inline]
    pub async fn index_config(&self, collection: &str) -> Result<Option<IndexConfig>> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;
        Ok(entry.index)
    }

    /// Document ids of all records, in insertion order
    #[inline]
    pub async fn doc_ids(&self, collection: &str) -> Result<Vec<Option<String>>> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;
        Ok(entry
            .records
            .iter()
            .map(|record| record.doc_id.clone())
            .collect())
    }
}

fn not_found(collection: &str) -> DocvecError {
    DocvecError::Database(format!("Collection '{}' does not exist", collection))
}

#[async_trait]
impl VectorStore for MemoryStore {
    #[inline]
    fn backend(&self) -> &'static str {
        "memory"
    }

    #[inline]
    async fn list_collections(&self) -> Result<Vec<String>> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort_unstable();
        Ok(names)
    }

    #[inline]
    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        let collections = self.collections.read().await;
        collections
            .get(name)
            .map(|entry| entry.schema.clone())
            .ok_or_else(|| not_found(name))
    }

    #[inline]
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        if schema.dimension == 0 {
            return Err(DocvecError::Database(
                "Vector dimension must be positive".to_string(),
            ));
        }

        let mut collections = self.collections.write().await;
        if collections.contains_key(&schema.name) {
            return Err(DocvecError::Database(format!(
                "Collection '{}' already exists",
                schema.name
            )));
        }

        collections.insert(
            schema.name.clone(),
            MemoryCollection {
                schema: schema.clone(),
                records: Vec::new(),
                index: None,
                loaded: false,
            },
        );
        info!("Created in-memory collection '{}'", schema.name);
        Ok(())
    }

    #[inline]
    async fn insert(&self, collection: &str, records: Vec<NewRecord>) -> Result<usize> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        validate_records(&entry.schema, &records)?;

        let inserted = records.len();
        for record in records {
            let id = entry.records.len() as i64;
            entry.records.push(StoredRecord {
                id,
                vector: record.vector,
                text: record.text,
                doc_id: record.doc_id,
            });
        }

        debug!("Inserted {} records into '{}'", inserted, collection);
        Ok(inserted)
    }

    #[inline]
    async fn create_index(&self, collection: &str, config: &IndexConfig) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;

        entry.index = Some(*config);
        debug!(
            "Indexed '{}' with {} ({}, {} partitions)",
            collection, config.kind, config.metric, config.partitions
        );
        Ok(())
    }

    #[inline]
    async fn load(&self, collection: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let entry = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(collection))?;
        entry.loaded = true;
        Ok(())
    }

    #[inline]
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        params: &SearchConfig,
        include_text: bool,
    ) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let entry = collections
            .get(collection)
            .ok_or_else(|| not_found(collection))?;

        if !entry.loaded {
            return Err(DocvecError::Database(format!(
                "Collection '{}' is not loaded",
                collection
            )));
        }
        if query.len() != entry.schema.dimension {
            return Err(DocvecError::DimensionMismatch {
                expected: entry.schema.dimension,
                actual: query.len(),
            });
        }
        if let Some(index) = entry.index.filter(|index| index.metric != params.metric) {
            return Err(DocvecError::Database(format!(
                "Search metric {} does not match index metric {}",
                params.metric, index.metric
            )));
        }

        let mut hits: Vec<SearchHit> = entry
            .records
            .iter()
            .map(|record| SearchHit {
                id: record.id,
                distance: params.metric.distance(query, &record.vector),
                text: if include_text {
                    record.text.clone()
                } else {
                    None
                },
            })
            .collect();

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}
