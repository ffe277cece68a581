// Vector store module
// Client contract for the external vector database and its backends


pub mod connector;
pub mod lancedb;
pub mod memory;
pub mod params;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{DocvecError, Result};

pub use connector::{connect, connect_with_retry};
pub use memory::MemoryStore;
pub use params::{IndexConfig, IndexKind, Metric, SearchConfig};

pub const ID_FIELD: &str = "id";
pub const VECTOR_FIELD: &str = "embedding";
pub const TEXT_FIELD: &str = "text";
pub const DOC_ID_FIELD: &str = "doc_id";

/// URI selecting the in-process store instead of LanceDB
pub const MEMORY_URI: &str = "memory://";

/// Optional metadata columns a collection may carry next to its vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetadataField {
    /// Chunk text, at most 1024 characters
    Text,
    /// Source document identifier, at most 128 characters
    DocId,
}

impl MetadataField {
    #[inline]
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => TEXT_FIELD,
            Self::DocId => DOC_ID_FIELD,
        }
    }

    #[inline]
    pub fn max_length(self) -> usize {
        match self {
            Self::Text => 1024,
            Self::DocId => 128,
        }
    }
}

/// Schema of a collection: auto-id primary key, fixed-size vector, optional metadata
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: String,
    pub dimension: usize,
    pub metadata_fields: Vec<MetadataField>,
}

impl CollectionSchema {
    /// Vector-only schema
    #[inline]
    pub fn basic(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metadata_fields: Vec::new(),
        }
    }

    /// Schema with `text` and `doc_id` columns, as used by document ingestion
    #[inline]
    pub fn with_metadata(name: impl Into<String>, dimension: usize) -> Self {
        Self {
            name: name.into(),
            dimension,
            metadata_fields: vec![MetadataField::Text, MetadataField::DocId],
        }
    }

    #[inline]
    pub fn has_field(&self, field: MetadataField) -> bool {
        self.metadata_fields.contains(&field)
    }
}

/// A record to insert; the store assigns its identifier
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub vector: Vec<f32>,
    pub text: Option<String>,
    pub doc_id: Option<String>,
}

impl NewRecord {
    #[inline]
    pub fn vector(vector: Vec<f32>) -> Self {
        Self {
            vector,
            text: None,
            doc_id: None,
        }
    }
}

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub id: i64,
    /// Distance under the search metric (lower = more similar)
    pub distance: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Client surface of the external vector database.
///
/// Implementations are shared as `Arc<dyn VectorStore>` and handed to every
/// component that needs store access.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Short backend name for logs and health output
    fn backend(&self) -> &'static str;

    async fn list_collections(&self) -> Result<Vec<String>>;

    /// Read back the schema of an existing collection
    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema>;

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()>;

    /// Bulk insert, all-or-nothing. Returns the number of inserted records.
    async fn insert(&self, collection: &str, records: Vec<NewRecord>) -> Result<usize>;

    /// Build the vector index, replacing any existing one
    async fn create_index(&self, collection: &str, config: &IndexConfig) -> Result<()>;

    /// Make the collection searchable. Repeatable.
    async fn load(&self, collection: &str) -> Result<()>;

    /// Nearest neighbours of `query`, ordered by non-decreasing distance
    async fn search(
        &self,
        collection: &str,
        query: &[f32],
        limit: usize,
        params: &SearchConfig,
        include_text: bool,
    ) -> Result<Vec<SearchHit>>;
}

/// Check a batch against a collection schema before anything is written
#[inline]
pub fn validate_records(schema: &CollectionSchema, records: &[NewRecord]) -> Result<()> {
    for record in records {
        if record.vector.len() != schema.dimension {
            return Err(DocvecError::DimensionMismatch {
                expected: schema.dimension,
                actual: record.vector.len(),
            });
        }
        check_field(schema, MetadataField::Text, record.text.as_deref())?;
        check_field(schema, MetadataField::DocId, record.doc_id.as_deref())?;
    }
    Ok(())
}

fn check_field(schema: &CollectionSchema, field: MetadataField, value: Option<&str>) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };

    if !schema.has_field(field) {
        return Err(DocvecError::Database(format!(
            "Collection '{}' has no '{}' field",
            schema.name,
            field.name()
        )));
    }

    let length = value.chars().count();
    if length > field.max_length() {
        return Err(DocvecError::Database(format!(
            "Value for '{}' is {} characters, exceeds max length {}",
            field.name(),
            length,
            field.max_length()
        )));
    }

    Ok(())
}
