// Resource manager
// Idempotent "make sure it exists" operations for collections and indexes


use std::fmt;
use tracing::{debug, info, warn};

use crate::database::{CollectionSchema, IndexConfig, VectorStore};
use crate::{DocvecError, Result};

/// Result of an ensure call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureStatus {
    Created,
    AlreadyExists,
}

impl EnsureStatus {
    /// Human readable status for `collection`
    #[inline]
    pub fn describe(self, collection: &str) -> String {
        match self {
            Self::Created => format!("Collection '{}' created.", collection),
            Self::AlreadyExists => format!("Collection '{}' already exists.", collection),
        }
    }
}

impl fmt::Display for EnsureStatus {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => f.write_str("created"),
            Self::AlreadyExists => f.write_str("already exists"),
        }
    }
}

/// Create the collection unless one with that name exists.
///
/// An existing collection is never modified. Its dimension must match the
/// request; a different metadata field set is only logged.
#[inline]
pub async fn ensure_collection(
    store: &dyn VectorStore,
    schema: &CollectionSchema,
) -> Result<EnsureStatus> {
    let existing = store.list_collections().await?;

    if !existing.contains(&schema.name) {
        store.create_collection(schema).await?;
        info!(
            "Created collection '{}' (dim {}, fields {:?})",
            schema.name, schema.dimension, schema.metadata_fields
        );
        return Ok(EnsureStatus::Created);
    }

    let current = store.describe_collection(&schema.name).await?;
    if current.dimension != schema.dimension {
        return Err(DocvecError::SchemaMismatch {
            collection: schema.name.clone(),
            existing: current.dimension,
            requested: schema.dimension,
        });
    }
    if current.metadata_fields != schema.metadata_fields {
        warn!(
            "Collection '{}' exists with fields {:?}, requested {:?}; leaving it unchanged",
            schema.name, current.metadata_fields, schema.metadata_fields
        );
    }

    debug!("Collection '{}' already exists", schema.name);
    Ok(EnsureStatus::AlreadyExists)
}

/// (Re)build the vector index on `collection`, replacing any existing one
#[inline]
pub async fn ensure_index(
    store: &dyn VectorStore,
    collection: &str,
    config: &IndexConfig,
) -> Result<()> {
    store.create_index(collection, config).await?;
    debug!(
        "Index ensured on '{}' ({} {}, {} partitions)",
        collection, config.kind, config.metric, config.partitions
    );
    Ok(())
}

/// Names of all collections in the store
#[inline]
pub async fn list_collections(store: &dyn VectorStore) -> Result<Vec<String>> {
    let names = store.list_collections().await?;
    debug!("Store lists {} collections", names.len());
    Ok(names)
}

/// Round-trip to the store, reported as a status line rather than an error
#[inline]
pub async fn health_check(store: &dyn VectorStore) -> String {
    match store.list_collections().await {
        Ok(names) => {
            debug!(
                "Health check passed ({} backend, {} collections)",
                store.backend(),
                names.len()
            );
            "Vector store is connected and ready!".to_string()
        }
        Err(e) => {
            warn!("Health check failed: {}", e);
            format!("Vector store connection error: {}", e)
        }
    }
}
