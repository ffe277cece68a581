// LanceDB vector database module
// Each collection is a Lance table: id, embedding and optional text/doc_id columns


use arrow::array::{
    Array, ArrayRef, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator,
    StringArray,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    index::{Index, vector::IvfFlatIndexBuilder},
    query::{ExecutableQuery, QueryBase, Select},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::{
    CollectionSchema, DOC_ID_FIELD, ID_FIELD, IndexConfig, MetadataField, Metric, NewRecord,
    SearchConfig, SearchHit, TEXT_FIELD, VECTOR_FIELD, VectorStore, validate_records,
};
use crate::{DocvecError, Result};

/// Vector store backed by a LanceDB database directory
pub struct LanceStore {
    connection: Connection,
    uri: String,
    // Serializes inserts so that row-count based ids stay unique
    write_lock: Mutex<()>,
    indexes: RwLock<HashMap<String, IndexConfig>>,
}

impl std::fmt::Debug for LanceStore {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LanceStore").field("uri", &self.uri).finish()
    }
}

impl LanceStore {
    /// Open (or create) the database at `uri`
    ///
    /// Plain filesystem paths get their directory created first.
    #[inline]
    pub async fn open(uri: &str) -> Result<Self> {
        if !uri.contains("://") {
            std::fs::create_dir_all(uri).map_err(|e| {
                DocvecError::Connection(format!(
                    "Failed to create vector database directory {}: {}",
                    uri, e
                ))
            })?;
        }

        debug!("Connecting to LanceDB at {}", uri);
        let connection = lancedb::connect(uri).execute().await.map_err(|e| {
            DocvecError::Connection(format!("Failed to connect to LanceDB: {}", e))
        })?;

        Ok(Self {
            connection,
            uri: uri.to_string(),
            write_lock: Mutex::new(()),
            indexes: RwLock::new(HashMap::new()),
        })
    }

    async fn open_table(&self, name: &str) -> Result<lancedb::Table> {
        self.connection
            .open_table(name)
            .execute()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to open table '{}': {}", name, e)))
    }

    async fn row_count(table: &lancedb::Table) -> Result<usize> {
        table
            .count_rows(None)
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to count rows: {}", e)))
    }
}

fn vector_item_field() -> Arc<Field> {
    Arc::new(Field::new("item", DataType::Float32, true))
}

/// Arrow schema for a collection
fn arrow_schema(schema: &CollectionSchema) -> Result<Arc<Schema>> {
    let dimension = i32::try_from(schema.dimension).map_err(|_| {
        DocvecError::Database(format!("Vector dimension {} is too large", schema.dimension))
    })?;

    let mut fields = vec![
        Field::new(ID_FIELD, DataType::Int64, false),
        Field::new(
            VECTOR_FIELD,
            DataType::FixedSizeList(vector_item_field(), dimension),
            false,
        ),
    ];
    for field in &schema.metadata_fields {
        fields.push(Field::new(field.name(), DataType::Utf8, true));
    }
    Ok(Arc::new(Schema::new(fields)))
}

/// Rebuild a `CollectionSchema` from a table's Arrow schema
fn collection_schema(name: &str, schema: &Schema) -> Result<CollectionSchema> {
    let mut dimension = None;
    let mut metadata_fields = Vec::new();

    for field in schema.fields() {
        match (field.name().as_str(), field.data_type()) {
            (VECTOR_FIELD, DataType::FixedSizeList(_, size)) => {
                dimension = usize::try_from(*size).ok();
            }
            (TEXT_FIELD, _) => metadata_fields.push(MetadataField::Text),
            (DOC_ID_FIELD, _) => metadata_fields.push(MetadataField::DocId),
            _ => {}
        }
    }

    let dimension = dimension.ok_or_else(|| {
        DocvecError::Database(format!(
            "Table '{}' has no fixed-size '{}' column",
            name, VECTOR_FIELD
        ))
    })?;

    Ok(CollectionSchema {
        name: name.to_string(),
        dimension,
        metadata_fields,
    })
}

/// Build a RecordBatch for `records`, numbering ids from `first_id`
fn record_batch(
    schema: &CollectionSchema,
    records: &[NewRecord],
    first_id: i64,
) -> Result<RecordBatch> {
    let arrow_schema = arrow_schema(schema)?;
    let len = records.len();

    let ids: Vec<i64> = (0..len as i64).map(|i| first_id + i).collect();

    let mut flat_values = Vec::with_capacity(len * schema.dimension);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }
    let vector_array = FixedSizeListArray::try_new(
        vector_item_field(),
        schema.dimension as i32,
        Arc::new(Float32Array::from(flat_values)),
        None,
    )
    .map_err(|e| DocvecError::Database(format!("Failed to create vector array: {}", e)))?;

    let mut arrays: Vec<ArrayRef> = vec![Arc::new(Int64Array::from(ids)), Arc::new(vector_array)];
    for field in &schema.metadata_fields {
        let values: Vec<Option<&str>> = records
            .iter()
            .map(|record| match field {
                MetadataField::Text => record.text.as_deref(),
                MetadataField::DocId => record.doc_id.as_deref(),
            })
            .collect();
        arrays.push(Arc::new(StringArray::from(values)));
    }

    RecordBatch::try_new(arrow_schema, arrays)
        .map_err(|e| DocvecError::Database(format!("Failed to create record batch: {}", e)))
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::L2 => DistanceType::L2,
        Metric::Cosine => DistanceType::Cosine,
        Metric::Ip => DistanceType::Dot,
    }
}

/// Convert one result batch into hits
fn parse_search_batch(batch: &RecordBatch, include_text: bool) -> Result<Vec<SearchHit>> {
    let ids = batch
        .column_by_name(ID_FIELD)
        .ok_or_else(|| DocvecError::Database("Missing id column".to_string()))?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| DocvecError::Database("Invalid id column type".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .ok_or_else(|| DocvecError::Database("Missing _distance column".to_string()))?
        .as_any()
        .downcast_ref::<Float32Array>()
        .ok_or_else(|| DocvecError::Database("Invalid _distance column type".to_string()))?;

    let texts = if include_text {
        batch
            .column_by_name(TEXT_FIELD)
            .and_then(|col| col.as_any().downcast_ref::<StringArray>())
    } else {
        None
    };

    let hits = (0..batch.num_rows())
        .map(|row| SearchHit {
            id: ids.value(row),
            distance: distances.value(row),
            text: texts
                .filter(|texts| !texts.is_null(row))
                .map(|texts| texts.value(row).to_string()),
        })
        .collect();
    Ok(hits)
}

#[async_trait]
impl VectorStore for LanceStore {
    #[inline]
    fn backend(&self) -> &'static str {
        "lancedb"
    }

    #[inline]
    async fn list_collections(&self) -> Result<Vec<String>> {
        self.connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to list tables: {}", e)))
    }

    #[inline]
    async fn describe_collection(&self, name: &str) -> Result<CollectionSchema> {
        let table = self.open_table(name).await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to get table schema: {}", e)))?;
        collection_schema(name, &schema)
    }

    #[inline]
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<()> {
        if schema.dimension == 0 {
            return Err(DocvecError::Database(
                "Vector dimension must be positive".to_string(),
            ));
        }

        self.connection
            .create_empty_table(&schema.name, arrow_schema(schema)?)
            .execute()
            .await
            .map_err(|e| {
                DocvecError::Database(format!(
                    "Failed to create table '{}': {}",
                    schema.name, e
                ))
            })?;

        info!(
            "Created table '{}' with {} dimensions",
            schema.name, schema.dimension
        );
        Ok(())
    }

    #[inline]
    async fn insert(&self, collection: &str, records: Vec<NewRecord>) -> Result<usize> {
        let schema = self.describe_collection(collection).await?;
        validate_records(&schema, &records)?;
        if records.is_empty() {
            debug!("No records to insert into '{}'", collection);
            return Ok(0);
        }

        let _guard = self.write_lock.lock().await;
        let table = self.open_table(collection).await?;
        let first_id = Self::row_count(&table).await? as i64;

        let batch = record_batch(&schema, &records, first_id)?;
        let batch_schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to insert records: {}", e)))?;

        debug!("Inserted {} records into '{}'", records.len(), collection);
        Ok(records.len())
    }

    #[inline]
    async fn create_index(&self, collection: &str, config: &IndexConfig) -> Result<()> {
        let table = self.open_table(collection).await?;
        let rows = Self::row_count(&table).await?;
        if rows == 0 {
            info!("Skipping index build on empty table '{}'", collection);
            self.indexes
                .write()
                .await
                .insert(collection.to_string(), *config);
            return Ok(());
        }

        // IVF training needs at least one row per partition
        let partitions = config
            .partitions
            .min(u32::try_from(rows).unwrap_or(u32::MAX));
        if partitions < config.partitions {
            debug!(
                "Reducing partitions from {} to {} for {} rows",
                config.partitions, partitions, rows
            );
        }

        let builder = IvfFlatIndexBuilder::default()
            .distance_type(distance_type(config.metric))
            .num_partitions(partitions);
        table
            .create_index(&[VECTOR_FIELD], Index::IvfFlat(builder))
            .replace(true)
            .execute()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to create vector index: {}", e)))?;

        self.indexes
            .write()
            .await
            .insert(collection.to_string(), *config);
        info!(
            "Built {} index on '{}' ({}, {} partitions)",
            config.kind, collection, config.metric, partitions
        );
        Ok(())
    }

    #[inline]
    async fn load(&self, collection: &str) -> Result<()> {
        // Lance tables are searchable as soon as they open
        let table = self.open_table(collection).await?;
        let rows = Self::row_count(&table).await?;
        debug!("Loaded '{}' with {} rows", collection, rows);
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
        let schema = self.describe_collection(collection).await?;
        if query.len() != schema.dimension {
            return Err(DocvecError::DimensionMismatch {
                expected: schema.dimension,
                actual: query.len(),
            });
        }
        let indexed = self.indexes.read().await.get(collection).copied();
        if let Some(index) = indexed.filter(|index| index.metric != params.metric) {
            return Err(DocvecError::Database(format!(
                "Search metric {} does not match index metric {}",
                params.metric, index.metric
            )));
        }

        let include_text = include_text && schema.has_field(MetadataField::Text);
        let columns: &[&str] = if include_text {
            &[ID_FIELD, TEXT_FIELD]
        } else {
            &[ID_FIELD]
        };

        let table = self.open_table(collection).await?;
        let mut results = table
            .vector_search(query)
            .map_err(|e| DocvecError::Database(format!("Failed to create vector search: {}", e)))?
            .column(VECTOR_FIELD)
            .distance_type(distance_type(params.metric))
            .nprobes(params.probes as usize)
            .select(Select::columns(columns))
            .limit(limit)
            .execute()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| DocvecError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(parse_search_batch(&batch, include_text)?);
        }

        if hits.len() > limit {
            warn!("Search returned {} rows for limit {}", hits.len(), limit);
        }
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance).then(a.id.cmp(&b.id)));
        hits.truncate(limit);
        Ok(hits)
    }
}
