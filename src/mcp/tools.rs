//! MCP Tools Implementation
//!
//! One handler per tool. Every handler works through the shared [`Pipeline`]
//! and turns store, embedding and extraction failures into `isError` results.

use crate::DocvecError;
use crate::config::settings::MAX_EMBEDDING_DIMENSION;
use crate::database::params::MAX_TOP_K;
use crate::database::{CollectionSchema, NewRecord, SearchHit};
use crate::embeddings::AsciiEmbedder;
use crate::extract::extract_text_blocking;
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use crate::pipeline::{IngestOutcome, Pipeline, QueryInput};
use crate::resources::{EnsureStatus, ensure_collection, ensure_index, health_check};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error};

type Arguments = Map<String, Value>;

fn required_str<'a>(args: &'a Arguments, key: &str) -> Result<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("Missing required parameter: {}", key))
}

fn optional_string(args: &Arguments, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn usize_or(args: &Arguments, key: &str, default: usize) -> Result<usize> {
    args.get(key).map_or(Ok(default), |value| {
        value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| anyhow!("Parameter {} must be a non-negative integer", key))
    })
}

fn vector_from(value: &Value) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| anyhow!("Expected an array of numbers"))?
        .iter()
        .map(|component| {
            component
                .as_f64()
                .map(|x| x as f32)
                .ok_or_else(|| anyhow!("Vector components must be numbers"))
        })
        .collect()
}

/// Successful status text, or an error result carrying the failure
fn status_result(tool: &str, result: crate::Result<String>) -> CallToolResult {
    match result {
        Ok(text) => CallToolResult::text(text),
        Err(e) => {
            error!("{} failed: {}", tool, e);
            CallToolResult::error(e.to_string())
        }
    }
}

fn collection_name_schema() -> Value {
    json!({
        "type": "string",
        "minLength": 1,
        "description": "Name of the collection"
    })
}

fn top_k_schema(default: usize) -> Value {
    json!({
        "type": "integer",
        "minimum": 1,
        "maximum": MAX_TOP_K,
        "default": default,
        "description": format!("Number of results to return (default: {})", default)
    })
}

fn vector_schema(description: &str) -> Value {
    json!({
        "type": "array",
        "items": {"type": "number"},
        "minItems": 1,
        "description": description
    })
}

/// `create_collection` and `create_collection_with_metadata`
pub struct CreateCollectionHandler {
    pipeline: Arc<Pipeline>,
    with_metadata: bool,
}

impl CreateCollectionHandler {
    /// Vector-only collections
    #[inline]
    pub fn basic(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            with_metadata: false,
        }
    }

    /// Collections carrying chunk text and document id
    #[inline]
    pub fn with_metadata(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            with_metadata: true,
        }
    }

    #[inline]
    pub fn tool_definition(&self) -> Tool {
        let (name, description) = if self.with_metadata {
            (
                "create_collection_with_metadata",
                "Create a collection with text and doc_id fields next to the vector, unless it exists",
            )
        } else {
            (
                "create_collection",
                "Create a vector-only collection, unless it exists",
            )
        };
        let default_dimension = self.pipeline.embedder().dimension();

        Tool {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "name": collection_name_schema(),
                    "dim": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": MAX_EMBEDDING_DIMENSION,
                        "default": default_dimension,
                        "description": format!("Vector dimension (default: {})", default_dimension)
                    }
                },
                "required": ["name"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for CreateCollectionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let name = required_str(&args, "name")?;
        let dimension = usize_or(&args, "dim", self.pipeline.embedder().dimension())?;

        let schema = if self.with_metadata {
            CollectionSchema::with_metadata(name, dimension)
        } else {
            CollectionSchema::basic(name, dimension)
        };

        let status = ensure_collection(self.pipeline.store().as_ref(), &schema)
            .await
            .map(|status| match status {
                EnsureStatus::Created if self.with_metadata => {
                    format!("Collection '{}' with metadata fields created.", name)
                }
                other => other.describe(name),
            });
        Ok(status_result(&params.name, status))
    }
}

/// `insert_vectors`
pub struct InsertVectorsHandler {
    pipeline: Arc<Pipeline>,
}

impl InsertVectorsHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "insert_vectors".to_string(),
            description: Some("Insert raw vectors into a collection".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection_name": collection_name_schema(),
                    "vectors": {
                        "type": "array",
                        "items": vector_schema("One vector"),
                        "minItems": 1,
                        "description": "Vectors to insert, each matching the collection dimension"
                    }
                },
                "required": ["collection_name", "vectors"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for InsertVectorsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let collection = required_str(&args, "collection_name")?;
        let records = args
            .get("vectors")
            .and_then(Value::as_array)
            .ok_or_else(|| anyhow!("Missing required parameter: vectors"))?
            .iter()
            .map(|vector| vector_from(vector).map(NewRecord::vector))
            .collect::<Result<Vec<_>>>()?;

        let status = self
            .pipeline
            .store()
            .insert(collection, records)
            .await
            .map(|count| format!("Inserted {} vectors into '{}'.", count, collection));
        Ok(status_result(&params.name, status))
    }
}

/// `create_index`
pub struct CreateIndexHandler {
    pipeline: Arc<Pipeline>,
}

impl CreateIndexHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "create_index".to_string(),
            description: Some(
                "Build (or rebuild) the vector index of a collection with the configured parameters"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {"collection_name": collection_name_schema()},
                "required": ["collection_name"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for CreateIndexHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let collection = required_str(&args, "collection_name")?;

        let status = ensure_index(
            self.pipeline.store().as_ref(),
            collection,
            self.pipeline.index_config(),
        )
        .await
        .map(|()| format!("Index created on '{}'.", collection));
        Ok(status_result(&params.name, status))
    }
}

/// `load_collection`
pub struct LoadCollectionHandler {
    pipeline: Arc<Pipeline>,
}

impl LoadCollectionHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "load_collection".to_string(),
            description: Some("Make a collection searchable".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {"collection_name": collection_name_schema()},
                "required": ["collection_name"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for LoadCollectionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let collection = required_str(&args, "collection_name")?;

        let status = self
            .pipeline
            .store()
            .load(collection)
            .await
            .map(|()| format!("Collection '{}' loaded.", collection));
        Ok(status_result(&params.name, status))
    }
}

/// `search_vectors` and `search_with_metadata`
pub struct SearchVectorsHandler {
    pipeline: Arc<Pipeline>,
    include_text: bool,
}

impl SearchVectorsHandler {
    /// Results carry id and score only
    #[inline]
    pub fn ids_only(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            include_text: false,
        }
    }

    /// Results also carry the stored chunk text
    #[inline]
    pub fn with_text(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            include_text: true,
        }
    }

    #[inline]
    pub fn tool_definition(&self) -> Tool {
        let (name, description) = if self.include_text {
            (
                "search_with_metadata",
                "Similarity search returning id, score and stored text; lower score is closer",
            )
        } else {
            (
                "search_vectors",
                "Similarity search returning id and score; lower score is closer",
            )
        };

        Tool {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection_name": collection_name_schema(),
                    "query_vector": vector_schema("Query vector"),
                    "top_k": top_k_schema(self.pipeline.search_config().default_top_k)
                },
                "required": ["collection_name", "query_vector"],
                "additionalProperties": false
            }),
        }
    }

    fn render(&self, hits: &[SearchHit]) -> Result<String> {
        let rows: Vec<Value> = hits
            .iter()
            .map(|hit| {
                if self.include_text {
                    json!({"id": hit.id, "score": hit.distance, "text": hit.text})
                } else {
                    json!({"id": hit.id, "score": hit.distance})
                }
            })
            .collect();
        Ok(serde_json::to_string(&rows)?)
    }
}

#[async_trait]
impl ToolHandler for SearchVectorsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let collection = required_str(&args, "collection_name")?;
        let query = vector_from(
            args.get("query_vector")
                .ok_or_else(|| anyhow!("Missing required parameter: query_vector"))?,
        )?;
        let top_k = usize_or(&args, "top_k", self.pipeline.search_config().default_top_k)?;

        debug!(
            "Searching '{}' for top {} (text: {})",
            collection, top_k, self.include_text
        );
        match self
            .pipeline
            .query(collection, QueryInput::Vector(query), top_k, self.include_text)
            .await
        {
            Ok(hits) => Ok(CallToolResult::text(self.render(&hits)?)),
            Err(e) => Ok(status_result(&params.name, Err(e))),
        }
    }
}

/// `extract_text_from_file`
pub struct ExtractTextHandler;

impl ExtractTextHandler {
    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "extract_text_from_file".to_string(),
            description: Some("Extract plain text from a PDF, DOCX or TXT file".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Path of the file to read"
                    }
                },
                "required": ["file_path"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ExtractTextHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let path = PathBuf::from(required_str(&args, "file_path")?);

        // An unsupported type is an answer, not a failure
        let result = match extract_text_blocking(path).await {
            Err(e @ DocvecError::UnsupportedFileType(_)) => Ok(e.to_string()),
            other => other,
        };
        Ok(status_result(&params.name, result))
    }
}

/// `upload_document` and `upload_document_ascii`
pub struct UploadDocumentHandler {
    pipeline: Arc<Pipeline>,
    ascii: bool,
}

impl UploadDocumentHandler {
    /// Embeds with the configured provider
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            ascii: false,
        }
    }

    /// Embeds offline with [`AsciiEmbedder`] sized to the collection
    #[inline]
    pub fn ascii(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            ascii: true,
        }
    }

    #[inline]
    pub fn tool_definition(&self) -> Tool {
        let (name, description) = if self.ascii {
            (
                "upload_document_ascii",
                "Chunk a text and store it with offline character-code embeddings",
            )
        } else {
            (
                "upload_document",
                "Chunk a text, embed the chunks and store them in a collection with text and doc_id fields",
            )
        };

        Tool {
            name: name.to_string(),
            description: Some(description.to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection_name": collection_name_schema(),
                    "text": {"type": "string", "description": "Document text"},
                    "doc_id": {
                        "type": "string",
                        "maxLength": 128,
                        "description": "Optional document id shared by all chunks (default: random UUID)"
                    }
                },
                "required": ["collection_name", "text"],
                "additionalProperties": false
            }),
        }
    }

    async fn upload(
        &self,
        collection: &str,
        text: &str,
        doc_id: Option<String>,
    ) -> crate::Result<String> {
        let outcome = if self.ascii {
            let schema = self
                .pipeline
                .store()
                .describe_collection(collection)
                .await?;
            let embedder = Arc::new(AsciiEmbedder::new(schema.dimension));
            self.pipeline
                .ingest_text_with(embedder, "document", text, collection, doc_id)
                .await?
        } else {
            self.pipeline
                .ingest_text("document", text, collection, doc_id)
                .await?
        };

        let chunks = match outcome {
            IngestOutcome::Ingested { chunks, .. } => chunks,
            IngestOutcome::NoContent { .. } => 0,
        };
        Ok(if self.ascii {
            format!("Uploaded document with {} chunks to '{}'.", chunks, collection)
        } else {
            format!(
                "Uploaded document with {} embedded chunks to '{}'.",
                chunks, collection
            )
        })
    }
}

#[async_trait]
impl ToolHandler for UploadDocumentHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let collection = required_str(&args, "collection_name")?;
        let text = required_str(&args, "text")?;
        let doc_id = optional_string(&args, "doc_id");

        let status = self.upload(collection, text, doc_id).await;
        Ok(status_result(&params.name, status))
    }
}

/// `ingest_file`
pub struct IngestFileHandler {
    pipeline: Arc<Pipeline>,
}

impl IngestFileHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "ingest_file".to_string(),
            description: Some(
                "Extract text from a PDF, DOCX or TXT file, chunk, embed and store it".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "minLength": 1,
                        "description": "Path of the file to ingest"
                    },
                    "collection_name": collection_name_schema(),
                    "doc_id": {
                        "type": "string",
                        "maxLength": 128,
                        "description": "Optional document id shared by all chunks (default: random UUID)"
                    }
                },
                "required": ["file_path", "collection_name"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for IngestFileHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let path = PathBuf::from(required_str(&args, "file_path")?);
        let collection = required_str(&args, "collection_name")?;
        let doc_id = optional_string(&args, "doc_id");

        let status = self
            .pipeline
            .ingest_file(&path, collection, doc_id)
            .await
            .map(|outcome| outcome.to_string());
        Ok(status_result(&params.name, status))
    }
}

/// `query_documents`
pub struct QueryDocumentsHandler {
    pipeline: Arc<Pipeline>,
}

impl QueryDocumentsHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition(&self) -> Tool {
        Tool {
            name: "query_documents".to_string(),
            description: Some(
                "Embed a question and return the closest stored chunks as one text block"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "collection_name": collection_name_schema(),
                    "query": {"type": "string", "description": "Question or search text"},
                    "top_k": top_k_schema(self.pipeline.search_config().default_top_k)
                },
                "required": ["collection_name", "query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for QueryDocumentsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let collection = required_str(&args, "collection_name")?;
        let query = required_str(&args, "query")?;
        let top_k = usize_or(&args, "top_k", self.pipeline.search_config().default_top_k)?;

        let summary = self.pipeline.query_summary(collection, query, top_k).await;
        Ok(status_result(&params.name, summary))
    }
}

/// `list_collections`
pub struct ListCollectionsHandler {
    pipeline: Arc<Pipeline>,
}

impl ListCollectionsHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "list_collections".to_string(),
            description: Some("List the names of all collections".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for ListCollectionsHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        match crate::resources::list_collections(self.pipeline.store().as_ref()).await {
            Ok(names) => Ok(CallToolResult::text(serde_json::to_string(&names)?)),
            Err(e) => Ok(status_result(&params.name, Err(e))),
        }
    }
}

/// `health_check`
pub struct HealthCheckHandler {
    pipeline: Arc<Pipeline>,
}

impl HealthCheckHandler {
    #[inline]
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self { pipeline }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: "health_check".to_string(),
            description: Some("Check that the vector store answers".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for HealthCheckHandler {
    #[inline]
    async fn handle(&self, _params: CallToolParams) -> Result<CallToolResult> {
        Ok(CallToolResult::text(
            health_check(self.pipeline.store().as_ref()).await,
        ))
    }
}

/// Register every tool backed by `pipeline`
#[inline]
pub async fn register_default_tools(server: &McpServer, pipeline: &Arc<Pipeline>) -> Result<()> {
    let basic = CreateCollectionHandler::basic(Arc::clone(pipeline));
    server.register_tool(basic.tool_definition(), basic).await?;
    let with_metadata = CreateCollectionHandler::with_metadata(Arc::clone(pipeline));
    server
        .register_tool(with_metadata.tool_definition(), with_metadata)
        .await?;

    server
        .register_tool(
            InsertVectorsHandler::tool_definition(),
            InsertVectorsHandler::new(Arc::clone(pipeline)),
        )
        .await?;
    server
        .register_tool(
            CreateIndexHandler::tool_definition(),
            CreateIndexHandler::new(Arc::clone(pipeline)),
        )
        .await?;
    server
        .register_tool(
            LoadCollectionHandler::tool_definition(),
            LoadCollectionHandler::new(Arc::clone(pipeline)),
        )
        .await?;

    let search = SearchVectorsHandler::ids_only(Arc::clone(pipeline));
    server.register_tool(search.tool_definition(), search).await?;
    let search_text = SearchVectorsHandler::with_text(Arc::clone(pipeline));
    server
        .register_tool(search_text.tool_definition(), search_text)
        .await?;

    server
        .register_tool(ExtractTextHandler::tool_definition(), ExtractTextHandler)
        .await?;

    let upload = UploadDocumentHandler::new(Arc::clone(pipeline));
    server.register_tool(upload.tool_definition(), upload).await?;
    let upload_ascii = UploadDocumentHandler::ascii(Arc::clone(pipeline));
    server
        .register_tool(upload_ascii.tool_definition(), upload_ascii)
        .await?;

    server
        .register_tool(
            IngestFileHandler::tool_definition(),
            IngestFileHandler::new(Arc::clone(pipeline)),
        )
        .await?;
    let query = QueryDocumentsHandler::new(Arc::clone(pipeline));
    server.register_tool(query.tool_definition(), query).await?;
    server
        .register_tool(
            ListCollectionsHandler::tool_definition(),
            ListCollectionsHandler::new(Arc::clone(pipeline)),
        )
        .await?;
    server
        .register_tool(
            HealthCheckHandler::tool_definition(),
            HealthCheckHandler::new(Arc::clone(pipeline)),
        )
        .await?;

    debug!("Registered {} tools", server.list_tools().await.len());
    Ok(())
}
