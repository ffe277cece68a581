// Ingestion and query pipelines
// extract -> chunk -> embed (one batch) -> bulk insert -> rebuild index, and
// embed -> load -> search


use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::Config;
use crate::database::params::MAX_TOP_K;
use crate::database::{IndexConfig, NewRecord, SearchConfig, SearchHit, VectorStore};
use crate::embeddings::{ChunkingConfig, EmbeddingProvider};
use crate::extract::extract_text_blocking;
use crate::resources::ensure_index;
use crate::{DocvecError, Result};

/// What an ingestion call did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Ingested {
        chunks: usize,
        source: String,
        collection: String,
        document_id: String,
    },
    /// The source held no text; nothing was written
    NoContent { source: String },
}

impl fmt::Display for IngestOutcome {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingested {
                chunks,
                source,
                collection,
                ..
            } => write!(
                f,
                "Ingested {} chunks from '{}' into '{}'.",
                chunks, source, collection
            ),
            Self::NoContent { .. } => f.write_str("No text found in file."),
        }
    }
}

/// Query given either as text to embed or as a ready vector
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInput {
    Text(String),
    Vector(Vec<f32>),
}

/// Ingestion and query over one store and one embedding provider
pub struct Pipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    index: IndexConfig,
    search: SearchConfig,
}

impl fmt::Debug for Pipeline {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("store", &self.store.backend())
            .field("model", &self.embedder.model())
            .field("chunking", &self.chunking)
            .field("index", &self.index)
            .field("search", &self.search)
            .finish()
    }
}

impl Pipeline {
    #[inline]
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        config: &Config,
    ) -> Self {
        Self {
            store,
            embedder,
            chunking: config.chunking,
            index: config.index,
            search: config.search,
        }
    }

    #[inline]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    #[inline]
    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    #[inline]
    pub fn index_config(&self) -> &IndexConfig {
        &self.index
    }

    #[inline]
    pub fn search_config(&self) -> &SearchConfig {
        &self.search
    }

    /// Extract, chunk, embed and store a file
    ///
    /// Unsupported extensions fail before any embedding or insert.
    #[inline]
    pub async fn ingest_file(
        &self,
        path: &Path,
        collection: &str,
        doc_id: Option<String>,
    ) -> Result<IngestOutcome> {
        info!("Ingesting {} into '{}'", path.display(), collection);
        let text = extract_text_blocking(path.to_path_buf()).await?;
        let source = path.display().to_string();
        self.ingest_text_with(Arc::clone(&self.embedder), &source, &text, collection, doc_id)
            .await
    }

    /// Chunk, embed and store `text` with the configured provider
    #[inline]
    pub async fn ingest_text(
        &self,
        source: &str,
        text: &str,
        collection: &str,
        doc_id: Option<String>,
    ) -> Result<IngestOutcome> {
        self.ingest_text_with(Arc::clone(&self.embedder), source, text, collection, doc_id)
            .await
    }

    /// Chunk, embed with `embedder` and store `text`.
    ///
    /// All chunks share one document id and go through a single embedding
    /// call and a single insert. The index is rebuilt afterwards.
    #[inline]
    pub async fn ingest_text_with(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        source: &str,
        text: &str,
        collection: &str,
        doc_id: Option<String>,
    ) -> Result<IngestOutcome> {
        let chunks: Vec<String> = self
            .chunking
            .split(text)
            .into_iter()
            .map(str::to_owned)
            .collect();

        if chunks.is_empty() {
            info!("No text found in '{}', nothing ingested", source);
            return Ok(IngestOutcome::NoContent {
                source: source.to_string(),
            });
        }

        let vectors = embed_blocking(embedder, chunks.clone()).await?;
        if vectors.len() != chunks.len() {
            return Err(DocvecError::Embedding(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let document_id = doc_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let records: Vec<NewRecord> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, text)| NewRecord {
                vector,
                text: Some(text),
                doc_id: Some(document_id.clone()),
            })
            .collect();

        let inserted = self.store.insert(collection, records).await?;
        ensure_index(self.store.as_ref(), collection, &self.index).await?;

        info!(
            "Ingested {} chunks from '{}' into '{}' as document {}",
            inserted, source, collection, document_id
        );
        Ok(IngestOutcome::Ingested {
            chunks: inserted,
            source: source.to_string(),
            collection: collection.to_string(),
            document_id,
        })
    }

    /// Nearest records to the query, closest first
    #[inline]
    pub async fn query(
        &self,
        collection: &str,
        input: QueryInput,
        top_k: usize,
        include_text: bool,
    ) -> Result<Vec<SearchHit>> {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(DocvecError::InvalidArgument(format!(
                "top_k must be between 1 and {}, got {}",
                MAX_TOP_K, top_k
            )));
        }

        let vector = match input {
            QueryInput::Vector(vector) => vector,
            QueryInput::Text(text) => embed_blocking(Arc::clone(&self.embedder), vec![text])
                .await?
                .pop()
                .ok_or_else(|| {
                    DocvecError::Embedding("Provider returned no embedding".to_string())
                })?,
        };

        self.store.load(collection).await?;
        let hits = self
            .store
            .search(collection, &vector, top_k, &self.search, include_text)
            .await?;

        debug!("Query on '{}' returned {} hits", collection, hits.len());
        Ok(hits)
    }

    /// Matching chunk texts rendered as one block
    #[inline]
    pub async fn query_summary(&self, collection: &str, query: &str, top_k: usize) -> Result<String> {
        let hits = self
            .query(collection, QueryInput::Text(query.to_string()), top_k, true)
            .await?;
        Ok(render_summary(top_k, &hits))
    }
}

/// `Top {k} matching excerpts:` followed by hit texts separated by `---` lines
#[inline]
pub fn render_summary(top_k: usize, hits: &[SearchHit]) -> String {
    let excerpts: Vec<&str> = hits
        .iter()
        .map(|hit| hit.text.as_deref().unwrap_or_default())
        .collect();
    format!("Top {} matching excerpts:\n{}", top_k, excerpts.join("\n---\n"))
}

async fn embed_blocking(
    embedder: Arc<dyn EmbeddingProvider>,
    texts: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    debug!(
        "Embedding {} texts with {}",
        texts.len(),
        embedder.model()
    );
    tokio::task::spawn_blocking(move || embedder.embed_batch(&texts))
        .await
        .map_err(|e| DocvecError::Embedding(format!("Embedding task failed: {}", e)))?
}
