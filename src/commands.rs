use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use crate::config::Config;
use crate::database::{CollectionSchema, connect};
use crate::embeddings::provider_from_config;
use crate::mcp::{McpServer, register_default_tools};
use crate::pipeline::{Pipeline, QueryInput};
use crate::resources::{ensure_collection, ensure_index, health_check};

/// Load and validate the configuration in `config_dir`
fn load_config(config_dir: &Path) -> Result<Config> {
    let config = Config::load_from(config_dir).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Connect to the store (with retries) and build the embedding provider
async fn open_pipeline(config: &Config) -> Result<Arc<Pipeline>> {
    let uri = config.store_uri();
    let store = connect(&uri, &config.store)
        .await
        .with_context(|| format!("Failed to connect to vector store at {}", uri))?;
    let embedder =
        provider_from_config(&config.embedding).context("Failed to create embedding provider")?;
    Ok(Arc::new(Pipeline::new(store, embedder, config)))
}

/// Start MCP server on stdio
#[inline]
pub async fn serve_mcp(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    info!(
        "Starting MCP server (store {}, embeddings {} via {})",
        config.store_uri(),
        config.embedding.model,
        config.embedding.provider
    );

    let pipeline = open_pipeline(&config).await?;

    let server = Arc::new(
        McpServer::new(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        )
        .context("Failed to create MCP server")?
        .with_instructions(
            "Vector store tools: create collections, insert and search vectors, \
             ingest documents and query them in natural language.",
        ),
    );
    register_default_tools(&server, &pipeline)
        .await
        .context("Failed to register tools")?;

    // stdout carries the protocol; everything for humans goes to stderr
    eprintln!(
        "MCP server ready with {} tools on stdio. Press Ctrl+C to stop.",
        server.list_tools().await.len()
    );

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => {
            match result {
                Ok(()) => info!("MCP server stopped normally"),
                Err(e) => {
                    error!("MCP server failed: {}", e);
                    return Err(e);
                }
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}

/// Create a collection unless it exists
#[inline]
pub async fn create_collection(
    config_dir: &Path,
    name: &str,
    dimension: Option<usize>,
    with_metadata: bool,
) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_pipeline(&config).await?;
    let dimension = dimension.unwrap_or(config.embedding.dimension);

    let schema = if with_metadata {
        CollectionSchema::with_metadata(name, dimension)
    } else {
        CollectionSchema::basic(name, dimension)
    };
    let status = ensure_collection(pipeline.store().as_ref(), &schema)
        .await
        .with_context(|| format!("Failed to create collection '{}'", name))?;

    println!("{}", status.describe(name));
    Ok(())
}

/// Extract, chunk, embed and store one file
#[inline]
pub async fn ingest_file(
    config_dir: &Path,
    file: &Path,
    collection: &str,
    doc_id: Option<String>,
) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_pipeline(&config).await?;

    let bar = if console::user_attended_stderr() {
        ProgressBar::new_spinner().with_style(ProgressStyle::with_template("{spinner} {msg}")?)
    } else {
        ProgressBar::hidden()
    };
    bar.set_message(format!("Ingesting {}", file.display()));
    bar.enable_steady_tick(Duration::from_millis(100));

    let result = pipeline.ingest_file(file, collection, doc_id).await;
    bar.finish_and_clear();

    let outcome = result.with_context(|| format!("Failed to ingest {}", file.display()))?;
    println!("{}", outcome);
    Ok(())
}

/// Print the chunks closest to `text`
#[inline]
pub async fn query(
    config_dir: &Path,
    collection: &str,
    text: &str,
    top_k: Option<usize>,
) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_pipeline(&config).await?;
    let top_k = top_k.unwrap_or(config.search.default_top_k);

    let hits = pipeline
        .query(collection, QueryInput::Text(text.to_string()), top_k, true)
        .await
        .with_context(|| format!("Failed to query '{}'", collection))?;

    if hits.is_empty() {
        println!("No matches in '{}'.", collection);
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        println!("{}. id {} (distance {:.4})", rank + 1, hit.id, hit.distance);
        if let Some(text) = &hit.text {
            println!("   {}", text.replace('\n', " "));
        }
    }
    Ok(())
}

/// Print every collection name
#[inline]
pub async fn list_collections(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_pipeline(&config).await?;

    let names = crate::resources::list_collections(pipeline.store().as_ref())
        .await
        .context("Failed to list collections")?;

    if names.is_empty() {
        println!("No collections yet.");
        println!("Use 'docvec-mcp create <name>' to add one.");
        return Ok(());
    }

    println!("Collections ({} total):", names.len());
    for name in &names {
        println!("  {}", name);
    }
    Ok(())
}

/// Report whether the store answers
#[inline]
pub async fn health(config_dir: &Path) -> Result<()> {
    let config = load_config(config_dir)?;
    let uri = config.store_uri();

    match connect(&uri, &config.store).await {
        Ok(store) => println!("{}", health_check(store.as_ref()).await),
        Err(e) => println!("Vector store connection error: {}", e),
    }
    Ok(())
}

/// Rebuild the vector index of a collection with the configured parameters
#[inline]
pub async fn rebuild_index(config_dir: &Path, collection: &str) -> Result<()> {
    let config = load_config(config_dir)?;
    let pipeline = open_pipeline(&config).await?;

    ensure_index(pipeline.store().as_ref(), collection, pipeline.index_config())
        .await
        .with_context(|| format!("Failed to index '{}'", collection))?;

    println!("Index created on '{}'.", collection);
    Ok(())
}
