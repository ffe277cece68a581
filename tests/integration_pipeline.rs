#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// Ingestion and query flows against the in-process store, wired up the
// same way the CLI does it

use docvec_mcp::config::{Config, StoreConfig};
use docvec_mcp::database::{CollectionSchema, MEMORY_URI, NewRecord, VectorStore, connect};
use docvec_mcp::embeddings::{AsciiEmbedder, EmbeddingProvider};
use docvec_mcp::pipeline::{IngestOutcome, Pipeline, QueryInput};
use docvec_mcp::resources::{
    EnsureStatus, ensure_collection, ensure_index, health_check, list_collections,
};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 8;

fn test_config() -> Config {
    let mut config = Config::default();
    config.embedding.dimension = DIM;
    config.chunking.chunk_size = 8;
    config.index.partitions = 4;
    config
}

async fn memory_pipeline(config: &Config) -> Pipeline {
    let store = connect(MEMORY_URI, &StoreConfig::default())
        .await
        .expect("memory store always connects");
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(AsciiEmbedder::new(DIM));
    Pipeline::new(store, embedder, config)
}

#[tokio::test]
async fn vectors_are_ranked_by_distance() {
    let pipeline = memory_pipeline(&test_config()).await;
    let store = pipeline.store().as_ref();

    let status = ensure_collection(store, &CollectionSchema::basic("ranked", DIM))
        .await
        .expect("creates collection");
    assert_eq!(status, EnsureStatus::Created);

    let records: Vec<NewRecord> = (0..10)
        .map(|i| NewRecord::vector((i..i + DIM).map(|v| v as f32).collect()))
        .collect();
    let inserted = store.insert("ranked", records).await.expect("inserts");
    assert_eq!(inserted, 10);

    ensure_index(store, "ranked", pipeline.index_config())
        .await
        .expect("builds index");

    let hits = pipeline
        .query("ranked", QueryInput::Vector(vec![1.0; DIM]), 5, false)
        .await
        .expect("search succeeds");

    let ids: Vec<i64> = hits.iter().map(|hit| hit.id).collect();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    // Row 0 is [0..7]; squared distance to all-ones is 1+0+1+4+9+16+25+36
    assert!((hits[0].distance - 92.0).abs() < 1e-3);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    assert!(hits.iter().all(|hit| hit.text.is_none()));
}

#[tokio::test]
async fn ensure_collection_is_idempotent() {
    let pipeline = memory_pipeline(&test_config()).await;
    let store = pipeline.store().as_ref();
    let schema = CollectionSchema::with_metadata("docs", DIM);

    assert_eq!(
        ensure_collection(store, &schema).await.expect("creates"),
        EnsureStatus::Created
    );
    assert_eq!(
        ensure_collection(store, &schema).await.expect("no-op"),
        EnsureStatus::AlreadyExists
    );
    assert!(
        ensure_collection(store, &CollectionSchema::with_metadata("docs", DIM * 2))
            .await
            .is_err()
    );

    assert_eq!(
        list_collections(store).await.expect("lists"),
        vec!["docs".to_string()]
    );
}

#[tokio::test]
async fn ingested_file_is_queryable() {
    let pipeline = memory_pipeline(&test_config()).await;
    ensure_collection(
        pipeline.store().as_ref(),
        &CollectionSchema::with_metadata("notes", DIM),
    )
    .await
    .expect("creates collection");

    let temp_dir = TempDir::new().expect("should create temp dir");
    let file = temp_dir.path().join("notes.txt");
    fs::write(&file, "aaaaaaaabbbbbbbbcccccccc").expect("writes file");

    let outcome = pipeline
        .ingest_file(&file, "notes", Some("notes-1".to_string()))
        .await
        .expect("ingests file");
    let IngestOutcome::Ingested {
        chunks,
        document_id,
        ..
    } = outcome
    else {
        panic!("expected chunks to be ingested");
    };
    assert_eq!(chunks, 3);
    assert_eq!(document_id, "notes-1");

    let summary = pipeline
        .query_summary("notes", "bbbbbbbb", 1)
        .await
        .expect("query succeeds");
    assert_eq!(summary, "Top 1 matching excerpts:\nbbbbbbbb");

    let hits = pipeline
        .query("notes", QueryInput::Text("cccccccc".to_string()), 3, true)
        .await
        .expect("query succeeds");
    assert_eq!(hits[0].text.as_deref(), Some("cccccccc"));
    assert!(hits[0].distance.abs() < 1e-6);
}

#[tokio::test]
async fn repeated_ingest_appends() {
    let pipeline = memory_pipeline(&test_config()).await;
    ensure_collection(
        pipeline.store().as_ref(),
        &CollectionSchema::with_metadata("log", DIM),
    )
    .await
    .expect("creates collection");

    for text in ["first entry", "second entry"] {
        pipeline
            .ingest_text("inline", text, "log", None)
            .await
            .expect("ingests text");
    }

    // 11 and 12 characters at width 8 make two chunks each
    let hits = pipeline
        .query("log", QueryInput::Vector(vec![0.0; DIM]), 10, false)
        .await
        .expect("query succeeds");
    assert_eq!(hits.len(), 4);
}

#[tokio::test]
async fn memory_store_reports_healthy() {
    let pipeline = memory_pipeline(&test_config()).await;
    assert_eq!(
        health_check(pipeline.store().as_ref()).await,
        "Vector store is connected and ready!"
    );
}
