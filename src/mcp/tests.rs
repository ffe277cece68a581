//! Tool handler tests against the in-memory store and the offline embedder

use crate::config::Config;
use crate::database::{MemoryStore, VectorStore};
use crate::embeddings::AsciiEmbedder;
use crate::mcp::protocol::{CallToolParams, CallToolResult};
use crate::mcp::server::ToolHandler;
use crate::pipeline::Pipeline;
use serde_json::{Value, json};
use std::sync::Arc;

const DIM: usize = 4;

fn test_pipeline() -> Arc<Pipeline> {
    let mut config = Config::default();
    config.chunking.chunk_size = 4;
    config.index.partitions = 2;
    Arc::new(Pipeline::new(
        Arc::new(MemoryStore::new()),
        Arc::new(AsciiEmbedder::new(DIM)),
        &config,
    ))
}

async fn call<H: ToolHandler>(handler: &H, name: &str, arguments: Value) -> CallToolResult {
    handler
        .handle(CallToolParams {
            name: name.to_string(),
            arguments: arguments.as_object().cloned(),
        })
        .await
        .expect("handler returns a result")
}

fn is_error(result: &CallToolResult) -> bool {
    result.is_error == Some(true)
}

mod collection_tool_tests {
    use super::*;
    use crate::mcp::tools::CreateCollectionHandler;

    #[test]
    fn definitions_default_to_embedder_dimension() {
        let handler = CreateCollectionHandler::basic(test_pipeline());
        let tool = handler.tool_definition();

        assert_eq!(tool.name, "create_collection");
        assert_eq!(tool.input_schema["properties"]["dim"]["default"], DIM);
        assert_eq!(
            tool.input_schema["properties"]["dim"]["maximum"],
            crate::config::settings::MAX_EMBEDDING_DIMENSION
        );
        assert_eq!(tool.input_schema["required"], json!(["name"]));

        let metadata = CreateCollectionHandler::with_metadata(test_pipeline()).tool_definition();
        assert_eq!(metadata.name, "create_collection_with_metadata");
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let pipeline = test_pipeline();
        let handler = CreateCollectionHandler::basic(Arc::clone(&pipeline));

        let first = call(&handler, "create_collection", json!({"name": "vecs", "dim": 3})).await;
        assert_eq!(first.text_content(), "Collection 'vecs' created.");

        let second = call(&handler, "create_collection", json!({"name": "vecs", "dim": 3})).await;
        assert_eq!(second.text_content(), "Collection 'vecs' already exists.");
        assert!(!is_error(&second));

        let schema = pipeline
            .store()
            .describe_collection("vecs")
            .await
            .expect("describes");
        assert_eq!(schema.dimension, 3);
        assert!(schema.metadata_fields.is_empty());
    }

    #[tokio::test]
    async fn metadata_collection_status() {
        let handler = CreateCollectionHandler::with_metadata(test_pipeline());

        let created = call(&handler, "create_collection_with_metadata", json!({"name": "docs"})).await;
        assert_eq!(
            created.text_content(),
            "Collection 'docs' with metadata fields created."
        );

        let again = call(&handler, "create_collection_with_metadata", json!({"name": "docs"})).await;
        assert_eq!(again.text_content(), "Collection 'docs' already exists.");
    }

    #[tokio::test]
    async fn dimension_conflict_is_an_error_result() {
        let handler = CreateCollectionHandler::basic(test_pipeline());
        call(&handler, "create_collection", json!({"name": "vecs", "dim": 3})).await;

        let conflict = call(&handler, "create_collection", json!({"name": "vecs", "dim": 5})).await;
        assert!(is_error(&conflict));
        assert!(conflict.text_content().contains("dimension 3"));
    }
}

mod vector_tool_tests {
    use super::*;
    use crate::mcp::tools::{
        CreateCollectionHandler, CreateIndexHandler, InsertVectorsHandler, LoadCollectionHandler,
        SearchVectorsHandler,
    };

    async fn filled_pipeline() -> Arc<Pipeline> {
        let pipeline = test_pipeline();
        let create = CreateCollectionHandler::basic(Arc::clone(&pipeline));
        call(&create, "create_collection", json!({"name": "vecs", "dim": 2})).await;

        let insert = InsertVectorsHandler::new(Arc::clone(&pipeline));
        let inserted = call(
            &insert,
            "insert_vectors",
            json!({
                "collection_name": "vecs",
                "vectors": [[0.0, 0.0], [3.0, 4.0], [1.0, 0.0]]
            }),
        )
        .await;
        assert_eq!(inserted.text_content(), "Inserted 3 vectors into 'vecs'.");
        pipeline
    }

    #[tokio::test]
    async fn index_and_load_report_status() {
        let pipeline = filled_pipeline().await;

        let index = CreateIndexHandler::new(Arc::clone(&pipeline));
        let indexed = call(&index, "create_index", json!({"collection_name": "vecs"})).await;
        assert_eq!(indexed.text_content(), "Index created on 'vecs'.");

        let load = LoadCollectionHandler::new(Arc::clone(&pipeline));
        let loaded = call(&load, "load_collection", json!({"collection_name": "vecs"})).await;
        assert_eq!(loaded.text_content(), "Collection 'vecs' loaded.");
    }

    #[tokio::test]
    async fn search_returns_ids_and_scores() {
        let pipeline = filled_pipeline().await;
        let search = SearchVectorsHandler::ids_only(Arc::clone(&pipeline));

        let result = call(
            &search,
            "search_vectors",
            json!({"collection_name": "vecs", "query_vector": [0.0, 0.0], "top_k": 2}),
        )
        .await;

        let rows: Value = serde_json::from_str(&result.text_content()).expect("json rows");
        assert_eq!(rows, json!([{"id": 0, "score": 0.0}, {"id": 2, "score": 1.0}]));
    }

    #[tokio::test]
    async fn wrong_dimension_is_an_error_result() {
        let pipeline = filled_pipeline().await;

        let insert = InsertVectorsHandler::new(Arc::clone(&pipeline));
        let bad_insert = call(
            &insert,
            "insert_vectors",
            json!({"collection_name": "vecs", "vectors": [[1.0, 2.0, 3.0]]}),
        )
        .await;
        assert!(is_error(&bad_insert));

        let search = SearchVectorsHandler::ids_only(pipeline);
        let bad_search = call(
            &search,
            "search_vectors",
            json!({"collection_name": "vecs", "query_vector": [1.0]}),
        )
        .await;
        assert!(is_error(&bad_search));
        assert!(bad_search.text_content().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn missing_collection_is_an_error_result() {
        let load = LoadCollectionHandler::new(test_pipeline());
        let result = call(&load, "load_collection", json!({"collection_name": "ghost"})).await;
        assert!(is_error(&result));
        assert!(result.text_content().contains("ghost"));
    }
}

mod document_tool_tests {
    use super::*;
    use crate::mcp::tools::{
        CreateCollectionHandler, ExtractTextHandler, IngestFileHandler, QueryDocumentsHandler,
        SearchVectorsHandler, UploadDocumentHandler,
    };
    use std::fs;
    use tempfile::TempDir;

    async fn document_pipeline() -> Arc<Pipeline> {
        let pipeline = test_pipeline();
        let create = CreateCollectionHandler::with_metadata(Arc::clone(&pipeline));
        call(&create, "create_collection_with_metadata", json!({"name": "docs"})).await;
        pipeline
    }

    #[tokio::test]
    async fn upload_reports_chunk_count() {
        let pipeline = document_pipeline().await;
        let upload = UploadDocumentHandler::new(Arc::clone(&pipeline));

        let result = call(
            &upload,
            "upload_document",
            json!({"collection_name": "docs", "text": "abcdefghij", "doc_id": "d1"}),
        )
        .await;
        assert_eq!(
            result.text_content(),
            "Uploaded document with 3 embedded chunks to 'docs'."
        );
    }

    #[tokio::test]
    async fn ascii_upload_sizes_embedder_to_collection() {
        let pipeline = test_pipeline();
        let create = CreateCollectionHandler::with_metadata(Arc::clone(&pipeline));
        call(
            &create,
            "create_collection_with_metadata",
            json!({"name": "wide", "dim": 16}),
        )
        .await;

        let upload = UploadDocumentHandler::ascii(Arc::clone(&pipeline));
        let result = call(
            &upload,
            "upload_document_ascii",
            json!({"collection_name": "wide", "text": "hello world"}),
        )
        .await;
        assert_eq!(
            result.text_content(),
            "Uploaded document with 3 chunks to 'wide'."
        );
    }

    #[tokio::test]
    async fn search_with_metadata_includes_text() {
        let pipeline = document_pipeline().await;
        let upload = UploadDocumentHandler::ascii(Arc::clone(&pipeline));
        call(
            &upload,
            "upload_document_ascii",
            json!({"collection_name": "docs", "text": "abcdwxyz"}),
        )
        .await;

        let search = SearchVectorsHandler::with_text(Arc::clone(&pipeline));
        let query = AsciiEmbedder::new(DIM).vectorize("wxyz");
        let result = call(
            &search,
            "search_with_metadata",
            json!({"collection_name": "docs", "query_vector": query, "top_k": 1}),
        )
        .await;

        let rows: Value = serde_json::from_str(&result.text_content()).expect("json rows");
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["text"], "wxyz");
        assert!(rows[0]["score"].as_f64().expect("numeric score") < 1e-6);
    }

    #[tokio::test]
    async fn query_documents_renders_summary() {
        let pipeline = document_pipeline().await;
        let upload = UploadDocumentHandler::new(Arc::clone(&pipeline));
        call(
            &upload,
            "upload_document",
            json!({"collection_name": "docs", "text": "abcdwxyz"}),
        )
        .await;

        let query = QueryDocumentsHandler::new(Arc::clone(&pipeline));
        let result = call(
            &query,
            "query_documents",
            json!({"collection_name": "docs", "query": "wxyz", "top_k": 2}),
        )
        .await;
        assert_eq!(
            result.text_content(),
            "Top 2 matching excerpts:\nwxyz\n---\nabcd"
        );
    }

    #[tokio::test]
    async fn extraction_answers_unsupported_types() {
        let temp_dir = TempDir::new().expect("should create temp dir");
        let txt = temp_dir.path().join("notes.txt");
        fs::write(&txt, "plain words").expect("writes txt");

        let handler = ExtractTextHandler;
        let text = call(
            &handler,
            "extract_text_from_file",
            json!({"file_path": txt.to_string_lossy()}),
        )
        .await;
        assert_eq!(text.text_content(), "plain words");

        let unsupported = call(
            &handler,
            "extract_text_from_file",
            json!({"file_path": "/tmp/archive.xyz"}),
        )
        .await;
        assert!(!is_error(&unsupported));
        assert_eq!(unsupported.text_content(), "Unsupported file type: .xyz");
    }

    #[tokio::test]
    async fn ingest_file_reports_outcome() {
        let pipeline = document_pipeline().await;
        let temp_dir = TempDir::new().expect("should create temp dir");
        let txt = temp_dir.path().join("notes.txt");
        fs::write(&txt, "abcdefgh").expect("writes txt");
        let empty = temp_dir.path().join("empty.txt");
        fs::write(&empty, "").expect("writes txt");

        let handler = IngestFileHandler::new(Arc::clone(&pipeline));
        let result = call(
            &handler,
            "ingest_file",
            json!({"file_path": txt.to_string_lossy(), "collection_name": "docs"}),
        )
        .await;
        assert_eq!(
            result.text_content(),
            format!("Ingested 2 chunks from '{}' into 'docs'.", txt.display())
        );

        let nothing = call(
            &handler,
            "ingest_file",
            json!({"file_path": empty.to_string_lossy(), "collection_name": "docs"}),
        )
        .await;
        assert_eq!(nothing.text_content(), "No text found in file.");

        let unsupported = call(
            &handler,
            "ingest_file",
            json!({"file_path": "/tmp/data.xyz", "collection_name": "docs"}),
        )
        .await;
        assert!(is_error(&unsupported));
        assert_eq!(unsupported.text_content(), "Unsupported file type: .xyz");
    }
}

mod status_tool_tests {
    use super::*;
    use crate::mcp::tools::{CreateCollectionHandler, HealthCheckHandler, ListCollectionsHandler};

    #[tokio::test]
    async fn list_collections_is_a_json_array() {
        let pipeline = test_pipeline();
        let list = ListCollectionsHandler::new(Arc::clone(&pipeline));
        assert_eq!(
            call(&list, "list_collections", json!({})).await.text_content(),
            "[]"
        );

        let create = CreateCollectionHandler::basic(Arc::clone(&pipeline));
        call(&create, "create_collection", json!({"name": "b"})).await;
        call(&create, "create_collection", json!({"name": "a"})).await;

        let names: Vec<String> =
            serde_json::from_str(&call(&list, "list_collections", json!({})).await.text_content())
                .expect("json names");
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn health_check_reports_ready() {
        let handler = HealthCheckHandler::new(test_pipeline());
        let result = call(&handler, "health_check", json!({})).await;
        assert_eq!(result.text_content(), "Vector store is connected and ready!");
        assert!(!is_error(&result));
    }

    #[test]
    fn parameterless_tools_take_no_arguments() {
        for tool in [
            ListCollectionsHandler::tool_definition(),
            HealthCheckHandler::tool_definition(),
        ] {
            let properties = tool.input_schema["properties"]
                .as_object()
                .expect("has properties");
            assert!(properties.is_empty());
            assert_eq!(tool.input_schema["additionalProperties"], false);
        }
    }
}

mod registration_tests {
    use super::*;
    use crate::mcp::server::McpServer;
    use crate::mcp::tools::register_default_tools;

    #[tokio::test]
    async fn registers_every_tool() {
        let server = McpServer::new("docvec-mcp".to_string(), "0.0.0".to_string())
            .expect("server builds");
        register_default_tools(&server, &test_pipeline())
            .await
            .expect("registers tools");

        let names: Vec<String> = server
            .list_tools()
            .await
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "create_collection",
                "create_collection_with_metadata",
                "create_index",
                "extract_text_from_file",
                "health_check",
                "ingest_file",
                "insert_vectors",
                "list_collections",
                "load_collection",
                "query_documents",
                "search_vectors",
                "search_with_metadata",
                "upload_document",
                "upload_document_ascii",
            ]
        );
    }
}
