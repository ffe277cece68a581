use thiserror::Error;

pub type Result<T> = std::result::Result<T, DocvecError>;

#[derive(Error, Debug)]
pub enum DocvecError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Extraction error: {0}")]
    Extraction(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error(
        "Collection '{collection}' already exists with dimension {existing}, requested {requested}"
    )]
    SchemaMismatch {
        collection: String,
        existing: usize,
        requested: usize,
    },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extract;
pub mod mcp;
pub mod pipeline;
pub mod resources;
