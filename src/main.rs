use anyhow::Result;
use clap::{Parser, Subcommand};
use docvec_mcp::commands::{
    create_collection, health, ingest_file, list_collections, query, rebuild_index, serve_mcp,
};
use docvec_mcp::config::{get_config_dir, run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "docvec-mcp")]
#[command(about = "Vector store collections, document ingestion and similarity search as MCP tools")]
#[command(version)]
struct Cli {
    /// Configuration directory (default: ~/.docvec-mcp)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Configure the vector store and embedding provider
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start MCP server on stdio
    Serve,
    /// Create a collection unless it already exists
    Create {
        /// Collection name
        name: String,
        /// Vector dimension (default: the configured embedding dimension)
        #[arg(long)]
        dim: Option<usize>,
        /// Add text and doc_id fields for document chunks
        #[arg(long)]
        metadata: bool,
    },
    /// Extract, chunk, embed and store a PDF, DOCX or TXT file
    Ingest {
        /// File to ingest
        file: PathBuf,
        /// Target collection, created with metadata fields beforehand
        collection: String,
        /// Document id shared by all chunks (default: random UUID)
        #[arg(long)]
        doc_id: Option<String>,
    },
    /// Search a collection with a natural language query
    Query {
        /// Collection to search
        collection: String,
        /// Query text
        text: String,
        /// Number of results (default: from config)
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// List all collections
    List,
    /// Check the vector store connection
    Health,
    /// Rebuild the vector index of a collection
    Index {
        /// Collection to index
        collection: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is reserved for command output and the MCP channel
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => get_config_dir()?,
    };

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&config_dir)?;
            } else {
                run_interactive_config(&config_dir)?;
            }
        }
        Commands::Serve => {
            serve_mcp(&config_dir).await?;
        }
        Commands::Create {
            name,
            dim,
            metadata,
        } => {
            create_collection(&config_dir, &name, dim, metadata).await?;
        }
        Commands::Ingest {
            file,
            collection,
            doc_id,
        } => {
            ingest_file(&config_dir, &file, &collection, doc_id).await?;
        }
        Commands::Query {
            collection,
            text,
            top_k,
        } => {
            query(&config_dir, &collection, &text, top_k).await?;
        }
        Commands::List => {
            list_collections(&config_dir).await?;
        }
        Commands::Health => {
            health(&config_dir).await?;
        }
        Commands::Index { collection } => {
            rebuild_index(&config_dir, &collection).await?;
        }
    }

    Ok(())
}
