
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::{Config, EmbeddingConfig, ProviderKind};
use crate::embeddings::chunking::MAX_CHUNK_SIZE;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Docvec MCP Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Vector Store").bold().yellow());
    configure_store(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Embedding Provider").bold().yellow());
    eprintln!("Configure the API used to embed document chunks and queries.");
    eprintln!();
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());
    configure_chunking(&mut config)?;

    if config.embedding.provider == ProviderKind::OpenAi {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_embedding_endpoint(&config.embedding)? {
            eprintln!("{}", style("✓ Embedding API reachable!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not reach the embedding API").yellow()
            );
            eprintln!("You can continue, but ingestion and text queries will fail until it is.");
        }

        if std::env::var(&config.embedding.api_key_env).is_err() {
            eprintln!(
                "{}",
                style(format!(
                    "⚠ Warning: ${} is not set in this environment",
                    config.embedding.api_key_env
                ))
                .yellow()
            );
        }
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load_from(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  URI: {}", style(config.store_uri()).cyan());
    eprintln!(
        "  Connect: {} attempts, {}s apart",
        style(config.store.connect_attempts).cyan(),
        style(config.store.connect_backoff_secs).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Embedding:").bold().yellow());
    eprintln!("  Provider: {}", style(config.embedding.provider).cyan());
    if config.embedding.provider == ProviderKind::OpenAi {
        match config.embedding.api_url() {
            Ok(url) => eprintln!("  API: {}", style(url).cyan()),
            Err(e) => eprintln!("  API: {} ({})", style("Invalid").red(), e),
        }
        eprintln!("  Model: {}", style(&config.embedding.model).cyan());
        eprintln!("  Key variable: {}", style(&config.embedding.api_key_env).cyan());
    }
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking & Search:").bold().yellow());
    eprintln!("  Chunk size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Index: {} / {} / {} partitions",
        style(config.index.kind).cyan(),
        style(config.index.metric).cyan(),
        style(config.index.partitions).cyan()
    );
    eprintln!(
        "  Search: {} probes, top_k {}",
        style(config.search.probes).cyan(),
        style(config.search.default_top_k).cyan()
    );

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join(super::settings::CONFIG_FILE_NAME).exists() {
        eprintln!("{}", style("Found existing configuration.").green());
        return Config::load_from(config_dir);
    }

    eprintln!(
        "{}",
        style("No existing configuration found. Using defaults.").yellow()
    );
    Config::load_from(config_dir)
}

fn configure_store(config: &mut Config) -> Result<()> {
    let default_uri = config.store_uri();
    let uri: String = Input::new()
        .with_prompt("Vector store URI (path, db:// or memory://)")
        .default(default_uri.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("URI cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    // Keep following the config directory unless the user moved it
    config.store.uri = (uri != default_uri || config.store.uri.is_some()).then_some(uri);

    let attempts: u32 = Input::new()
        .with_prompt("Connection attempts")
        .default(config.store.connect_attempts)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Attempts must be between 1 and 100")
            }
        })
        .interact_text()?;
    config.store.connect_attempts = attempts;

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let providers = [ProviderKind::OpenAi, ProviderKind::Ascii];
    let labels = &["openai (HTTP /embeddings API)", "ascii (offline, testing only)"];
    let default_index = providers
        .iter()
        .position(|&p| p == embedding.provider)
        .unwrap_or(0);

    let provider_index = Select::new()
        .with_prompt("Embedding provider")
        .default(default_index)
        .items(labels)
        .interact()?;
    embedding.provider = providers[provider_index];

    if embedding.provider == ProviderKind::OpenAi {
        let api_base: String = Input::new()
            .with_prompt("API base URL")
            .default(embedding.api_base.clone())
            .validate_with(|input: &String| -> Result<(), String> {
                let temp_config = EmbeddingConfig {
                    api_base: input.clone(),
                    ..EmbeddingConfig::default()
                };
                temp_config.api_url().map(|_| ()).map_err(|e| e.to_string())
            })
            .interact_text()?;

        let model: String = Input::new()
            .with_prompt("Embedding model")
            .default(embedding.model.clone())
            .validate_with(|input: &String| -> Result<(), &str> {
                if input.trim().is_empty() {
                    Err("Model name cannot be empty")
                } else {
                    Ok(())
                }
            })
            .interact_text()?;

        let api_key_env: String = Input::new()
            .with_prompt("Environment variable holding the API key")
            .default(embedding.api_key_env.clone())
            .interact_text()?;

        embedding.set_api_base(api_base)?;
        embedding.set_model(model)?;
        embedding.api_key_env = api_key_env;
    }

    let dimension: usize = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.dimension)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Dimension must be greater than 0")
            } else if *input > super::settings::MAX_EMBEDDING_DIMENSION {
                Err("Dimension must be 32768 or less")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    embedding.set_dimension(dimension)?;

    Ok(())
}

fn configure_chunking(config: &mut Config) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size in characters")
        .default(config.chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=MAX_CHUNK_SIZE).contains(input) {
                Ok(())
            } else {
                Err("Chunk size must be between 1 and 1024")
            }
        })
        .interact_text()?;
    config.chunking.chunk_size = chunk_size;
    Ok(())
}

fn test_embedding_endpoint(embedding: &EmbeddingConfig) -> Result<bool> {
    let url = embedding.api_url()?.join("models")?;

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    // Any HTTP answer, including 401 without a key, means the host is up
    match agent.get(url.as_str()).call() {
        Ok(_) => Ok(true),
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => Ok(true),
        Err(_) => Ok(false),
    }
}
