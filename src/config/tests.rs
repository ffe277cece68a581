use super::*;
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod integration_tests {
    use super::*;

    #[test]
    fn config_file_persistence() {
        let temp_dir = TempDir::new().expect("should create TempDir successfully");
        let config_path = temp_dir.path().join("config.toml");

        let original_config = Config {
            store: StoreConfig {
                uri: Some("/var/lib/docvec".to_string()),
                connect_attempts: 3,
                connect_backoff_secs: 1,
            },
            embedding: EmbeddingConfig {
                api_base: "http://localhost:11434/v1".to_string(),
                model: "nomic-embed-text".to_string(),
                dimension: 768,
                ..EmbeddingConfig::default()
            },
            ..Config::default()
        };

        let toml_content = toml::to_string_pretty(&original_config)
            .expect("config should convert to toml string successfully");
        fs::write(&config_path, toml_content).expect("should write to config_path successfully");

        let content =
            fs::read_to_string(&config_path).expect("should read from config_path successfully");
        let loaded_config: Config = toml::from_str(&content).expect("should parse toml correctly");

        assert_eq!(original_config, loaded_config);
    }

    #[test]
    fn invalid_toml_handling() {
        let invalid_toml = r#"
            [store
            uri = "/tmp/vectors"
            connect_attempts = "many"
        "#;

        let result: Result<Config, toml::de::Error> = toml::from_str(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn partial_config_with_defaults() {
        let partial_toml = r#"
            [embedding]
            model = "text-embedding-3-small"
        "#;

        let config: Config = toml::from_str(partial_toml).expect("missing keys use defaults");
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.dimension, 1536);
        assert_eq!(config.store.connect_attempts, 10);
        assert_eq!(config.chunking.chunk_size, 500);
    }

    #[test]
    fn complete_valid_config() {
        let valid_toml = r#"
            [store]
            uri = "memory://"
            connect_attempts = 5
            connect_backoff_secs = 1

            [embedding]
            provider = "ascii"
            dimension = 16

            [chunking]
            chunk_size = 100

            [index]
            kind = "IVF_FLAT"
            metric = "L2"
            partitions = 4

            [search]
            metric = "L2"
            probes = 2
            default_top_k = 3
        "#;

        let config: Config = toml::from_str(valid_toml).expect("should parse toml successfully");
        assert!(config.validate().is_ok());
        assert_eq!(config.store.uri.as_deref(), Some("memory://"));
        assert_eq!(config.embedding.provider, ProviderKind::Ascii);
        assert_eq!(config.index.partitions, 4);
        assert_eq!(config.search.default_top_k, 3);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let toml = r#"
            [embedding]
            provider = "cohere"
        "#;
        let result: Result<Config, toml::de::Error> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn error_display_messages() {
        let errors = vec![
            ConfigError::InvalidUrl("invalid-url".to_string()),
            ConfigError::InvalidModel(String::new()),
            ConfigError::InvalidEmbeddingDimension(0),
            ConfigError::InvalidChunkSize(2000),
            ConfigError::InvalidPartitions(0),
            ConfigError::InvalidTopK(0),
        ];

        for error in errors {
            let message = format!("{error}");
            assert!(!message.is_empty());
            assert!(message.len() > 10);
        }
    }
}
