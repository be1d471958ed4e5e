#[cfg(test)]
mod tests {
    use crate::cli::{Args, LLM_API_KEY_ENV, SEARCH_API_KEY_ENV, apply_env_keys};
    use crate::config::{Config, LLMProvider, OutputFormat};
    use clap::Parser;
    use std::path::PathBuf;

    #[test]
    fn test_args_default_values() {
        let args = Args::try_parse_from(["deckgen-rs", "Renewable Energy Trends"]).unwrap();

        assert_eq!(args.topic, "Renewable Energy Trends");
        assert!(args.author.is_none());
        assert!(args.theme.is_none());
        assert!(args.config.is_none());
        assert!(args.output_dir.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn test_args_require_topic() {
        assert!(Args::try_parse_from(["deckgen-rs"]).is_err());
    }

    #[test]
    fn test_args_short_options() {
        let args = Args::try_parse_from([
            "deckgen-rs",
            "History of Rome",
            "-a",
            "Ada",
            "-t",
            "Historical_Vintage",
            "-o",
            "/tmp/decks",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.author, Some("Ada".to_string()));
        assert_eq!(args.theme, Some("Historical_Vintage".to_string()));
        assert_eq!(args.output_dir, Some(PathBuf::from("/tmp/decks")));
        assert!(args.verbose);
    }

    #[test]
    fn test_request_carries_raw_values() {
        let args =
            Args::try_parse_from(["deckgen-rs", "  AI in Finance ", "--theme", "neon"]).unwrap();
        let request = args.request();

        assert_eq!(request.topic, "  AI in Finance ");
        // 主题校验留给流水线启动前
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_into_config_with_overrides() {
        let args = Args::try_parse_from([
            "deckgen-rs",
            "Rust",
            "-c",
            "/definitely/not/here/deckgen.toml",
        ])
        .unwrap();
        assert!(args.into_config().is_err());

        let args = Args::try_parse_from([
            "deckgen-rs",
            "Rust",
            "--llm-provider",
            "anthropic",
            "--model",
            "claude-sonnet",
            "--llm-api-key",
            "test-key",
            "--temperature",
            "0.7",
            "--max-parallels",
            "2",
            "--max-queries",
            "4",
            "--format",
            "json",
            "--search-api-key",
            "tvly-test",
        ])
        .unwrap();

        let config = args.into_config().unwrap();
        assert_eq!(config.llm.provider, LLMProvider::Anthropic);
        assert_eq!(config.llm.model, "claude-sonnet");
        assert_eq!(config.llm.api_key, "test-key");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.pipeline.max_parallels, 2);
        assert_eq!(config.pipeline.max_queries, 4);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert_eq!(config.search.api_key, "tvly-test");
    }

    #[test]
    fn test_into_config_rejects_invalid_bounds() {
        let args = Args::try_parse_from(["deckgen-rs", "Rust", "--max-parallels", "0"]).unwrap();
        assert!(args.into_config().is_err());
    }

    #[test]
    fn test_into_config_rejects_zero_run_timeout() {
        let args = Args::try_parse_from(["deckgen-rs", "Rust", "--run-timeout", "0"]).unwrap();
        assert!(args.into_config().is_err());

        let args = Args::try_parse_from(["deckgen-rs", "Rust", "--run-timeout", "300"]).unwrap();
        assert_eq!(args.into_config().unwrap().pipeline.run_timeout_seconds, 300);
    }

    #[test]
    fn test_apply_env_keys_fills_only_missing() {
        let mut config = Config::default();
        config.search.api_key = "from-file".to_string();

        apply_env_keys(&mut config, |key| match key {
            LLM_API_KEY_ENV => Some("llm-from-env".to_string()),
            SEARCH_API_KEY_ENV => Some("search-from-env".to_string()),
            _ => None,
        });

        assert_eq!(config.llm.api_key, "llm-from-env");
        assert_eq!(config.search.api_key, "from-file");
    }
}
