use super::*;
use secrecy::ExposeSecret;

#[test]
fn test_empty_file_gives_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.llm.provider, "claude");
    assert_eq!(config.llm.max_tokens, 4096);
    assert_eq!(config.llm.temperature, 0.0);
    assert_eq!(config.docling.base_url, DOCLING_DEFAULT_URL);
    assert_eq!(config.docling.max_paper_chars, 1_200_000);
    assert_eq!(config.docling.max_table_chars, 300_000);
    assert_eq!(config.run.concurrency, 2);
    assert_eq!(config.run.checkpoint_every, 10);
    assert_eq!(config.rate_limit_delay(), Duration::from_secs(5));
    assert!(config.schema.path.is_none());
    assert_eq!(config.schema().unwrap().len(), FieldSchema::builtin().len());
}

#[test]
fn test_sections_parse() {
    let config = Config::from_toml_str(
        r#"
        [llm]
        provider = "gemini"
        model = "gemini-2.5-flash"
        api_key = "k-123"
        retries = 5

        [run]
        pdf_folder = "papers"
        files_list = "todo.txt"
        concurrency = 4
        rate_limit_delay_secs = 0.5

        [normaliser]
        extra_missing = ["not measured"]

        [screening]
        inclusion = ["Adults"]
        "#,
    )
    .unwrap();

    assert_eq!(config.backend_kind().unwrap(), BackendKind::Gemini);
    assert_eq!(config.api_key().unwrap().expose_secret(), "k-123");
    assert_eq!(config.retry_policy().max_attempts, 5);
    assert_eq!(config.run.files_list.as_deref(), Some(Path::new("todo.txt")));
    assert_eq!(config.rate_limit_delay(), Duration::from_millis(500));
    assert_eq!(config.normaliser.extra_missing, vec!["not measured".to_string()]);
    assert_eq!(config.screening.inclusion, vec!["Adults".to_string()]);

    let backend = config.backend_config().unwrap();
    assert_eq!(backend.model.as_deref(), Some("gemini-2.5-flash"));
    assert_eq!(backend.timeout, Duration::from_secs(180));
}

#[test]
fn test_invalid_values_are_configuration_errors() {
    for bad in [
        "[llm]\nprovider = \"llama\"",
        "[run]\nconcurrency = 0",
        "[run]\nrate_limit_delay_secs = -1.0",
        "[llm]\ntemperature = 3.0",
        "[unknown]\nx = 1",
    ] {
        let err = Config::from_toml_str(bad).unwrap_err();
        assert!(err.is_fatal(), "expected configuration error for {bad:?}, got {err}");
    }
}

#[test]
fn test_overrides_take_precedence() {
    let mut config = Config::from_toml_str("[llm]\nprovider = \"claude\"\nmodel = \"claude-x\"").unwrap();
    config.apply_overrides(&Overrides {
        provider: Some("openai".into()),
        output: Some(PathBuf::from("out.csv")),
        ..Default::default()
    });
    assert_eq!(config.backend_kind().unwrap(), BackendKind::Gpt);
    assert_eq!(config.llm.model, None);
    assert_eq!(config.run.output_csv, PathBuf::from("out.csv"));
    assert_eq!(config.screening_csv(), PathBuf::from("out.csv"));
}

#[test]
fn test_screening_csv_default_is_timestamped() {
    let config = Config::default();
    let name = config.screening_csv().display().to_string();
    assert!(name.starts_with("systematic_review_claude_"));
    assert!(name.ends_with(".csv"));
}

#[test]
fn test_missing_schema_file_is_fatal() {
    let config = Config::from_toml_str("[schema]\npath = \"/nonexistent/schema.toml\"").unwrap();
    assert!(config.schema().unwrap_err().is_fatal());
}
