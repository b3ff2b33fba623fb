use thiserror::Error;

#[derive(Debug, Error)]
pub enum SysrevError {
    /// Bad schema or settings. Fatal: aborts the whole run.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// One extraction source failed or returned nothing for a document.
    #[error("Source {source_name} unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    /// A response or value could not be parsed into its declared shape.
    #[error("Parse degradation: {0}")]
    ParseDegradation(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SysrevError {
    pub fn config(msg: impl Into<String>) -> Self {
        SysrevError::Configuration(msg.into())
    }

    pub fn source_unavailable(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        SysrevError::SourceUnavailable {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Only configuration errors stop a run; everything else degrades one document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SysrevError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, SysrevError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_configuration_is_fatal() {
        assert!(SysrevError::config("unknown value_type 'date'").is_fatal());
        assert!(!SysrevError::source_unavailable("table", "docling timeout").is_fatal());
        assert!(!SysrevError::ParseDegradation("no fields".into()).is_fatal());
    }

    #[test]
    fn test_source_unavailable_message() {
        let err = SysrevError::source_unavailable("text", "empty response");
        assert_eq!(err.to_string(), "Source text unavailable: empty response");
    }
}
