//! Error types for the RAGVue core library.
//!
//! Uses `thiserror` for public API error types with structured variants
//! covering the judge client, metrics, configuration, datasets, and reports.

use std::path::PathBuf;

/// Top-level error type for the RAGVue core library.
#[derive(Debug, thiserror::Error)]
pub enum RagvueError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Metric error: {0}")]
    Metric(#[from] MetricError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors from judge provider interactions.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {message}")]
    ApiRequest { message: String },

    #[error("API response parse error: {message}")]
    ResponseParse { message: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Provider connection failed: {message}")]
    Connection { message: String },

    #[error("Unsupported judge provider: {provider}")]
    UnsupportedProvider { provider: String },
}

/// Errors raised while looking up or running a metric.
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    #[error("Unknown metric '{name}' (available: {})", available.join(", "))]
    UnknownMetric {
        name: String,
        available: Vec<String>,
    },

    #[error("Metric already registered: {name}")]
    AlreadyRegistered { name: String },

    #[error("{0}")]
    Llm(#[from] LlmError),

    #[error("Metric '{metric}' produced an invalid verdict: {message}")]
    InvalidVerdict { metric: String, message: String },
}

/// Errors from the configuration system.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {message}")]
    Load { message: String },

    #[error("Invalid configuration: {message}")]
    Validation { message: String },
}

/// Errors from reading or writing JSONL datasets.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("No evaluation items found in {path}")]
    Empty { path: PathBuf },
}

/// Errors from rendering or saving reports.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Unknown report format: {format} (expected json, md, csv, html, items-csv)")]
    UnknownFormat { format: String },

    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Convenience type alias for RAGVue results.
pub type Result<T> = std::result::Result<T, RagvueError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_error_display() {
        let err = LlmError::RateLimited {
            retry_after_secs: 30,
        };
        assert_eq!(err.to_string(), "Rate limited by provider, retry after 30s");
    }

    #[test]
    fn test_unknown_metric_lists_available() {
        let err = MetricError::UnknownMetric {
            name: "bleu".to_string(),
            available: vec!["clarity".to_string(), "answer_relevance".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unknown metric 'bleu' (available: clarity, answer_relevance)"
        );
    }

    #[test]
    fn test_metric_error_wraps_llm_error() {
        let err: MetricError = LlmError::Timeout { timeout_secs: 60 }.into();
        assert_eq!(err.to_string(), "Request timed out after 60s");
    }

    #[test]
    fn test_dataset_parse_error_display() {
        let err = DatasetError::Parse {
            line: 3,
            message: "expected value".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid JSON on line 3: expected value");
    }

    #[test]
    fn test_ragvue_error_from_report_error() {
        let err: RagvueError = ReportError::UnknownFormat {
            format: "pdf".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Report error: Unknown report format: pdf"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RagvueError = io_err.into();
        assert!(matches!(err, RagvueError::Io(_)));
    }
}
