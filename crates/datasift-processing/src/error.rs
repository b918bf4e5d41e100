//! Custom error types for the ingestion pipeline.
//!
//! This module provides the error hierarchy using `thiserror` for every
//! stage of a run, from resolving the source to persisting artifacts.
//!
//! Errors are serializable so front-ends can render them as `{ code, message }`
//! without matching on the variant themselves.

use serde::Serialize;
use serde::ser::SerializeStruct;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Location of a parse failure inside the decoded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ParsePosition {
    /// 1-based line number.
    pub line: u64,
    /// Byte offset into the decoded (UTF-8) text.
    pub byte: u64,
    /// 0-based record index, header included.
    pub record: u64,
}

impl From<&csv::Position> for ParsePosition {
    fn from(pos: &csv::Position) -> Self {
        Self {
            line: pos.line(),
            byte: pos.byte(),
            record: pos.record(),
        }
    }
}

impl fmt::Display for ParsePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} (byte {}, record {})", self.line, self.byte, self.record)
    }
}

/// The main error type for the ingestion pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The submitted source cannot be used (bad path, unreadable file).
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Retrieving a URL failed or returned a non-200 status.
    #[error("Failed to fetch CSV from '{url}': {reason}")]
    FetchFailed { url: String, reason: String },

    /// No usable encoding could be determined for the payload.
    #[error("Could not detect text encoding: {0}")]
    EncodingUndetected(String),

    /// The payload bytes are not valid in the guessed encoding.
    #[error("Input is not valid {encoding} (malformed bytes at offset {offset})")]
    DecodeError { encoding: String, offset: u64 },

    /// The delimited text is malformed.
    #[error("{}", format_parse_error(.message, .position))]
    ParseError {
        message: String,
        position: Option<ParsePosition>,
    },

    /// A chunk's columns differ from the first chunk's.
    #[error("Chunk {chunk} has columns {found:?}, expected {expected:?}")]
    SchemaMismatch {
        chunk: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// Writing an artifact to disk failed.
    #[error("Failed to write '{}': {source}", .path.display())]
    PersistError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Report generation failed.
    #[error("Failed to generate report: {0}")]
    ReportGenerationFailed(String),

    /// Internal error (e.g., worker thread join failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// HTTP client construction error (only with "http" feature).
    #[cfg(feature = "http")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PipelineError>,
    },
}

fn format_parse_error(message: &str, position: &Option<ParsePosition>) -> String {
    match position {
        Some(pos) => format!("Failed to parse CSV at {pos}: {message}"),
        None => format!("Failed to parse CSV: {message}"),
    }
}

impl PipelineError {
    /// Build a parse error without position information.
    pub fn parse(message: impl Into<String>) -> Self {
        PipelineError::ParseError {
            message: message.into(),
            position: None,
        }
    }

    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PipelineError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SourceUnavailable(_) => "SOURCE_UNAVAILABLE",
            Self::FetchFailed { .. } => "FETCH_FAILED",
            Self::EncodingUndetected(_) => "ENCODING_UNDETECTED",
            Self::DecodeError { .. } => "DECODE_ERROR",
            Self::ParseError { .. } => "PARSE_ERROR",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::PersistError { .. } => "PERSIST_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ReportGenerationFailed(_) => "REPORT_GENERATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            #[cfg(feature = "http")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the failure was caused by the submitted data rather than the
    /// host (disk, configuration, bugs).
    pub fn is_input_error(&self) -> bool {
        match self {
            Self::SourceUnavailable(_)
            | Self::FetchFailed { .. }
            | Self::EncodingUndetected(_)
            | Self::DecodeError { .. }
            | Self::ParseError { .. }
            | Self::SchemaMismatch { .. } => true,
            Self::WithContext { source, .. } => source.is_input_error(),
            _ => false,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for PipelineError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("PipelineError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::io::Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| PipelineError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            PipelineError::EncodingUndetected("empty".to_string()).error_code(),
            "ENCODING_UNDETECTED"
        );
        assert_eq!(
            PipelineError::FetchFailed {
                url: "http://x".to_string(),
                reason: "HTTP status 404".to_string()
            }
            .error_code(),
            "FETCH_FAILED"
        );
    }

    #[test]
    fn test_parse_error_message_includes_position() {
        let error = PipelineError::ParseError {
            message: "expected 2 fields, found 3".to_string(),
            position: Some(ParsePosition {
                line: 4,
                byte: 17,
                record: 3,
            }),
        };
        let text = error.to_string();
        assert!(text.contains("line 4"));
        assert!(text.contains("byte 17"));
        assert!(text.contains("expected 2 fields"));

        assert_eq!(
            PipelineError::parse("bad").to_string(),
            "Failed to parse CSV: bad"
        );
    }

    #[test]
    fn test_is_input_error() {
        assert!(PipelineError::parse("x").is_input_error());
        assert!(
            PipelineError::DecodeError {
                encoding: "UTF-8".to_string(),
                offset: 3
            }
            .is_input_error()
        );
        assert!(!PipelineError::Internal("join".to_string()).is_input_error());
        assert!(
            PipelineError::parse("x")
                .with_context("During load")
                .is_input_error()
        );
    }

    #[test]
    fn test_error_serialization() {
        let error = PipelineError::SourceUnavailable("missing.csv".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("SOURCE_UNAVAILABLE"));
        assert!(json.contains("missing.csv"));
    }

    #[test]
    fn test_with_context() {
        let error = PipelineError::SchemaMismatch {
            chunk: 2,
            expected: vec!["a".to_string()],
            found: vec!["b".to_string()],
        }
        .with_context("During chunked load");
        assert!(error.to_string().contains("During chunked load"));
        assert_eq!(error.error_code(), "SCHEMA_MISMATCH"); // Preserves original code
    }

    #[test]
    fn test_polars_result_context() {
        let df = polars::prelude::df!("a" => [1i64]).unwrap();
        let err = df
            .column("missing")
            .map(|_| ())
            .context("Looking up column")
            .unwrap_err();
        assert_eq!(err.error_code(), "POLARS_ERROR");
        assert!(err.to_string().starts_with("Looking up column: "));
    }

    #[cfg(feature = "http")]
    #[test]
    fn test_http_client_error_code() {
        let err = reqwest::blocking::Client::new()
            .get("not a url")
            .send()
            .unwrap_err();
        assert_eq!(PipelineError::from(err).error_code(), "HTTP_REQUEST_ERROR");
    }
}
