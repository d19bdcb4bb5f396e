use std::path::Path;

use thiserror::Error;

/// Errors raised by the normalization / indicator library.
///
/// Structural and parsing failures abort the normalization of a single
/// source. Row-level drops (unknown case tags) and per-area degradations
/// (missing population) are reported alongside the results instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    /// Unparseable dates, values or rows in a raw source.
    #[error("malformed data in source `{source_name}` (line {line}): {reason}")]
    MalformedSourceData {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// The configured case-classification column is not present in the raw header.
    #[error("source `{source_name}` has no case-classification column `{column}`")]
    UnknownClassificationSchema { source_name: String, column: String },

    /// The raw input has no rows and the source was not declared as possibly empty.
    #[error("source `{source_name}` is empty")]
    EmptyInput { source_name: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error on '{path}': {message}")]
    Io { path: String, message: String },
}

impl PipelineError {
    pub fn malformed(source_name: &str, line: usize, reason: impl Into<String>) -> Self {
        PipelineError::MalformedSourceData {
            source_name: source_name.to_string(),
            line,
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, err: impl std::fmt::Display) -> Self {
        PipelineError::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

/// Error surfaced by the `epg` binary, carrying the process exit code.
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        // 2 = bad input/config, 3 = nothing usable to compute on.
        let exit_code = match &err {
            PipelineError::EmptyInput { .. } => 3,
            PipelineError::MalformedSourceData { .. }
            | PipelineError::UnknownClassificationSchema { .. }
            | PipelineError::Config(_)
            | PipelineError::Io { .. } => 2,
        };
        AppError::new(exit_code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_errors_map_to_exit_codes() {
        let empty: AppError = PipelineError::EmptyInput {
            source_name: "gre-nomoi".to_string(),
        }
        .into();
        assert_eq!(empty.exit_code(), 3);

        let malformed: AppError = PipelineError::malformed("cat-comarques", 7, "bad date").into();
        assert_eq!(malformed.exit_code(), 2);
        assert!(malformed.to_string().contains("line 7"));
    }
}
