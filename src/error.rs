use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum DocmetaError {
    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("parameter '{0}' cannot be empty")]
    EmptyParameter(String),

    #[error("parameter '{0}' is empty")]
    EmptyList(String),

    #[error("unsupported value for parameter '{name}': {message}")]
    UnsupportedShape { name: String, message: String },

    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),

    #[error("invalid kb_base_url: {0}")]
    #[diagnostic(help("expected something like http://127.0.0.1:5001"))]
    InvalidBaseUrl(String),

    #[error("failed to read parameters file at {0}")]
    ParamsRead(PathBuf),

    #[error("failed to parse JSON parameters: {0}")]
    ParamsParse(String),

    #[error("request error: {0}")]
    KnowledgeHttp(String),

    #[error("HTTP {status}: {message}")]
    KnowledgeStatus { status: u16, message: String },

    #[error("unexpected response format: {0}")]
    KnowledgeResponse(String),

    #[error("{message}")]
    NoDocuments { message: String, all_failed: bool },
}

impl DocmetaError {
    /// Validation failures abort the whole invocation before any dataset is queried.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DocmetaError::MissingParameter(_)
                | DocmetaError::EmptyParameter(_)
                | DocmetaError::EmptyList(_)
                | DocmetaError::UnsupportedShape { .. }
                | DocmetaError::InvalidDatasetId(_)
                | DocmetaError::InvalidBaseUrl(_)
        )
    }

    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            DocmetaError::KnowledgeHttp(_)
                | DocmetaError::KnowledgeStatus { .. }
                | DocmetaError::KnowledgeResponse(_)
        )
    }
}
