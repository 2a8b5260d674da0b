use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum FlowcellError {
    #[error("input not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("malformed {input}: {message}")]
    Format { input: String, message: String },

    #[error("run folder name does not follow the <date>_<instrument>_<counter>_<flowcell> convention: {0}")]
    InvalidRunName(String),

    #[error("more than one document named {name} found in the status database ({count} rows)")]
    #[diagnostic(help("run names are expected to be unique; remove the duplicate documents before uploading again"))]
    DuplicateDocuments { name: String, count: usize },

    #[error("document {id} changed on the server since revision {rev} was read")]
    RevisionConflict { id: String, rev: String },

    #[error("status database request failed: {0}")]
    StoreHttp(String),

    #[error("status database returned status {status}: {message}")]
    StoreStatus { status: u16, message: String },

    #[error("missing config file post_process.yaml (pass --conf)")]
    MissingConfig,

    #[error("failed to read config file at {}", .0.display())]
    ConfigRead(PathBuf),

    #[error("failed to parse YAML config: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}

impl FlowcellError {
    pub fn format(input: impl Into<String>, message: impl Into<String>) -> Self {
        FlowcellError::Format {
            input: input.into(),
            message: message.into(),
        }
    }
}
