//! Core error types

use thiserror::Error;

use crate::document::ResId;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("may not add resource with an already registered id: {id}")]
    DuplicateResource { id: ResId },

    #[error("resource not found: {id}")]
    ResourceNotFound { id: ResId },

    #[error("Invalid document #{index}: {message}")]
    InvalidDocument { index: usize, message: String },

    #[error("Failed to decode {id} as {target}: {message}")]
    Decode {
        id: ResId,
        target: &'static str,
        message: String,
    },

    #[error("Chart not found: {path}")]
    ChartNotFound { path: String },

    #[error("Invalid chart: {message}")]
    InvalidChart { message: String },

    #[error("Overlay build failed for {path}: {message}")]
    Overlay { path: String, message: String },

    #[error("{message}")]
    UnknownFilter { message: String },

    #[error("Invalid {kind} filter configuration: {message}")]
    FilterConfig { kind: String, message: String },

    #[error("Filter {filter} failed on {id}: path '{path}' does not point to a map")]
    MalformedPath {
        filter: String,
        id: ResId,
        path: String,
    },

    #[error("Filter {filter} changed the identity of {id}")]
    IdentityChanged { filter: String, id: ResId },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Values merge error: {message}")]
    ValuesMerge { message: String },
}

pub type Result<T> = std::result::Result<T, CoreError>;
