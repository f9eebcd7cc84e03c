//! CLI error types with exit code handling
//!
//! Library errors are folded into [`CliError`], which carries the exit code
//! the process ends with.

use miette::Diagnostic;
use thiserror::Error;

use fluxpreview_core::CoreError;
use fluxpreview_render::RenderError;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Invalid declarations, filter configuration or settings
    #[error("Configuration error: {message}")]
    #[diagnostic(code(fluxpreview::cli::config))]
    Configuration {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Chart rendering failed
    #[error("Template error: {message}")]
    #[diagnostic(code(fluxpreview::cli::template))]
    Template {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Repository index or chart could not be obtained
    #[error("Repository error: {message}")]
    #[diagnostic(code(fluxpreview::cli::repository))]
    Repository { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(fluxpreview::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(fluxpreview::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Configuration { .. } => exit_codes::CONFIG_ERROR,
            CliError::Template { .. } => exit_codes::TEMPLATE_ERROR,
            CliError::Repository { .. } => exit_codes::REPOSITORY_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            help: None,
        }
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        CliError::Io {
            message: err.to_string(),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Io(e) => e.into(),
            other => CliError::configuration(other.to_string()),
        }
    }
}

impl From<RenderError> for CliError {
    fn from(err: RenderError) -> Self {
        let help = err.help().map(|h| h.to_string());
        let message = err.to_string();
        match err {
            RenderError::Engine { .. } => CliError::Template { message, help },
            RenderError::Chart { .. } => CliError::Repository { message },
            RenderError::Io(_) | RenderError::Core(CoreError::Io(_)) => CliError::Io { message },
            RenderError::Task(_) => CliError::Internal { message },
            _ => CliError::Configuration { message, help },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
