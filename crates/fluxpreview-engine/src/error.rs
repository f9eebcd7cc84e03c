//! Engine errors with source-mapped template diagnostics

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::engine::{FILTER_NAMES, FUNCTION_NAMES};

/// Errors raised while rendering a chart
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error("{chart}: {error}")]
    #[diagnostic(code(fluxpreview::engine::render))]
    Template {
        chart: String,
        error: Box<TemplateError>,
    },

    #[error("{chart}: YAML parse error on {path}: {message}")]
    #[diagnostic(
        code(fluxpreview::engine::manifest),
        help("check the rendered output of this template for indentation problems")
    )]
    InvalidManifest {
        chart: String,
        path: String,
        message: String,
    },

    #[error(transparent)]
    Core(#[from] fluxpreview_core::CoreError),
}

impl EngineError {
    pub fn template_kind(&self) -> Option<TemplateErrorKind> {
        match self {
            Self::Template { error, .. } => Some(error.kind),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateErrorKind {
    Undefined,
    UnknownFilter,
    UnknownFunction,
    Syntax,
    Type,
    Failed,
    Other,
}

impl From<minijinja::ErrorKind> for TemplateErrorKind {
    fn from(kind: minijinja::ErrorKind) -> Self {
        use minijinja::ErrorKind as K;
        match kind {
            K::UndefinedError => Self::Undefined,
            K::UnknownFilter => Self::UnknownFilter,
            K::UnknownFunction => Self::UnknownFunction,
            K::SyntaxError | K::BadEscape => Self::Syntax,
            K::NonPrimitive | K::NonKey | K::MissingArgument | K::TooManyArguments => Self::Type,
            K::InvalidOperation => Self::Failed,
            _ => Self::Other,
        }
    }
}

/// A template failure pointing at the offending line
#[derive(Error, Debug, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(fluxpreview::engine::template))]
pub struct TemplateError {
    pub message: String,
    pub kind: TemplateErrorKind,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("here")]
    pub span: Option<SourceSpan>,
    #[help]
    pub suggestion: Option<String>,
}

impl TemplateError {
    pub fn from_minijinja(err: &minijinja::Error, name: &str, source: &str) -> Self {
        let kind = TemplateErrorKind::from(err.kind());
        let message = match err.detail() {
            Some(detail) => format!("{} ({}:{})", detail, name, err.line().unwrap_or(0)),
            None => format!("{} ({}:{})", err, name, err.line().unwrap_or(0)),
        };

        Self {
            message,
            kind,
            src: NamedSource::new(name, source.to_string()),
            span: err.line().and_then(|line| line_span(source, line)),
            suggestion: suggest(kind, err),
        }
    }
}

/// Byte span of a 1-based line
fn line_span(source: &str, line: usize) -> Option<SourceSpan> {
    let mut offset = 0;
    for (idx, text) in source.split('\n').enumerate() {
        if idx + 1 == line {
            return Some(SourceSpan::new(offset.into(), text.len()));
        }
        offset += text.len() + 1;
    }
    None
}

fn suggest(kind: TemplateErrorKind, err: &minijinja::Error) -> Option<String> {
    let candidates = match kind {
        TemplateErrorKind::UnknownFilter => FILTER_NAMES,
        TemplateErrorKind::UnknownFunction => FUNCTION_NAMES,
        TemplateErrorKind::Undefined => {
            return Some("use `| default(...)` or guard the block with `{% if %}`".to_string());
        }
        _ => return None,
    };

    // the offending name is somewhere in the message; take the best match of any word
    let message = err.to_string();
    message
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .filter_map(|w| closest(w, candidates).map(|c| (c, strsim::levenshtein(w, c))))
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
        .map(|name| format!("did you mean `{}`?", name))
        .or_else(|| Some(format!("available: {}", candidates.join(", "))))
}

fn closest<'a>(wanted: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .map(|c| (*c, strsim::levenshtein(wanted, c)))
        .filter(|(_, d)| *d <= 2)
        .min_by_key(|(_, d)| *d)
        .map(|(c, _)| c)
}

pub type Result<T> = std::result::Result<T, EngineError>;
