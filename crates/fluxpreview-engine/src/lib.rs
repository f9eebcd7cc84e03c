//! fluxpreview Engine - chart rendering for dry-run installs
//!
//! Charts are rendered with MiniJinja, extended with the Helm helpers charts
//! use most (`toyaml`, `b64encode`, `nindent`, `required`, `printf`, ...).
//! Failures carry source-mapped diagnostics.

pub mod engine;
pub mod error;
pub mod filters;
pub mod functions;

pub use engine::{
    ChartEngine, ChartEngineBuilder, HOOK_ANNOTATION, HookManifest, InstallOptions,
    RenderedRelease, TemplateEngine,
};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
