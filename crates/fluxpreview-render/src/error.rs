//! Render pipeline errors

use miette::Diagnostic;
use thiserror::Error;

use fluxpreview_core::CoreError;
use fluxpreview_engine::EngineError;
use fluxpreview_repo::RepoError;

#[derive(Error, Debug, Diagnostic)]
pub enum RenderError {
    // ============ Configuration Errors ============
    #[error("missing key '{key}' in {kind} '{name}'")]
    #[diagnostic(code(fluxpreview::render::missing_key))]
    MissingKey {
        key: String,
        kind: String,
        name: String,
    },

    #[error("unsupported ValuesReference kind '{kind}' in release {release}")]
    #[diagnostic(
        code(fluxpreview::render::values_kind),
        help("valuesFrom supports ConfigMap and Secret")
    )]
    UnsupportedValuesKind { release: String, kind: String },

    #[error("invalid values for release {release} from {origin}: {source}")]
    #[diagnostic(code(fluxpreview::render::values))]
    InvalidValues {
        release: String,
        origin: String,
        #[source]
        source: CoreError,
    },

    #[error("unsupported source kind '{kind}' in release {release}")]
    #[diagnostic(
        code(fluxpreview::render::source_kind),
        help("only HelmRepository chart sources can be rendered")
    )]
    UnsupportedSourceKind { release: String, kind: String },

    #[error("unable to find source '{namespace}/{name}' for release {release}")]
    #[diagnostic(code(fluxpreview::render::source_not_found))]
    SourceNotFound {
        release: String,
        name: String,
        namespace: String,
    },

    #[error("OCI repository '{name}' is not supported")]
    #[diagnostic(code(fluxpreview::render::oci))]
    UnsupportedRepository { name: String },

    // ============ Execution Errors ============
    #[error("failed to load chart for release {release}: {source}")]
    #[diagnostic(code(fluxpreview::render::chart))]
    Chart {
        release: String,
        #[source]
        source: RepoError,
    },

    #[error("failed to render release {release}: {source}")]
    #[diagnostic(code(fluxpreview::render::engine))]
    Engine {
        release: String,
        #[source]
        source: EngineError,
    },

    #[error("failed to add kustomization {path}: {source}")]
    #[diagnostic(code(fluxpreview::render::kustomization))]
    Kustomization {
        path: String,
        #[source]
        source: CoreError,
    },

    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    Settings { message: String },
}

pub type Result<T> = std::result::Result<T, RenderError>;
