//! fluxpreview Core - documents, stores and the render/diff building blocks
//!
//! This crate provides the foundational types used throughout fluxpreview:
//! - `Document` / `ResId`: rendered objects and their identities
//! - `ResourceStore`: insertion-ordered set of documents
//! - `Values`: configuration values with deep merge and `--set` paths
//! - `HelmRelease` / `HelmRepository`: typed Flux declarations
//! - `Chart`: chart packages loaded from directories or archives
//! - `OverlayBuilder`: kustomization entry points to documents
//! - `FilterPipeline`: declarative document transforms
//! - `DiffEngine`: identity-aligned unified diffs

pub mod chart;
pub mod diff;
pub mod document;
pub mod error;
pub mod filter;
pub mod overlay;
pub mod release;
pub mod source;
pub mod store;
pub mod values;

pub use chart::{Chart, ChartMetadata, package_dir};
pub use diff::{DiffBlock, DiffEngine, DiffReport};
pub use document::{DEFAULT_NAMESPACE, Document, Gvk, ResId, is_cluster_scoped};
pub use error::{CoreError, Result};
pub use filter::{Filter, FilterPipeline};
pub use overlay::{KustomizeCli, NativeOverlay, OverlayBuilder};
pub use release::{HelmRelease, ReleaseInfo, ValuesReference};
pub use source::{DataKind, DataObject, HelmRepository};
pub use store::ResourceStore;
pub use values::{Assign, Values};
