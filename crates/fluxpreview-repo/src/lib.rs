//! fluxpreview Repository Access
//!
//! Helm-style chart repositories for fluxpreview:
//!
//! - **Index resolution**: `index.yaml` parsing and semver constraint matching
//! - **Scoped credentials**: basic auth only sent to the repository's origin
//! - **TLS**: per-repository CA bundles and client certificates
//! - **Shared cache**: one index download per repository URL, persisted next
//!   to a Helm-compatible `repositories.yaml`

pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod index;

pub use cache::RepositoryCache;
pub use client::{HttpClient, RepositoryClient, same_origin};
pub use config::{RepositoryEntry, RepositoryFile, TlsMaterial};
pub use error::{RepoError, Result};
pub use index::{ChartVersion, RepositoryIndex};
