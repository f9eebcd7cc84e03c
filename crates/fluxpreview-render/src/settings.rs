//! Runner settings

use std::path::PathBuf;
use std::sync::Arc;

use fluxpreview_engine::ChartEngine;
use fluxpreview_repo::{HttpClient, RepositoryCache};

use crate::error::{RenderError, Result};
use crate::runner::{ChartRunner, DEFAULT_MAX_CONCURRENCY};

/// Locations and limits used when rendering charts
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Helm-style `repositories.yaml`
    pub repository_config: PathBuf,
    /// Directory receiving downloaded index files
    pub repository_cache: PathBuf,
    pub max_concurrency: usize,
}

impl RenderSettings {
    pub fn new(repository_config: impl Into<PathBuf>, repository_cache: impl Into<PathBuf>) -> Self {
        Self {
            repository_config: repository_config.into(),
            repository_cache: repository_cache.into(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Defaults under the user's config and cache directories
    pub fn from_env() -> Result<Self> {
        let config_dir = dirs::config_dir().ok_or_else(|| RenderError::Settings {
            message: "Could not determine config directory".to_string(),
        })?;
        let cache_dir = dirs::cache_dir().ok_or_else(|| RenderError::Settings {
            message: "Could not determine cache directory".to_string(),
        })?;

        Ok(Self::new(
            config_dir.join("fluxpreview").join("repositories.yaml"),
            cache_dir.join("fluxpreview").join("repository"),
        ))
    }

    pub fn with_repository_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository_config = path.into();
        self
    }

    pub fn with_repository_cache(mut self, path: impl Into<PathBuf>) -> Self {
        self.repository_cache = path.into();
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Runner over HTTP repositories and the MiniJinja engine
    pub fn build_runner(&self) -> ChartRunner {
        let cache = RepositoryCache::new(
            Arc::new(HttpClient::new()),
            self.repository_cache.clone(),
            self.repository_config.clone(),
        );
        ChartRunner::new(Arc::new(cache), Arc::new(ChartEngine::new()))
            .with_max_concurrency(self.max_concurrency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides() {
        let settings = RenderSettings::new("", "")
            .with_repository_config("/tmp/repos.yaml")
            .with_repository_cache("/tmp/cache")
            .with_max_concurrency(3);

        assert_eq!(settings.repository_config, PathBuf::from("/tmp/repos.yaml"));
        assert_eq!(settings.repository_cache, PathBuf::from("/tmp/cache"));
        assert_eq!(settings.max_concurrency, 3);
        assert!(settings.build_runner().cache().is_empty());
    }
}
