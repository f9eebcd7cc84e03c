//! Repository entries and the `repositories.yaml` pointer file
//!
//! The pointer file uses Helm's layout so existing Helm tooling can read it.
//! Credentials and TLS material stay in memory and are never written out.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{RepoError, Result};

/// Connection settings for one chart repository
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    /// `<namespace>-<name>` of the declaring HelmRepository
    pub name: String,

    pub url: String,

    #[serde(default, skip_serializing)]
    pub username: Option<String>,

    #[serde(default, skip_serializing)]
    pub password: Option<String>,

    #[serde(skip)]
    pub tls: TlsMaterial,

    #[serde(default)]
    pub insecure_skip_tls_verify: bool,

    /// Send credentials to every host, not only the repository's origin
    #[serde(default)]
    pub pass_credentials_all: bool,
}

/// PEM-encoded TLS material
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TlsMaterial {
    pub ca: Option<String>,
    pub cert: Option<String>,
    pub key: Option<String>,
}

impl TlsMaterial {
    pub fn is_empty(&self) -> bool {
        self.ca.is_none() && self.cert.is_none() && self.key.is_none()
    }
}

impl RepositoryEntry {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// `<url>/index.yaml`
    pub fn index_url(&self) -> String {
        format!("{}/index.yaml", self.url.trim_end_matches('/'))
    }

    /// Resolve a chart URL from the index against the repository URL
    pub fn resolve_url(&self, chart_url: &str) -> Result<String> {
        let invalid = |reason: String| RepoError::InvalidRepositoryUrl {
            url: self.url.clone(),
            reason,
        };
        let base = url::Url::parse(&format!("{}/", self.url.trim_end_matches('/')))
            .map_err(|e| invalid(e.to_string()))?;
        base.join(chart_url)
            .map(String::from)
            .map_err(|e| invalid(e.to_string()))
    }
}

/// Helm-compatible `repositories.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryFile {
    #[serde(default)]
    pub api_version: String,

    #[serde(default)]
    pub generated: String,

    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

impl RepositoryFile {
    /// Load the file, or start empty when it does not exist yet
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Default location under the user's config directory
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| RepoError::InvalidConfig {
            message: "Could not determine config directory".to_string(),
        })?;
        Ok(config_dir.join("fluxpreview").join("repositories.yaml"))
    }

    pub fn has(&self, name: &str) -> bool {
        self.repositories.iter().any(|r| r.name == name)
    }

    /// Add or replace the entry with the same name
    pub fn update(&mut self, entry: RepositoryEntry) {
        self.generated = chrono::Utc::now().to_rfc3339();
        match self.repositories.iter_mut().find(|r| r.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.repositories.push(entry),
        }
    }
}
