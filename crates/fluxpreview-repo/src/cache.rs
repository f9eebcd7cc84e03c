//! Process-wide repository cache
//!
//! Indexes are looked up by repository URL without locking. A miss takes the
//! single download lock, re-checks, and only then downloads the index,
//! persists it under the cache directory, records the repository in the
//! pointer file and publishes the parsed index. Each distinct URL is
//! therefore downloaded at most once per cache.

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

use fluxpreview_core::Chart;

use crate::client::RepositoryClient;
use crate::config::{RepositoryEntry, RepositoryFile};
use crate::error::{RepoError, Result};
use crate::index::{ChartVersion, RepositoryIndex};

/// Shared cache of repository indexes
pub struct RepositoryCache {
    client: Arc<dyn RepositoryClient>,
    /// Index files are written here as `<name>-index.yaml`
    cache_dir: PathBuf,
    /// Helm-style `repositories.yaml`
    config_path: PathBuf,
    indexes: DashMap<String, Arc<RepositoryIndex>>,
    download_lock: Mutex<()>,
}

impl RepositoryCache {
    pub fn new(
        client: Arc<dyn RepositoryClient>,
        cache_dir: impl Into<PathBuf>,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            cache_dir: cache_dir.into(),
            config_path: config_path.into(),
            indexes: DashMap::new(),
            download_lock: Mutex::new(()),
        }
    }

    /// Path of the persisted index for a repository name
    pub fn index_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}-index.yaml", name))
    }

    /// Number of distinct repository URLs loaded so far
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Index for `entry`, downloading it on first use
    pub async fn ensure_index(&self, entry: &RepositoryEntry) -> Result<Arc<RepositoryIndex>> {
        if let Some(index) = self.indexes.get(&entry.url) {
            return Ok(Arc::clone(&index));
        }

        let _guard = self.download_lock.lock().await;
        if let Some(index) = self.indexes.get(&entry.url) {
            return Ok(Arc::clone(&index));
        }

        let bytes = self.client.fetch_index(entry).await?;
        let index = Arc::new(RepositoryIndex::from_bytes(&entry.index_url(), &bytes)?);

        tokio::fs::create_dir_all(&self.cache_dir).await?;
        tokio::fs::write(self.index_path(&entry.name), &bytes).await?;
        self.record(entry).await?;

        tracing::info!(
            repo = %entry.name,
            url = %entry.url,
            charts = index.entries.len(),
            "Loaded repository index"
        );
        self.indexes.insert(entry.url.clone(), Arc::clone(&index));
        Ok(index)
    }

    /// Add the entry to the pointer file when its name is new
    async fn record(&self, entry: &RepositoryEntry) -> Result<()> {
        let path = self.config_path.clone();
        let entry = entry.clone();
        tokio::task::spawn_blocking(move || {
            let mut file = RepositoryFile::load_or_default(&path)?;
            if file.has(&entry.name) {
                return Ok(());
            }
            file.update(entry);
            file.save_to(&path)
        })
        .await
        .map_err(|e| RepoError::Io(std::io::Error::other(e)))?
    }

    /// Resolve, download and load a chart
    pub async fn fetch_chart(
        &self,
        entry: &RepositoryEntry,
        chart: &str,
        constraint: &str,
    ) -> Result<Chart> {
        let index = self.ensure_index(entry).await?;
        let version = index.find_best_match(&entry.name, chart, constraint)?;

        let url = version.download_url().ok_or_else(|| RepoError::NoDownloadUrl {
            chart: chart.to_string(),
            version: version.version.clone(),
        })?;
        let url = entry.resolve_url(url)?;

        let bytes = self.client.fetch_chart(entry, &url).await?;
        verify_digest(version, &bytes)?;

        tracing::debug!(chart, version = %version.version, repo = %entry.name, "Fetched chart");
        Chart::from_archive(&bytes).map_err(|source| RepoError::InvalidChart {
            chart: format!("{}@{}", chart, version.version),
            source,
        })
    }
}

fn verify_digest(version: &ChartVersion, data: &[u8]) -> Result<()> {
    let Some(expected) = version.digest.as_deref().map(normalize_digest) else {
        return Ok(());
    };
    if expected.is_empty() {
        return Ok(());
    }

    let actual = hex::encode(Sha256::digest(data));
    if expected != actual {
        return Err(RepoError::IntegrityCheckFailed {
            chart: format!("{}@{}", version.name, version.version),
            expected,
            actual,
        });
    }
    Ok(())
}

fn normalize_digest(digest: &str) -> String {
    digest
        .trim()
        .to_lowercase()
        .trim_start_matches("sha256:")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::client::HttpClient;

    fn chart_archive() -> Vec<u8> {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("demo");
        std::fs::create_dir_all(dir.join("templates")).unwrap();
        std::fs::write(dir.join("Chart.yaml"), "apiVersion: v2\nname: demo\nversion: 1.0.0\n").unwrap();
        std::fs::write(dir.join("templates/cm.yaml"), "kind: ConfigMap\n").unwrap();
        fluxpreview_core::package_dir(&dir).unwrap()
    }

    fn index_yaml(digest: &str) -> String {
        format!(
            "apiVersion: v1\nentries:\n  demo:\n    - name: demo\n      version: 1.0.0\n      urls: [charts/demo-1.0.0.tgz]\n      digest: \"{}\"\n",
            digest
        )
    }

    /// Serves a fixed index and archive while counting index requests
    struct CountingClient {
        index: String,
        archive: Vec<u8>,
        index_calls: AtomicUsize,
        index_urls: std::sync::Mutex<Vec<String>>,
        chart_urls: std::sync::Mutex<Vec<String>>,
    }

    #[async_trait]
    impl RepositoryClient for CountingClient {
        async fn fetch_index(&self, entry: &RepositoryEntry) -> Result<Vec<u8>> {
            self.index_calls.fetch_add(1, Ordering::SeqCst);
            self.index_urls.lock().unwrap().push(entry.url.clone());
            tokio::task::yield_now().await;
            Ok(self.index.clone().into_bytes())
        }

        async fn fetch_chart(&self, _entry: &RepositoryEntry, url: &str) -> Result<Vec<u8>> {
            self.chart_urls.lock().unwrap().push(url.to_string());
            Ok(self.archive.clone())
        }
    }

    fn counting(digest: &str) -> Arc<CountingClient> {
        Arc::new(CountingClient {
            index: index_yaml(digest),
            archive: chart_archive(),
            index_calls: AtomicUsize::new(0),
            index_urls: std::sync::Mutex::new(Vec::new()),
            chart_urls: std::sync::Mutex::new(Vec::new()),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_single_index_download_under_concurrency() {
        let temp = TempDir::new().unwrap();
        let client = counting("");
        let cache = Arc::new(RepositoryCache::new(
            client.clone(),
            temp.path().join("cache"),
            temp.path().join("repositories.yaml"),
        ));
        let entry = RepositoryEntry::new("flux-system-demo", "https://charts.example.com");

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let entry = entry.clone();
                tokio::spawn(async move { cache.ensure_index(&entry).await.map(|_| ()) })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        assert_eq!(client.index_calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        assert!(temp.path().join("cache/flux-system-demo-index.yaml").exists());

        let file = RepositoryFile::load_or_default(&temp.path().join("repositories.yaml")).unwrap();
        assert_eq!(file.repositories.len(), 1);
        assert_eq!(file.repositories[0].url, "https://charts.example.com");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_distinct_urls_downloaded_independently() {
        let temp = TempDir::new().unwrap();
        let client = counting("");
        let cache = Arc::new(RepositoryCache::new(
            client.clone(),
            temp.path().join("cache"),
            temp.path().join("repositories.yaml"),
        ));
        let entries = [
            RepositoryEntry::new("flux-system-one", "https://one.example.com"),
            RepositoryEntry::new("flux-system-two", "https://two.example.com"),
        ];

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                let entry = entries[i % 2].clone();
                tokio::spawn(async move { cache.ensure_index(&entry).await.map(|_| ()) })
            })
            .collect();
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let mut urls = client.index_urls.lock().unwrap().clone();
        urls.sort();
        assert_eq!(urls, vec!["https://one.example.com", "https://two.example.com"]);
        assert_eq!(cache.len(), 2);
        assert!(temp.path().join("cache/flux-system-one-index.yaml").exists());
        assert!(temp.path().join("cache/flux-system-two-index.yaml").exists());

        let file = RepositoryFile::load_or_default(&temp.path().join("repositories.yaml")).unwrap();
        let mut names: Vec<_> = file.repositories.iter().map(|r| r.name.as_str()).collect();
        names.sort();
        assert_eq!(names, vec!["flux-system-one", "flux-system-two"]);
    }

    #[tokio::test]
    async fn test_pointer_file_keeps_existing_entry() {
        let temp = TempDir::new().unwrap();
        let config = temp.path().join("repositories.yaml");
        let mut file = RepositoryFile::default();
        file.update(RepositoryEntry::new("flux-system-demo", "https://old.example.com"));
        file.save_to(&config).unwrap();

        let cache = RepositoryCache::new(counting(""), temp.path().join("cache"), &config);
        cache
            .ensure_index(&RepositoryEntry::new("flux-system-demo", "https://new.example.com"))
            .await
            .unwrap();

        let file = RepositoryFile::load_or_default(&config).unwrap();
        assert_eq!(file.repositories[0].url, "https://old.example.com");
    }

    #[tokio::test]
    async fn test_fetch_chart_resolves_relative_url() {
        let temp = TempDir::new().unwrap();
        let client = counting("");
        let cache = RepositoryCache::new(client.clone(), temp.path().join("c"), temp.path().join("r.yaml"));
        let entry = RepositoryEntry::new("r", "https://charts.example.com/stable/");

        let chart = cache.fetch_chart(&entry, "demo", "*").await.unwrap();
        assert_eq!(chart.name(), "demo");
        assert_eq!(
            client.chart_urls.lock().unwrap().as_slice(),
            ["https://charts.example.com/stable/charts/demo-1.0.0.tgz".to_string()]
        );
    }

    #[tokio::test]
    async fn test_digest_mismatch() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(counting("sha256:00ff"), temp.path().join("c"), temp.path().join("r.yaml"));
        let entry = RepositoryEntry::new("r", "https://charts.example.com");

        let err = cache.fetch_chart(&entry, "demo", "1.0.0").await.unwrap_err();
        assert!(matches!(err, RepoError::IntegrityCheckFailed { .. }));
    }

    #[tokio::test]
    async fn test_digest_match() {
        let archive = chart_archive();
        let digest = hex::encode(Sha256::digest(&archive));
        let temp = TempDir::new().unwrap();
        let client = Arc::new(CountingClient {
            index: index_yaml(&digest),
            archive,
            index_calls: AtomicUsize::new(0),
            index_urls: std::sync::Mutex::new(Vec::new()),
            chart_urls: std::sync::Mutex::new(Vec::new()),
        });
        let cache = RepositoryCache::new(client, temp.path().join("c"), temp.path().join("r.yaml"));

        let chart = cache
            .fetch_chart(&RepositoryEntry::new("r", "https://x.example.com"), "demo", "")
            .await
            .unwrap();
        let templates: BTreeMap<_, _> = chart.templates().collect();
        assert!(templates.contains_key("templates/cm.yaml"));
    }

    #[tokio::test]
    async fn test_http_index_downloaded_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/index.yaml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(index_yaml("")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/charts/demo-1.0.0.tgz"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(chart_archive()))
            .expect(2)
            .mount(&server)
            .await;

        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(
            Arc::new(HttpClient::new()),
            temp.path().join("c"),
            temp.path().join("r.yaml"),
        );
        let entry = RepositoryEntry::new("default-demo", server.uri());

        let (a, b) = tokio::join!(
            cache.fetch_chart(&entry, "demo", "*"),
            cache.fetch_chart(&entry, "demo", "1.0.0")
        );
        assert_eq!(a.unwrap().name(), "demo");
        assert_eq!(b.unwrap().name(), "demo");
    }

    #[tokio::test]
    async fn test_unknown_chart() {
        let temp = TempDir::new().unwrap();
        let cache = RepositoryCache::new(counting(""), temp.path().join("c"), temp.path().join("r.yaml"));
        let err = cache
            .fetch_chart(&RepositoryEntry::new("r", "https://x.example.com"), "nginx", "*")
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::ChartNotFound { .. }));
    }
}
