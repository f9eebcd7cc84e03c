//! Concurrent chart rendering
//!
//! Tasks are fetched and rendered with a bounded fan-out. Every task shares
//! the runner's [`RepositoryCache`], so a repository index is downloaded
//! once no matter how many releases point at it. The first failing task
//! fails the batch and the remaining tasks are dropped.

use futures::{StreamExt, TryStreamExt, stream};
use std::sync::Arc;

use fluxpreview_core::{Document, ResourceStore};
use fluxpreview_engine::{RenderedRelease, TemplateEngine};
use fluxpreview_repo::RepositoryCache;

use crate::error::{RenderError, Result};
use crate::task::RenderTask;

pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Renders [`RenderTask`]s into documents
pub struct ChartRunner {
    cache: Arc<RepositoryCache>,
    engine: Arc<dyn TemplateEngine>,
    max_concurrency: usize,
}

impl ChartRunner {
    pub fn new(cache: Arc<RepositoryCache>, engine: Arc<dyn TemplateEngine>) -> Self {
        Self {
            cache,
            engine,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }

    /// Upper bound on tasks in flight; at least one
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    /// Render all tasks into one store
    ///
    /// Results are absorbed in task order, so when two releases produce the
    /// same identity the later task wins.
    pub async fn render_all(&self, tasks: Vec<RenderTask>) -> Result<ResourceStore> {
        let total = tasks.len();
        let mut rendered: Vec<(usize, String, Vec<Document>)> = stream::iter(tasks.into_iter().enumerate())
            .map(|(position, task)| async move {
                let release = task.release.clone();
                let docs = self.render_one(task).await?;
                Ok::<_, RenderError>((position, release, docs))
            })
            .buffer_unordered(self.max_concurrency)
            .try_collect()
            .await?;
        rendered.sort_by_key(|(position, _, _)| *position);

        let mut store = ResourceStore::new();
        for (_, release, docs) in rendered {
            for doc in docs.iter().filter(|doc| store.contains(doc.id())) {
                tracing::warn!(release = %release, id = %doc.id(), "Replacing document rendered by an earlier release");
            }
            store.absorb_all(docs);
        }

        tracing::debug!(releases = total, documents = store.len(), "Rendered charts");
        Ok(store)
    }

    async fn render_one(&self, task: RenderTask) -> Result<Vec<Document>> {
        let RenderTask {
            release,
            chart,
            version,
            repository,
            values,
            options,
        } = task;

        tracing::debug!(release = %release, chart = %chart, version = %version, repo = %repository.name, "Rendering release");
        let chart = self
            .cache
            .fetch_chart(&repository, &chart, &version)
            .await
            .map_err(|source| RenderError::Chart {
                release: release.clone(),
                source,
            })?;

        let engine = Arc::clone(&self.engine);
        let disable_hooks = options.disable_hooks;
        let rendered = tokio::task::spawn_blocking(move || engine.dry_run_install(&chart, &values, &options))
            .await?
            .map_err(|source| RenderError::Engine {
                release: release.clone(),
                source,
            })?;

        let manifest = release_manifest(&rendered, disable_hooks);
        Ok(Document::parse_all(&manifest)?)
    }
}

/// Main manifest followed by hook manifests unless hooks are disabled
fn release_manifest(rendered: &RenderedRelease, disable_hooks: bool) -> String {
    let mut out = format!("{}\n", rendered.manifest.trim());
    if !disable_hooks {
        for hook in &rendered.hooks {
            out.push_str(&format!("---\n# Source: {}\n{}\n", hook.path, hook.manifest));
        }
    }
    out
}
