//! Repository previews: render one checkout, or diff two
//!
//! Loading a checkout builds each kustomization entry point, renders the
//! HelmReleases found in the result and finally runs the filter pipeline.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fluxpreview_core::{
    DiffEngine, DiffReport, FilterPipeline, NativeOverlay, OverlayBuilder, ResourceStore,
};

use crate::error::{RenderError, Result};
use crate::runner::ChartRunner;
use crate::task::build_tasks;

/// Builder for [`Preview`]
#[derive(Default)]
pub struct PreviewBuilder {
    kustomizations: Vec<PathBuf>,
    runner: Option<ChartRunner>,
    filters: Option<FilterPipeline>,
    overlay: Option<Arc<dyn OverlayBuilder>>,
}

impl PreviewBuilder {
    /// Entry point relative to the repository root
    pub fn kustomization(mut self, path: impl Into<PathBuf>) -> Self {
        self.kustomizations.push(path.into());
        self
    }

    pub fn kustomizations<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.kustomizations.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Render HelmReleases with this runner
    pub fn helm(mut self, runner: ChartRunner) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn filters(mut self, filters: FilterPipeline) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn overlay(mut self, overlay: Arc<dyn OverlayBuilder>) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn build(self) -> Preview {
        Preview {
            kustomizations: self.kustomizations,
            runner: self.runner,
            filters: self.filters.unwrap_or_default(),
            overlay: self.overlay.unwrap_or_else(|| Arc::new(NativeOverlay)),
        }
    }
}

/// Render/diff entry point over repository checkouts
pub struct Preview {
    kustomizations: Vec<PathBuf>,
    runner: Option<ChartRunner>,
    filters: FilterPipeline,
    overlay: Arc<dyn OverlayBuilder>,
}

impl Preview {
    pub fn builder() -> PreviewBuilder {
        PreviewBuilder::default()
    }

    pub fn runner(&self) -> Option<&ChartRunner> {
        self.runner.as_ref()
    }

    /// Build the store for one checkout
    pub async fn load(&self, repo: &Path) -> Result<ResourceStore> {
        let mut store = ResourceStore::new();

        for kustomization in &self.kustomizations {
            let path = repo.join(kustomization);
            let overlay = Arc::clone(&self.overlay);
            let target = path.clone();
            let docs = tokio::task::spawn_blocking(move || overlay.build(&target)).await?;
            docs.and_then(|docs| store.insert_all(docs))
                .map_err(|source| RenderError::Kustomization {
                    path: path.display().to_string(),
                    source,
                })?;
        }

        if let Some(runner) = &self.runner {
            let tasks = build_tasks(&store)?;
            tracing::info!(repo = %repo.display(), releases = tasks.len(), "Rendering HelmReleases");
            let rendered = runner.render_all(tasks).await?;
            store.insert_all(rendered.into_documents())?;
        }

        if self.filters.is_empty() {
            return Ok(store);
        }
        Ok(self.filters.apply(&store)?)
    }

    /// Write the rendered checkout as a YAML stream
    pub async fn render<W: Write>(&self, repo: &Path, mut out: W) -> Result<()> {
        let store = self.load(repo).await?;
        out.write_all(store.to_yaml()?.as_bytes())?;
        out.flush()?;
        Ok(())
    }

    /// Load both checkouts concurrently and write their diff
    pub async fn diff<W: Write>(&self, before: &Path, after: &Path, mut out: W) -> Result<DiffReport> {
        let (a, b) = tokio::try_join!(self.load(before), self.load(after))?;
        let report = DiffEngine::new().diff(&a, &b)?;
        report.write_to(&mut out)?;
        Ok(report)
    }
}
