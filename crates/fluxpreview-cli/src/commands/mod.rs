//! CLI commands

pub mod diff;
pub mod render;

use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;

use fluxpreview_core::{FilterPipeline, KustomizeCli};
use fluxpreview_render::{DEFAULT_MAX_CONCURRENCY, Preview, RenderSettings};

use crate::error::Result;

/// Used when no `-k` is given
const DEFAULT_KUSTOMIZATION: &str = ".";

/// Flags shared by `render` and `diff`
#[derive(Args, Debug, Clone, Default)]
pub struct RenderArgs {
    /// Kustomization entry point relative to the repository root (repeatable)
    #[arg(short = 'k', long = "kustomization", value_name = "PATH")]
    pub kustomizations: Vec<PathBuf>,

    /// Render the HelmReleases found in the kustomizations
    #[arg(short = 'H', long = "helm")]
    pub helm: bool,

    /// Filter configuration applied to the rendered documents
    #[arg(long, value_name = "FILE")]
    pub filter_file: Option<PathBuf>,
}

impl RenderArgs {
    pub fn kustomizations(&self) -> Vec<PathBuf> {
        if self.kustomizations.is_empty() {
            vec![PathBuf::from(DEFAULT_KUSTOMIZATION)]
        } else {
            self.kustomizations.clone()
        }
    }
}

/// Repository and runner settings
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to the repositories.yaml pointer file
    #[arg(long, global = true, env = "FLUXPREVIEW_REPOSITORY_CONFIG", value_name = "FILE")]
    pub repository_config: Option<PathBuf>,

    /// Directory for downloaded repository indexes
    #[arg(long, global = true, env = "FLUXPREVIEW_REPOSITORY_CACHE", value_name = "DIR")]
    pub repository_cache: Option<PathBuf>,

    /// Maximum number of charts rendered at once
    #[arg(long, global = true, env = "FLUXPREVIEW_MAX_CONCURRENCY", default_value_t = DEFAULT_MAX_CONCURRENCY)]
    pub max_concurrency: usize,

    /// Build kustomizations with this kustomize binary instead of natively
    #[arg(long, global = true, value_name = "PATH")]
    pub kustomize_bin: Option<PathBuf>,
}

impl GlobalArgs {
    fn settings(&self) -> Result<RenderSettings> {
        let mut settings = match (&self.repository_config, &self.repository_cache) {
            (Some(config), Some(cache)) => RenderSettings::new(config, cache),
            _ => RenderSettings::from_env()?,
        };
        if let Some(path) = &self.repository_config {
            settings = settings.with_repository_config(path);
        }
        if let Some(path) = &self.repository_cache {
            settings = settings.with_repository_cache(path);
        }
        Ok(settings.with_max_concurrency(self.max_concurrency))
    }
}

/// Assemble a [`Preview`] from command line flags
pub fn build_preview(args: &RenderArgs, global: &GlobalArgs) -> Result<Preview> {
    let mut builder = Preview::builder().kustomizations(args.kustomizations());

    if args.helm {
        let settings = global.settings()?;
        tracing::debug!(
            config = %settings.repository_config.display(),
            cache = %settings.repository_cache.display(),
            max_concurrency = settings.max_concurrency,
            "Helm rendering enabled"
        );
        builder = builder.helm(settings.build_runner());
    }
    if let Some(path) = &args.filter_file {
        builder = builder.filters(FilterPipeline::from_file(path)?);
    }
    if let Some(binary) = &global.kustomize_bin {
        builder = builder.overlay(Arc::new(KustomizeCli::new(binary)));
    }

    Ok(builder.build())
}
