//! fluxpreview Render - from repository checkouts to rendered stores
//!
//! - `compose`: effective values of a HelmRelease
//! - `task`: one render task per HelmRelease, with its repository entry
//! - `runner`: bounded concurrent chart rendering over a shared repository cache
//! - `preview`: render a checkout or diff two of them
//! - `settings`: repository locations and concurrency limits

pub mod compose;
pub mod error;
pub mod preview;
pub mod runner;
pub mod settings;
pub mod task;

pub use compose::compose_values;
pub use error::{RenderError, Result};
pub use preview::{Preview, PreviewBuilder};
pub use runner::{ChartRunner, DEFAULT_MAX_CONCURRENCY};
pub use settings::RenderSettings;
pub use task::{RenderTask, build_tasks};
