//! Render command - print the flattened documents of a checkout

use std::path::Path;

use super::{GlobalArgs, RenderArgs, build_preview};
use crate::error::Result;

pub async fn run(repo: &Path, args: &RenderArgs, global: &GlobalArgs) -> Result<()> {
    let preview = build_preview(args, global)?;
    preview.render(repo, std::io::stdout()).await?;
    Ok(())
}
