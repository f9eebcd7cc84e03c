//! Diff command - compare the rendered output of two checkouts

use std::io::Write;
use std::path::{Path, PathBuf};

use super::{GlobalArgs, RenderArgs, build_preview};
use crate::display;
use crate::error::Result;
use crate::report::{DEFAULT_TEMPLATE, MarkdownContext, write_markdown};

/// Report options of the diff command
#[derive(Debug, Clone, Default)]
pub struct DiffOutput {
    pub markdown_out: Option<PathBuf>,
    pub markdown_template: Option<PathBuf>,
    pub summary: bool,
}

pub async fn run(
    repo_a: &Path,
    repo_b: &Path,
    args: &RenderArgs,
    global: &GlobalArgs,
    output: &DiffOutput,
) -> Result<()> {
    let preview = build_preview(args, global)?;

    let mut diff = Vec::new();
    let report = preview.diff(repo_a, repo_b, &mut diff).await?;

    let mut stdout = std::io::stdout();
    stdout.write_all(&diff)?;
    stdout.flush()?;

    if output.summary {
        eprintln!("{}", display::summary_line(&report));
        for line in display::changed_ids(&report) {
            eprintln!("  {}", line);
        }
    }

    if let Some(path) = &output.markdown_out {
        let template = match &output.markdown_template {
            Some(file) => std::fs::read_to_string(file)?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        let text = String::from_utf8_lossy(&diff);
        let context = MarkdownContext {
            diff: &text,
            repo_a: repo_a.display().to_string(),
            repo_b: repo_b.display().to_string(),
            kustomizations: args
                .kustomizations()
                .iter()
                .map(|k| k.display().to_string())
                .collect(),
            summary: report.summary(),
        };
        write_markdown(path, &template, &context)?;
    }

    Ok(())
}
