//! Markdown diff report

use minijinja::Environment;
use serde::Serialize;
use std::path::Path;

use crate::error::{CliError, Result};

/// Used when no `--markdown-template` is given
pub const DEFAULT_TEMPLATE: &str = r#"### Flux preview: {{ summary }}

Comparing `{{ repo_a }}` with `{{ repo_b }}`{% if kustomizations %} ({{ kustomizations | join(", ") }}){% endif %}.

```diff
{{ diff }}```
"#;

/// Variables available to a report template
#[derive(Debug, Serialize)]
pub struct MarkdownContext<'a> {
    pub diff: &'a str,
    pub repo_a: String,
    pub repo_b: String,
    pub kustomizations: Vec<String>,
    pub summary: String,
}

pub fn render_markdown(template: &str, context: &MarkdownContext<'_>) -> Result<String> {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("report", template)
        .map_err(|e| CliError::configuration(format!("error parsing markdown template: {}", e)))?;

    env.get_template("report")
        .and_then(|tpl| tpl.render(context))
        .map_err(|e| CliError::configuration(format!("error rendering markdown template: {}", e)))
}

/// Render the report and write it to `path`
pub fn write_markdown(path: &Path, template: &str, context: &MarkdownContext<'_>) -> Result<()> {
    let markdown = render_markdown(template, context)?;
    std::fs::write(path, markdown)?;
    tracing::debug!(path = %path.display(), "Wrote markdown report");
    Ok(())
}
