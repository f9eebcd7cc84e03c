//! Terminal summary of a diff

use console::style;
use fluxpreview_core::DiffReport;

/// Colored one-line summary
pub fn summary_line(report: &DiffReport) -> String {
    if report.is_empty() {
        return format!("{} No changes", style("✓").green());
    }

    let changed = report.changed().len();
    format!(
        "{} {} added, {} deleted, {} changed, {} unchanged",
        style("→").blue().bold(),
        style(report.added.len()).green(),
        style(report.deleted.len()).red(),
        style(changed).yellow(),
        report.modified.len() - changed
    )
}

/// One line per identity that shows up in the diff, with a change marker
pub fn changed_ids(report: &DiffReport) -> Vec<String> {
    let added = report.added.iter().map(|id| format!("{} {}", style("+").green(), id));
    let deleted = report.deleted.iter().map(|id| format!("{} {}", style("-").red(), id));
    let changed = report
        .changed()
        .into_iter()
        .map(|id| format!("{} {}", style("~").yellow(), id));
    added.chain(deleted).chain(changed).collect()
}
