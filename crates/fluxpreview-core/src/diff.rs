//! Diff engine for comparing two rendered stores
//!
//! Documents are aligned by identity. Every identity present on both sides
//! is reported as modified, even when the bodies match; such pairs simply
//! produce an empty diff block.

use similar::TextDiff;
use std::io;

use crate::document::ResId;
use crate::error::Result;
use crate::store::ResourceStore;

/// Aligns two stores and produces unified diffs per document
#[derive(Debug, Clone)]
pub struct DiffEngine {
    /// Context lines around changes
    pub context_lines: usize,
}

impl Default for DiffEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffEngine {
    pub fn new() -> Self {
        Self { context_lines: 3 }
    }

    pub fn with_context(mut self, lines: usize) -> Self {
        self.context_lines = lines;
        self
    }

    /// Compare `before` with `after`
    pub fn diff(&self, before: &ResourceStore, after: &ResourceStore) -> Result<DiffReport> {
        let mut report = DiffReport::default();

        for doc in before.iter() {
            if after.contains(doc.id()) {
                report.modified.push(doc.id().clone());
            } else {
                report.deleted.push(doc.id().clone());
            }
        }
        for doc in after.iter() {
            if !before.contains(doc.id()) {
                report.added.push(doc.id().clone());
            }
        }

        for id in &report.added {
            let new = after.get(id)?.to_yaml()?;
            report.blocks.push(self.block(id, "", &new));
        }
        for id in &report.deleted {
            let old = before.get(id)?.to_yaml()?;
            report.blocks.push(self.block(id, &old, ""));
        }
        for id in &report.modified {
            let old = before.get(id)?.to_yaml()?;
            let new = after.get(id)?.to_yaml()?;
            report.blocks.push(self.block(id, &old, &new));
        }

        Ok(report)
    }

    fn block(&self, id: &ResId, old: &str, new: &str) -> DiffBlock {
        let label = id.to_string();
        let text = TextDiff::from_lines(old, new)
            .unified_diff()
            .context_radius(self.context_lines)
            .header(&label, &label)
            .to_string();

        DiffBlock {
            id: id.clone(),
            text,
        }
    }
}

/// Unified diff text for one identity
#[derive(Debug, Clone, PartialEq)]
pub struct DiffBlock {
    pub id: ResId,
    /// Empty when both sides are identical
    pub text: String,
}

/// Outcome of a store comparison
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    pub added: Vec<ResId>,
    pub deleted: Vec<ResId>,
    pub modified: Vec<ResId>,
    /// Blocks in output order: added, deleted, then modified
    pub blocks: Vec<DiffBlock>,
}

impl DiffReport {
    /// Modified identities whose bodies actually differ
    pub fn changed(&self) -> Vec<&ResId> {
        self.modified
            .iter()
            .filter(|id| self.block(id).is_some_and(|text| !text.is_empty()))
            .collect()
    }

    pub fn block(&self, id: &ResId) -> Option<&str> {
        self.blocks
            .iter()
            .find(|b| &b.id == id)
            .map(|b| b.text.as_str())
    }

    /// True when nothing was added, deleted or changed
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.changed().is_empty()
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "No changes".to_string();
        }
        format!(
            "{} added, {} deleted, {} modified ({} changed)",
            self.added.len(),
            self.deleted.len(),
            self.modified.len(),
            self.changed().len()
        )
    }

    /// Full diff text, blocks concatenated without separators
    pub fn text(&self) -> String {
        self.blocks.iter().map(|b| b.text.as_str()).collect()
    }

    pub fn write_to<W: io::Write>(&self, mut out: W) -> io::Result<()> {
        for block in &self.blocks {
            out.write_all(block.text.as_bytes())?;
        }
        out.flush()
    }
}
