//! Label and annotation removal

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{Filter, map_at_mut, paths_or_default, rebuild};
use crate::document::Document;
use crate::error::{CoreError, Result};

const LABEL_PATHS: &[&[&str]] = &[
    &["metadata", "labels"],
    &["spec", "template", "metadata", "labels"],
];

const ANNOTATION_PATHS: &[&[&str]] = &[
    &["metadata", "annotations"],
    &["spec", "template", "metadata", "annotations"],
];

/// Removes named keys from the maps found at a set of paths
///
/// Registered twice: as `LabelRemover` (configured with `labels`) and as
/// `AnnotationRemover` (configured with `annotations`).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRemover {
    kind: &'static str,
    keys: Vec<String>,
    paths: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct LabelConfig {
    #[serde(default)]
    labels: Vec<String>,
    #[serde(default)]
    paths: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct AnnotationConfig {
    #[serde(default)]
    annotations: Vec<String>,
    #[serde(default)]
    paths: Vec<Vec<String>>,
}

impl KeyRemover {
    pub fn labels(labels: Vec<String>, paths: Vec<Vec<String>>) -> Self {
        Self {
            kind: "LabelRemover",
            keys: labels,
            paths: paths_or_default(paths, LABEL_PATHS),
        }
    }

    pub fn annotations(annotations: Vec<String>, paths: Vec<Vec<String>>) -> Self {
        Self {
            kind: "AnnotationRemover",
            keys: annotations,
            paths: paths_or_default(paths, ANNOTATION_PATHS),
        }
    }

    pub(super) fn decode_labels(config: JsonValue) -> Result<Box<dyn Filter>> {
        let config: LabelConfig = serde_json::from_value(config).map_err(|e| CoreError::FilterConfig {
            kind: "LabelRemover".to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(Self::labels(config.labels, config.paths)))
    }

    pub(super) fn decode_annotations(config: JsonValue) -> Result<Box<dyn Filter>> {
        let config: AnnotationConfig =
            serde_json::from_value(config).map_err(|e| CoreError::FilterConfig {
                kind: "AnnotationRemover".to_string(),
                message: e.to_string(),
            })?;
        Ok(Box::new(Self::annotations(config.annotations, config.paths)))
    }

    pub fn paths(&self) -> &[Vec<String>] {
        &self.paths
    }
}

impl Filter for KeyRemover {
    fn kind(&self) -> &'static str {
        self.kind
    }

    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        docs.into_iter()
            .map(|doc| {
                let id = doc.id().clone();
                let mut body = doc.into_body();

                for path in &self.paths {
                    let map = map_at_mut(&mut body, path).map_err(|_| CoreError::MalformedPath {
                        filter: self.kind.to_string(),
                        id: id.clone(),
                        path: path.join("."),
                    })?;
                    if let Some(map) = map {
                        for key in &self.keys {
                            map.remove(key);
                        }
                    }
                }

                rebuild(self.kind, id, body)
            })
            .collect()
    }
}
