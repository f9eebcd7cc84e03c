//! Filter pipeline
//!
//! Filters are declaratively configured transforms applied to every rendered
//! document after loading, typically to strip noise such as chart version
//! labels before diffing. Configuration is a YAML file:
//!
//! ```yaml
//! kind: FilterConfig
//! filters:
//!   - kind: LabelRemover
//!     labels: [helm.sh/chart]
//! ```

mod fields;
mod keys;

pub use fields::FieldRemover;
pub use keys::KeyRemover;

use serde_json::{Map, Value as JsonValue};
use std::fmt::Debug;
use std::path::Path;

use crate::document::{Document, ResId};
use crate::error::{CoreError, Result};
use crate::store::ResourceStore;

const CONFIG_KIND: &str = "FilterConfig";

/// Maximum edit distance for a "did you mean" suggestion
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// A transform over the full document list
pub trait Filter: Debug + Send + Sync {
    /// Registered kind name
    fn kind(&self) -> &'static str;

    /// Transform documents; identities must be preserved
    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>>;
}

type Decoder = fn(JsonValue) -> Result<Box<dyn Filter>>;

/// Known filter kinds, sorted by name
const REGISTRY: &[(&str, Decoder)] = &[
    ("AnnotationRemover", KeyRemover::decode_annotations),
    ("FieldRemover", FieldRemover::decode),
    ("LabelRemover", KeyRemover::decode_labels),
];

/// Names of all registered filter kinds
pub fn known_kinds() -> Vec<&'static str> {
    REGISTRY.iter().map(|(name, _)| *name).collect()
}

/// Decode one filter entry by its `kind`
pub fn decode_filter(config: JsonValue) -> Result<Box<dyn Filter>> {
    let kind = config
        .get("kind")
        .and_then(JsonValue::as_str)
        .unwrap_or_default()
        .to_string();

    match REGISTRY.iter().find(|(name, _)| *name == kind) {
        Some((_, decode)) => decode(config),
        None => Err(unknown_kind(&kind)),
    }
}

fn unknown_kind(kind: &str) -> CoreError {
    let known = known_kinds();
    let mut message = format!(
        "unsupported filter kind '{}': may be one of: [{}]",
        kind,
        known.join(", ")
    );

    let closest = known
        .iter()
        .map(|name| (strsim::levenshtein(kind, name), *name))
        .filter(|(distance, _)| *distance <= MAX_SUGGESTION_DISTANCE)
        .min_by_key(|(distance, _)| *distance);
    if let Some((_, name)) = closest {
        message.push_str(&format!(" (did you mean `{}`?)", name));
    }

    CoreError::UnknownFilter { message }
}

/// Ordered list of configured filters
#[derive(Debug, Default)]
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// Parse a `FilterConfig` document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: JsonValue = serde_yaml::from_str(yaml)?;
        let config_err = |message: String| CoreError::FilterConfig {
            kind: CONFIG_KIND.to_string(),
            message,
        };

        let JsonValue::Object(mut config) = config else {
            return Err(config_err("expected a map".to_string()));
        };

        match config.get("kind").and_then(JsonValue::as_str) {
            None | Some(CONFIG_KIND) => {}
            Some(other) => {
                return Err(config_err(format!("unexpected kind '{}'", other)));
            }
        }

        let filters = match config.remove("filters") {
            None | Some(JsonValue::Null) => Vec::new(),
            Some(JsonValue::Array(entries)) => entries
                .into_iter()
                .map(decode_filter)
                .collect::<Result<Vec<_>>>()?,
            Some(_) => return Err(config_err("'filters' must be a list".to_string())),
        };

        Ok(Self { filters })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Run every filter in order over the store's documents
    ///
    /// The input store is left untouched; any error aborts the whole run.
    pub fn apply(&self, store: &ResourceStore) -> Result<ResourceStore> {
        let mut docs: Vec<Document> = store.iter().cloned().collect();

        for filter in &self.filters {
            let before: Vec<ResId> = docs.iter().map(|d| d.id().clone()).collect();
            docs = filter.apply(docs)?;

            if docs.len() != before.len() {
                let id = before
                    .iter()
                    .find(|id| !docs.iter().any(|d| d.id() == *id))
                    .cloned()
                    .or_else(|| docs.last().map(|d| d.id().clone()));
                if let Some(id) = id {
                    return Err(CoreError::IdentityChanged {
                        filter: filter.kind().to_string(),
                        id,
                    });
                }
            }
            if let Some((id, _)) = before.iter().zip(&docs).find(|(id, doc)| doc.id() != *id) {
                return Err(CoreError::IdentityChanged {
                    filter: filter.kind().to_string(),
                    id: id.clone(),
                });
            }
            tracing::debug!(filter = filter.kind(), documents = docs.len(), "applied filter");
        }

        ResourceStore::from_documents(docs)
    }
}

/// Parse a list of paths given as key lists, with defaults when absent
pub(crate) fn paths_or_default(paths: Vec<Vec<String>>, defaults: &[&[&str]]) -> Vec<Vec<String>> {
    if paths.is_empty() {
        defaults
            .iter()
            .map(|path| path.iter().map(|s| s.to_string()).collect())
            .collect()
    } else {
        paths
    }
}

/// Walk map keys down `path`
///
/// Returns `Ok(None)` if a key is missing or the final value is null, and
/// `Err(())` if a value on the way (or at the end) is not a map.
pub(crate) fn map_at_mut<'a>(
    body: &'a mut JsonValue,
    path: &[String],
) -> std::result::Result<Option<&'a mut Map<String, JsonValue>>, ()> {
    let mut current = body;
    for key in path {
        let JsonValue::Object(map) = current else {
            return Err(());
        };
        match map.get_mut(key) {
            Some(next) => current = next,
            None => return Ok(None),
        }
    }

    match current {
        JsonValue::Object(map) => Ok(Some(map)),
        JsonValue::Null => Ok(None),
        _ => Err(()),
    }
}

/// Rebuild a document from a filtered body, checking its identity
pub(crate) fn rebuild(filter: &str, id: ResId, body: JsonValue) -> Result<Document> {
    match Document::from_value(body) {
        Ok(doc) if *doc.id() == id => Ok(doc),
        _ => Err(CoreError::IdentityChanged {
            filter: filter.to_string(),
            id,
        }),
    }
}
