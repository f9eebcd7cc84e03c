//! Whole-field removal

use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::{Filter, map_at_mut, rebuild};
use crate::document::Document;
use crate::error::{CoreError, Result};

const KIND: &str = "FieldRemover";

/// Removes the fields at the given paths (`[spec, replicas]`)
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRemover {
    fields: Vec<Vec<String>>,
}

#[derive(Deserialize)]
struct FieldConfig {
    fields: Vec<Vec<String>>,
}

impl FieldRemover {
    pub fn new(fields: Vec<Vec<String>>) -> Result<Self> {
        if fields.iter().any(Vec::is_empty) {
            return Err(CoreError::FilterConfig {
                kind: KIND.to_string(),
                message: "field paths must not be empty".to_string(),
            });
        }
        Ok(Self { fields })
    }

    pub(super) fn decode(config: JsonValue) -> Result<Box<dyn Filter>> {
        let config: FieldConfig = serde_json::from_value(config).map_err(|e| CoreError::FilterConfig {
            kind: KIND.to_string(),
            message: e.to_string(),
        })?;
        Ok(Box::new(Self::new(config.fields)?))
    }
}

impl Filter for FieldRemover {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn apply(&self, docs: Vec<Document>) -> Result<Vec<Document>> {
        docs.into_iter()
            .map(|doc| {
                let id = doc.id().clone();
                let mut body = doc.into_body();

                for field in &self.fields {
                    let Some((last, parent)) = field.split_last() else {
                        continue;
                    };
                    let map = map_at_mut(&mut body, parent).map_err(|_| CoreError::MalformedPath {
                        filter: KIND.to_string(),
                        id: id.clone(),
                        path: parent.join("."),
                    })?;
                    if let Some(map) = map {
                        map.remove(last);
                    }
                }

                rebuild(KIND, id, body)
            })
            .collect()
    }
}
