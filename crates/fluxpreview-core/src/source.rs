//! Chart sources and data objects referenced by releases
//!
//! [`HelmRepository`] is the Flux chart source; [`DataObject`] covers the
//! ConfigMaps and Secrets that feed `valuesFrom` and repository auth.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::document::{Document, Gvk, ResId};
use crate::error::{CoreError, Result};

pub const SOURCE_GROUP: &str = "source.toolkit.fluxcd.io";
pub const HELM_REPOSITORY_KIND: &str = "HelmRepository";

/// Versions of `HelmRepository` normalised into one typed shape
const HELM_REPOSITORY_VERSIONS: &[&str] = &["v1beta1", "v1beta2", "v1"];

/// A Flux chart repository source
#[derive(Debug, Clone, PartialEq)]
pub struct HelmRepository {
    pub name: String,
    pub namespace: Option<String>,
    pub spec: HelmRepositorySpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmRepositorySpec {
    pub url: String,

    #[serde(default)]
    pub secret_ref: Option<LocalObjectReference>,

    #[serde(default)]
    pub pass_credentials: bool,

    #[serde(default, rename = "type")]
    pub repository_type: Option<String>,

    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalObjectReference {
    pub name: String,
}

#[derive(Deserialize)]
struct Metadata {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Deserialize)]
struct HelmRepositoryObject {
    metadata: Metadata,
    spec: HelmRepositorySpec,
}

impl HelmRepository {
    pub fn matches(doc: &Document) -> bool {
        doc.gvk().is_group_kind(SOURCE_GROUP, HELM_REPOSITORY_KIND)
            && HELM_REPOSITORY_VERSIONS.contains(&doc.gvk().version.as_str())
    }

    /// Name of the repository entry: `<namespace>-<name>`
    pub fn entry_name(&self) -> String {
        format!("{}-{}", self.namespace.as_deref().unwrap_or_default(), self.name)
    }

    pub fn is_oci(&self) -> bool {
        self.spec.repository_type.as_deref() == Some("oci")
    }

    /// Identity of the auth Secret, if one is referenced
    pub fn secret_id(&self) -> Option<ResId> {
        self.spec.secret_ref.as_ref().map(|secret| {
            ResId::with_namespace(
                DataKind::Secret.gvk(),
                secret.name.clone(),
                self.namespace.clone().unwrap_or_default(),
            )
        })
    }
}

impl TryFrom<&Document> for HelmRepository {
    type Error = CoreError;

    fn try_from(doc: &Document) -> Result<Self> {
        if !Self::matches(doc) {
            return Err(CoreError::Decode {
                id: doc.id().clone(),
                target: HELM_REPOSITORY_KIND,
                message: format!("unexpected kind {}", doc.gvk()),
            });
        }

        let object: HelmRepositoryObject =
            serde_json::from_value(doc.body().clone()).map_err(|e| CoreError::Decode {
                id: doc.id().clone(),
                target: HELM_REPOSITORY_KIND,
                message: e.to_string(),
            })?;

        Ok(Self {
            name: object.metadata.name,
            namespace: object.metadata.namespace.filter(|n| !n.is_empty()),
            spec: object.spec,
        })
    }
}

/// Kind of a key/value data object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataKind {
    ConfigMap,
    Secret,
}

impl DataKind {
    /// Parse a `valuesFrom` kind
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "ConfigMap" => Some(Self::ConfigMap),
            "Secret" => Some(Self::Secret),
            _ => None,
        }
    }

    pub fn gvk(self) -> Gvk {
        Gvk::new("", "v1", self.as_str())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigMap => "ConfigMap",
            Self::Secret => "Secret",
        }
    }
}

impl std::fmt::Display for DataKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// String entries of a ConfigMap or Secret
///
/// Secret `data` is base64-decoded; `stringData` only fills keys that
/// `data` does not carry. A key that does not decode to text only fails
/// when it is read.
#[derive(Debug, Clone, PartialEq)]
pub struct DataObject {
    pub kind: DataKind,
    pub name: String,
    id: ResId,
    entries: BTreeMap<String, Entry>,
}

#[derive(Debug, Clone, PartialEq)]
enum Entry {
    Text(String),
    Undecodable(String),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataFields {
    #[serde(default)]
    data: BTreeMap<String, String>,
    #[serde(default)]
    string_data: BTreeMap<String, String>,
}

impl DataObject {
    /// Text stored under `key`; errors if that entry is not valid text
    pub fn get(&self, key: &str) -> Result<Option<&str>> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(Entry::Text(text)) => Ok(Some(text)),
            Some(Entry::Undecodable(message)) => Err(CoreError::Decode {
                id: self.id.clone(),
                target: self.kind.as_str(),
                message: message.clone(),
            }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

impl TryFrom<&Document> for DataObject {
    type Error = CoreError;

    fn try_from(doc: &Document) -> Result<Self> {
        let gvk = doc.gvk();
        let kind = match DataKind::parse(&gvk.kind) {
            Some(kind) if gvk.group.is_empty() && gvk.version == "v1" => kind,
            _ => {
                return Err(CoreError::Decode {
                    id: doc.id().clone(),
                    target: "ConfigMap or Secret",
                    message: format!("unexpected kind {}", gvk),
                });
            }
        };

        let decode_err = |message: String| CoreError::Decode {
            id: doc.id().clone(),
            target: kind.as_str(),
            message,
        };

        let fields: DataFields =
            serde_json::from_value(doc.body().clone()).map_err(|e| decode_err(e.to_string()))?;

        let entries = match kind {
            DataKind::ConfigMap => fields
                .data
                .into_iter()
                .map(|(key, text)| (key, Entry::Text(text)))
                .collect(),
            DataKind::Secret => {
                let mut entries: BTreeMap<String, Entry> = fields
                    .string_data
                    .into_iter()
                    .map(|(key, text)| (key, Entry::Text(text)))
                    .collect();
                for (key, encoded) in fields.data {
                    let entry = decode_secret_entry(&key, &encoded);
                    entries.insert(key, entry);
                }
                entries
            }
        };

        Ok(Self {
            kind,
            name: doc.name().to_string(),
            id: doc.id().clone(),
            entries,
        })
    }
}

fn decode_secret_entry(key: &str, encoded: &str) -> Entry {
    let bytes = match STANDARD.decode(encoded.trim()) {
        Ok(bytes) => bytes,
        Err(e) => return Entry::Undecodable(format!("key '{}' is not valid base64: {}", key, e)),
    };
    match String::from_utf8(bytes) {
        Ok(text) => Entry::Text(text),
        Err(_) => Entry::Undecodable(format!("key '{}' is not valid UTF-8", key)),
    }
}
