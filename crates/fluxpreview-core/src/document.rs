//! Documents and their identities
//!
//! A [`Document`] is one rendered Kubernetes object. Its [`ResId`] (kind
//! identifier, namespace, name) is the only key used for store lookups and
//! diff alignment.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::{CoreError, Result};

/// Placeholder namespace segment for cluster-scoped identities
const CLUSTER_SCOPE: &str = "_";

/// Namespace a namespaced object lands in when it names none
pub const DEFAULT_NAMESPACE: &str = "default";

/// Kinds that never live in a namespace
const CLUSTER_SCOPED_KINDS: &[&str] = &[
    "APIService",
    "CSIDriver",
    "ClusterRole",
    "ClusterRoleBinding",
    "CustomResourceDefinition",
    "IngressClass",
    "MutatingWebhookConfiguration",
    "Namespace",
    "Node",
    "PersistentVolume",
    "PriorityClass",
    "RuntimeClass",
    "StorageClass",
    "ValidatingWebhookConfiguration",
];

/// Whether objects of `kind` are cluster-scoped
pub fn is_cluster_scoped(kind: &str) -> bool {
    CLUSTER_SCOPED_KINDS.contains(&kind)
}

/// Group, version and kind of a document
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` string (`apps/v1`, `v1`) into group and version
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// The `apiVersion` string for this kind
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Same group and kind, any version
    pub fn is_group_kind(&self, group: &str, kind: &str) -> bool {
        self.group == group && self.kind == kind
    }
}

impl fmt::Display for Gvk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}/{}", self.kind, self.version)
        } else {
            write!(f, "{}.{}/{}", self.kind, self.group, self.version)
        }
    }
}

/// Identity of a document: kind identifier, namespace and name
///
/// Identities compare by effective namespace: a namespaced object without a
/// namespace equals the same object in `default`. The written namespace is
/// kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResId {
    pub gvk: Gvk,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResId {
    /// Identity of a cluster-scoped object
    pub fn new(gvk: Gvk, name: impl Into<String>) -> Self {
        Self {
            gvk,
            namespace: None,
            name: name.into(),
        }
    }

    /// Identity of a namespaced object
    pub fn with_namespace(gvk: Gvk, name: impl Into<String>, namespace: impl Into<String>) -> Self {
        let namespace = namespace.into();
        Self {
            gvk,
            namespace: (!namespace.is_empty()).then_some(namespace),
            name: name.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Namespace used for comparisons; `None` for cluster-scoped objects
    pub fn effective_namespace(&self) -> Option<&str> {
        match self.namespace.as_deref() {
            Some(namespace) => Some(namespace),
            None if is_cluster_scoped(&self.gvk.kind) => None,
            None => Some(DEFAULT_NAMESPACE),
        }
    }

    fn key(&self) -> (&Gvk, Option<&str>, &str) {
        (&self.gvk, self.effective_namespace(), &self.name)
    }
}

impl PartialEq for ResId {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for ResId {}

impl Hash for ResId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for ResId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for ResId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.gvk,
            self.namespace.as_deref().unwrap_or(CLUSTER_SCOPE),
            self.name
        )
    }
}

/// A single rendered output document
///
/// The body is held as a JSON tree whose maps are key-sorted, so
/// serialization is deterministic regardless of the source key order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: ResId,
    body: JsonValue,
}

impl Document {
    /// Build a document from a structured body
    pub fn from_value(body: JsonValue) -> Result<Self> {
        Self::from_value_at(0, body)
    }

    fn from_value_at(index: usize, body: JsonValue) -> Result<Self> {
        let id = identity_of(&body).map_err(|message| CoreError::InvalidDocument { index, message })?;
        Ok(Self { id, body })
    }

    /// Parse a multi-document YAML stream
    ///
    /// Empty documents are skipped and `kind: List` documents are expanded
    /// into their items.
    pub fn parse_all(yaml: &str) -> Result<Vec<Self>> {
        let mut docs = Vec::new();

        for (index, de) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
            let value = JsonValue::deserialize(de).map_err(|e| CoreError::InvalidDocument {
                index,
                message: e.to_string(),
            })?;

            match value {
                JsonValue::Null => continue,
                JsonValue::Object(ref map)
                    if map.get("kind").and_then(JsonValue::as_str) == Some("List") =>
                {
                    let items = map
                        .get("items")
                        .and_then(JsonValue::as_array)
                        .cloned()
                        .unwrap_or_default();
                    for item in items {
                        docs.push(Self::from_value_at(index, item)?);
                    }
                }
                value => docs.push(Self::from_value_at(index, value)?),
            }
        }

        Ok(docs)
    }

    pub fn id(&self) -> &ResId {
        &self.id
    }

    pub fn gvk(&self) -> &Gvk {
        &self.id.gvk
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.id.namespace()
    }

    pub fn body(&self) -> &JsonValue {
        &self.body
    }

    pub fn into_body(self) -> JsonValue {
        self.body
    }

    /// Look up a value by a path of map keys
    pub fn get_path(&self, path: &[&str]) -> Option<&JsonValue> {
        path.iter().try_fold(&self.body, |value, key| value.get(key))
    }

    /// Look up a string field by a path of map keys
    pub fn get_str(&self, path: &[&str]) -> Option<&str> {
        self.get_path(path).and_then(JsonValue::as_str)
    }

    /// Get a `metadata.annotations` entry
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.get_str(&["metadata", "annotations", key])
    }

    /// Replace the namespace, keeping body and identity in sync
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        if let Some(metadata) = self.body.get_mut("metadata").and_then(JsonValue::as_object_mut) {
            metadata.insert("namespace".to_string(), JsonValue::String(namespace.to_string()));
        }
        self.id.namespace = (!namespace.is_empty()).then(|| namespace.to_string());
        self
    }

    /// Serialize the body as YAML
    pub fn to_yaml(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(&self.body)?;
        Ok(yaml)
    }
}

/// Derive the identity of a document body
fn identity_of(body: &JsonValue) -> std::result::Result<ResId, String> {
    if !body.is_object() {
        return Err("document is not a map".to_string());
    }

    let kind = body
        .get("kind")
        .and_then(JsonValue::as_str)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| "missing kind".to_string())?;

    let api_version = body.get("apiVersion").and_then(JsonValue::as_str).unwrap_or_default();

    let metadata = body.get("metadata");
    let name = metadata
        .and_then(|m| m.get("name"))
        .and_then(JsonValue::as_str)
        .filter(|n| !n.is_empty())
        .ok_or_else(|| format!("{} is missing metadata.name", kind))?;

    let namespace = metadata
        .and_then(|m| m.get("namespace"))
        .and_then(JsonValue::as_str)
        .unwrap_or_default();

    Ok(ResId::with_namespace(
        Gvk::from_api_version(api_version, kind),
        name,
        namespace,
    ))
}
