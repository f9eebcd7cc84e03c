//! Value composition for HelmReleases
//!
//! `valuesFrom` sources are applied in declaration order, then the inline
//! `values` are merged on top. ConfigMaps and Secrets are looked up in the
//! release's own namespace.

use fluxpreview_core::{
    Assign, DataKind, DataObject, HelmRelease, ResId, ResourceStore, ValuesReference, Values,
};

use crate::error::{RenderError, Result};

/// Compose the effective values of a release from the documents in `store`
pub fn compose_values(release: &HelmRelease, store: &ResourceStore) -> Result<Values> {
    let mut result = Values::new();

    for reference in &release.spec.values_from {
        let Some(raw) = lookup(release, reference, store)? else {
            continue;
        };
        let invalid = |source| RenderError::InvalidValues {
            release: release.name.clone(),
            origin: format!("{} {}", reference.kind, reference.name),
            source,
        };

        match reference.target_path() {
            None => {
                let values = Values::from_yaml(&raw).map_err(invalid)?;
                result.merge(&values);
            }
            Some(path) => {
                let (raw, assign) = match unquote(&raw) {
                    Some(inner) => (inner, Assign::Literal),
                    None => (raw.as_str(), Assign::Typed),
                };
                result.set_path(path, raw, assign).map_err(invalid)?;
            }
        }
    }

    result.merge(&release.values());
    Ok(result)
}

/// Raw value behind a reference; `None` when the object does not exist
fn lookup(
    release: &HelmRelease,
    reference: &ValuesReference,
    store: &ResourceStore,
) -> Result<Option<String>> {
    let kind = DataKind::parse(&reference.kind).ok_or_else(|| RenderError::UnsupportedValuesKind {
        release: release.name.clone(),
        kind: reference.kind.clone(),
    })?;

    let id = ResId::with_namespace(
        kind.gvk(),
        reference.name.clone(),
        release.namespace.clone().unwrap_or_default(),
    );
    let Some(doc) = store.find(&id) else {
        tracing::warn!(
            release = %release.name,
            kind = %kind,
            name = %reference.name,
            optional = reference.optional,
            "Values source not found, skipping"
        );
        return Ok(None);
    };

    let object = DataObject::try_from(doc)?;
    let key = reference.values_key();
    object
        .get(key)?
        .map(|raw| Some(raw.to_string()))
        .ok_or_else(|| RenderError::MissingKey {
            key: key.to_string(),
            kind: kind.to_string(),
            name: reference.name.clone(),
        })
}

/// Strip quotes from a value wrapped in matching `'` or `"`
///
/// Every leading and trailing quote character is removed, so `"'x'"`
/// becomes `x`.
fn unquote(raw: &str) -> Option<&str> {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    quoted.then(|| raw.trim_matches(|c| c == '"' || c == '\''))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxpreview_core::Document;
    use serde_json::json;

    const STORE: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: base
  namespace: apps
data:
  values.yaml: |
    a: 1
    b: 1
---
apiVersion: v1
kind: Secret
metadata:
  name: override
  namespace: apps
data:
  custom.yaml: YjogMgpjOiAyCg==
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: tags
  namespace: apps
data:
  quoted: '"123"'
  plain: "123"
  flag: "true"
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: elsewhere
  namespace: other
data:
  values.yaml: "a: 99"
---
apiVersion: v1
kind: Secret
metadata:
  name: mixed
  namespace: apps
data:
  values.yaml: YTogMQ==
  keystore: //4=
"#;

    fn store() -> ResourceStore {
        ResourceStore::from_documents(Document::parse_all(STORE).unwrap()).unwrap()
    }

    fn release(values_from: serde_json::Value, values: serde_json::Value) -> HelmRelease {
        let doc = Document::from_value(json!({
            "apiVersion": "helm.toolkit.fluxcd.io/v2",
            "kind": "HelmRelease",
            "metadata": {"name": "web", "namespace": "apps"},
            "spec": {
                "chart": {"spec": {
                    "chart": "podinfo",
                    "sourceRef": {"kind": "HelmRepository", "name": "podinfo"}
                }},
                "valuesFrom": values_from,
                "values": values,
            }
        }))
        .unwrap();
        HelmRelease::try_from(&doc).unwrap()
    }

    #[test]
    fn test_sources_then_inline_values() {
        let release = release(
            json!([
                {"kind": "ConfigMap", "name": "base"},
                {"kind": "Secret", "name": "override", "valuesKey": "custom.yaml"}
            ]),
            json!({"c": 3}),
        );
        let values = compose_values(&release, &store()).unwrap();
        assert_eq!(values.inner(), &json!({"a": 1, "b": 2, "c": 3}));
    }

    #[test]
    fn test_quoted_target_path_stays_string() {
        let release = release(
            json!([
                {"kind": "ConfigMap", "name": "tags", "valuesKey": "quoted", "targetPath": "image.tag"},
                {"kind": "ConfigMap", "name": "tags", "valuesKey": "plain", "targetPath": "replicas"},
                {"kind": "ConfigMap", "name": "tags", "valuesKey": "flag", "targetPath": "list[1]"}
            ]),
            json!(null),
        );
        let values = compose_values(&release, &store()).unwrap();
        assert_eq!(
            values.inner(),
            &json!({"image": {"tag": "123"}, "replicas": 123, "list": [null, true]})
        );
    }

    #[test]
    fn test_missing_source_is_skipped() {
        let release = release(
            json!([
                {"kind": "ConfigMap", "name": "absent"},
                {"kind": "ConfigMap", "name": "elsewhere"},
                {"kind": "ConfigMap", "name": "base"}
            ]),
            json!(null),
        );
        let values = compose_values(&release, &store()).unwrap();
        assert_eq!(values.inner(), &json!({"a": 1, "b": 1}));
    }

    #[test]
    fn test_binary_secret_key_does_not_block_other_keys() {
        let release = release(json!([{"kind": "Secret", "name": "mixed"}]), json!(null));
        let values = compose_values(&release, &store()).unwrap();
        assert_eq!(values.inner(), &json!({"a": 1}));

        let release = release_with_key("keystore");
        let err = compose_values(&release, &store()).unwrap_err();
        assert!(err.to_string().contains("not valid UTF-8"), "{err}");
    }

    fn release_with_key(key: &str) -> HelmRelease {
        release(json!([{"kind": "Secret", "name": "mixed", "valuesKey": key}]), json!(null))
    }

    #[test]
    fn test_missing_key_fails() {
        let release = release(
            json!([{"kind": "ConfigMap", "name": "base", "valuesKey": "nope.yaml"}]),
            json!(null),
        );
        let err = compose_values(&release, &store()).unwrap_err();
        assert_eq!(err.to_string(), "missing key 'nope.yaml' in ConfigMap 'base'");
    }

    #[test]
    fn test_unsupported_kind() {
        let release = release(json!([{"kind": "Bucket", "name": "base"}]), json!(null));
        let err = compose_values(&release, &store()).unwrap_err();
        assert!(matches!(err, RenderError::UnsupportedValuesKind { kind, .. } if kind == "Bucket"));
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"abc\""), Some("abc"));
        assert_eq!(unquote("'abc'"), Some("abc"));
        assert_eq!(unquote("\"'abc'\""), Some("abc"));
        assert_eq!(unquote("\"abc'"), None);
        assert_eq!(unquote("\""), None);
        assert_eq!(unquote("abc"), None);
    }
}
