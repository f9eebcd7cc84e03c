//! Render tasks: one per HelmRelease found in a store

use fluxpreview_core::{
    DEFAULT_NAMESPACE, DataObject, HelmRelease, HelmRepository, ResourceStore, Values,
};
use fluxpreview_engine::InstallOptions;
use fluxpreview_repo::{RepositoryEntry, TlsMaterial};

use crate::compose::compose_values;
use crate::error::{RenderError, Result};

/// Only chart source kind that can be rendered
const HELM_REPOSITORY: &str = "HelmRepository";

/// Secret keys accepted for each piece of TLS material
const CA_KEYS: &[&str] = &["ca.crt", "caFile"];
const CERT_KEYS: &[&str] = &["tls.crt", "certFile"];
const KEY_KEYS: &[&str] = &["tls.key", "keyFile"];

/// Everything needed to render one release
#[derive(Debug, Clone)]
pub struct RenderTask {
    /// `<namespace>/<name>` of the HelmRelease, for logs and errors
    pub release: String,
    pub chart: String,
    pub version: String,
    pub repository: RepositoryEntry,
    pub values: Values,
    pub options: InstallOptions,
}

impl RenderTask {
    /// Build the task for one release
    pub fn from_release(release: &HelmRelease, store: &ResourceStore) -> Result<Self> {
        let label = format!(
            "{}/{}",
            release.namespace.as_deref().unwrap_or_default(),
            release.name
        );
        let values = compose_values(release, store)?;
        let repository = resolve_repository(release, &label, store)?;
        let chart = &release.spec.chart.spec;
        let install = &release.spec.install;

        Ok(Self {
            chart: chart.chart.clone(),
            version: release.chart_version().to_string(),
            repository,
            values,
            options: InstallOptions {
                release_name: release.release_name(),
                namespace: release.release_namespace().to_string(),
                create_namespace: install.create_namespace,
                skip_crds: release.skip_crds(),
                replace: install.replace,
                disable_hooks: install.disable_hooks,
                include_crds: true,
            },
            release: label,
        })
    }
}

/// Tasks for every HelmRelease in `store`, in store order
pub fn build_tasks(store: &ResourceStore) -> Result<Vec<RenderTask>> {
    store
        .iter()
        .filter(|doc| HelmRelease::matches(doc))
        .map(|doc| -> Result<RenderTask> {
            let release = HelmRelease::try_from(doc)?;
            RenderTask::from_release(&release, store)
        })
        .collect()
}

fn resolve_repository(
    release: &HelmRelease,
    label: &str,
    store: &ResourceStore,
) -> Result<RepositoryEntry> {
    let source = &release.spec.chart.spec.source_ref;
    if source.kind != HELM_REPOSITORY {
        return Err(RenderError::UnsupportedSourceKind {
            release: label.to_string(),
            kind: source.kind.clone(),
        });
    }

    let namespace = release.chart_source_namespace();
    let effective = namespace.unwrap_or(DEFAULT_NAMESPACE);
    let doc = store
        .iter()
        .filter(|doc| HelmRepository::matches(doc))
        .find(|doc| doc.name() == source.name && doc.id().effective_namespace() == Some(effective))
        .ok_or_else(|| RenderError::SourceNotFound {
            release: label.to_string(),
            name: source.name.clone(),
            namespace: namespace.unwrap_or_default().to_string(),
        })?;
    let repository = HelmRepository::try_from(doc)?;

    if repository.is_oci() {
        return Err(RenderError::UnsupportedRepository {
            name: repository.entry_name(),
        });
    }

    let mut entry = RepositoryEntry::new(repository.entry_name(), repository.spec.url.clone());
    entry.pass_credentials_all = repository.spec.pass_credentials;

    if let Some(secret_id) = repository.secret_id() {
        match store.find(&secret_id) {
            Some(doc) => apply_secret(&mut entry, &DataObject::try_from(doc)?)?,
            None => tracing::warn!(
                repo = %entry.name,
                secret = %secret_id,
                "Repository secret not found, continuing without credentials"
            ),
        }
    }
    Ok(entry)
}

fn apply_secret(entry: &mut RepositoryEntry, secret: &DataObject) -> Result<()> {
    let text = |key: &str| -> Result<Option<String>> {
        Ok(secret.get(key)?.map(str::to_string))
    };
    let first = |keys: &[&str]| -> Result<Option<String>> {
        for key in keys {
            if let Some(value) = text(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    };

    entry.username = text("username")?;
    entry.password = text("password")?;
    entry.tls = TlsMaterial {
        ca: first(CA_KEYS)?,
        cert: first(CERT_KEYS)?,
        key: first(KEY_KEYS)?,
    };
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fluxpreview_core::Document;
    use serde_json::json;

    const REPOS: &str = r#"
apiVersion: source.toolkit.fluxcd.io/v1
kind: HelmRepository
metadata:
  name: podinfo
  namespace: flux-system
spec:
  url: https://stefanprodan.github.io/podinfo
  passCredentials: true
  secretRef:
    name: podinfo-auth
---
apiVersion: v1
kind: Secret
metadata:
  name: podinfo-auth
  namespace: flux-system
data:
  keystore: //4=
stringData:
  username: user
  password: pass
  ca.crt: CA
---
apiVersion: source.toolkit.fluxcd.io/v1beta2
kind: HelmRepository
metadata:
  name: registry
  namespace: flux-system
spec:
  type: oci
  url: oci://ghcr.io/charts
"#;

    fn store_with(release: serde_json::Value) -> ResourceStore {
        let mut store = ResourceStore::from_documents(Document::parse_all(REPOS).unwrap()).unwrap();
        store
            .insert_all([Document::from_value(release).unwrap()])
            .unwrap();
        store
    }

    fn release(source: serde_json::Value, spec: serde_json::Value) -> serde_json::Value {
        let mut body = json!({
            "apiVersion": "helm.toolkit.fluxcd.io/v2beta1",
            "kind": "HelmRelease",
            "metadata": {"name": "web", "namespace": "apps"},
            "spec": {
                "chart": {"spec": {"chart": "podinfo", "version": "6.x", "sourceRef": source}},
                "values": {"replicaCount": 2}
            }
        });
        if let (Some(target), Some(extra)) = (body["spec"].as_object_mut(), spec.as_object()) {
            target.extend(extra.clone());
        }
        body
    }

    #[test]
    fn test_task_from_release() {
        let store = store_with(release(
            json!({"kind": "HelmRepository", "name": "podinfo", "namespace": "flux-system"}),
            json!({"targetNamespace": "prod", "install": {"disableHooks": true, "crds": "Skip"}}),
        ));
        let tasks = build_tasks(&store).unwrap();
        assert_eq!(tasks.len(), 1);

        let task = &tasks[0];
        assert_eq!(task.release, "apps/web");
        assert_eq!(task.chart, "podinfo");
        assert_eq!(task.version, "6.x");
        assert_eq!(task.values.inner(), &json!({"replicaCount": 2}));
        assert_eq!(task.options.release_name, "prod-web");
        assert_eq!(task.options.namespace, "prod");
        assert!(task.options.disable_hooks);
        assert!(task.options.skip_crds);
        assert!(task.options.include_crds);

        let repo = &task.repository;
        assert_eq!(repo.name, "flux-system-podinfo");
        assert_eq!(repo.url, "https://stefanprodan.github.io/podinfo");
        assert_eq!(repo.username.as_deref(), Some("user"));
        assert_eq!(repo.password.as_deref(), Some("pass"));
        assert_eq!(repo.tls.ca.as_deref(), Some("CA"));
        assert!(repo.pass_credentials_all);
    }

    #[test]
    fn test_source_not_found() {
        // sourceRef namespace defaults to the release namespace
        let store = store_with(release(
            json!({"kind": "HelmRepository", "name": "podinfo"}),
            json!({}),
        ));
        let err = build_tasks(&store).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unable to find source 'apps/podinfo' for release apps/web"
        );
    }

    #[test]
    fn test_unsupported_source_kind() {
        let store = store_with(release(
            json!({"kind": "GitRepository", "name": "podinfo"}),
            json!({}),
        ));
        assert!(matches!(
            build_tasks(&store),
            Err(RenderError::UnsupportedSourceKind { kind, .. }) if kind == "GitRepository"
        ));
    }

    #[test]
    fn test_oci_repository_rejected() {
        let store = store_with(release(
            json!({"kind": "HelmRepository", "name": "registry", "namespace": "flux-system"}),
            json!({}),
        ));
        assert!(matches!(
            build_tasks(&store),
            Err(RenderError::UnsupportedRepository { .. })
        ));
    }

    #[test]
    fn test_no_releases() {
        let store = ResourceStore::from_documents(Document::parse_all(REPOS).unwrap()).unwrap();
        assert!(build_tasks(&store).unwrap().is_empty());
    }
}
