//! Flux `HelmRelease` declarations and release info for templates

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::document::Document;
use crate::error::{CoreError, Result};
use crate::values::Values;

pub const HELM_RELEASE_GROUP: &str = "helm.toolkit.fluxcd.io";
pub const HELM_RELEASE_KIND: &str = "HelmRelease";

/// Default namespace when neither the object nor the release names one
const DEFAULT_NAMESPACE: &str = "default";

/// A templated-release declaration decoded from a store document
#[derive(Debug, Clone, PartialEq)]
pub struct HelmRelease {
    pub name: String,
    pub namespace: Option<String>,
    pub spec: HelmReleaseSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmReleaseSpec {
    pub chart: HelmChartTemplate,

    #[serde(default, with = "humantime_serde")]
    pub interval: Option<Duration>,

    #[serde(default)]
    pub release_name: Option<String>,

    #[serde(default)]
    pub target_namespace: Option<String>,

    #[serde(default)]
    pub storage_namespace: Option<String>,

    #[serde(default)]
    pub install: InstallPolicy,

    #[serde(default)]
    pub values_from: Vec<ValuesReference>,

    #[serde(default)]
    pub values: Option<JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HelmChartTemplate {
    pub spec: HelmChartTemplateSpec,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmChartTemplateSpec {
    pub chart: String,

    #[serde(default)]
    pub version: Option<String>,

    pub source_ref: SourceReference,
}

/// Reference to the chart source object
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReference {
    #[serde(default)]
    pub api_version: Option<String>,
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// Install flags passed to the dry-run install
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallPolicy {
    #[serde(default, rename = "skipCRDs")]
    pub skip_crds: bool,

    #[serde(default)]
    pub replace: bool,

    #[serde(default)]
    pub disable_hooks: bool,

    #[serde(default)]
    pub create_namespace: bool,

    #[serde(default)]
    pub crds: Option<CrdsPolicy>,
}

/// CRD lifecycle policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum CrdsPolicy {
    Skip,
    Create,
    CreateReplace,
}

/// One entry of `valuesFrom`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValuesReference {
    pub kind: String,
    pub name: String,

    #[serde(default)]
    pub values_key: Option<String>,

    #[serde(default)]
    pub target_path: Option<String>,

    #[serde(default)]
    pub optional: bool,
}

impl ValuesReference {
    pub const DEFAULT_VALUES_KEY: &'static str = "values.yaml";

    pub fn values_key(&self) -> &str {
        self.values_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .unwrap_or(Self::DEFAULT_VALUES_KEY)
    }

    pub fn target_path(&self) -> Option<&str> {
        self.target_path.as_deref().filter(|p| !p.is_empty())
    }
}

#[derive(Deserialize)]
struct ObjectMeta {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Deserialize)]
struct HelmReleaseObject {
    metadata: ObjectMeta,
    spec: HelmReleaseSpec,
}

impl HelmRelease {
    /// Whether a document declares a HelmRelease (any version)
    pub fn matches(doc: &Document) -> bool {
        doc.gvk().is_group_kind(HELM_RELEASE_GROUP, HELM_RELEASE_KIND)
    }

    /// Name of the Helm release: `releaseName`, else `[targetNamespace-]name`
    pub fn release_name(&self) -> String {
        if let Some(name) = self.spec.release_name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        match self.target_namespace() {
            Some(target) => format!("{}-{}", target, self.name),
            None => self.name.clone(),
        }
    }

    /// Namespace the release is installed into
    pub fn release_namespace(&self) -> &str {
        self.target_namespace()
            .or(self.namespace.as_deref())
            .unwrap_or(DEFAULT_NAMESPACE)
    }

    /// Namespace holding the chart source object
    pub fn chart_source_namespace(&self) -> Option<&str> {
        self.spec
            .chart
            .spec
            .source_ref
            .namespace
            .as_deref()
            .filter(|n| !n.is_empty())
            .or(self.namespace.as_deref())
    }

    /// Chart version constraint, `*` when unset
    pub fn chart_version(&self) -> &str {
        self.spec
            .chart
            .spec
            .version
            .as_deref()
            .filter(|v| !v.is_empty())
            .unwrap_or("*")
    }

    pub fn skip_crds(&self) -> bool {
        let install = &self.spec.install;
        install.skip_crds || install.crds == Some(CrdsPolicy::Skip)
    }

    /// Inline values, empty when unset
    pub fn values(&self) -> Values {
        self.spec.values.clone().map(Values::from).unwrap_or_default()
    }

    fn target_namespace(&self) -> Option<&str> {
        self.spec.target_namespace.as_deref().filter(|n| !n.is_empty())
    }
}

impl TryFrom<&Document> for HelmRelease {
    type Error = CoreError;

    fn try_from(doc: &Document) -> Result<Self> {
        if !Self::matches(doc) {
            return Err(CoreError::Decode {
                id: doc.id().clone(),
                target: HELM_RELEASE_KIND,
                message: format!("unexpected kind {}", doc.gvk()),
            });
        }

        let object: HelmReleaseObject =
            serde_json::from_value(doc.body().clone()).map_err(|e| CoreError::Decode {
                id: doc.id().clone(),
                target: HELM_RELEASE_KIND,
                message: e.to_string(),
            })?;

        Ok(Self {
            name: object.metadata.name,
            namespace: object.metadata.namespace.filter(|n| !n.is_empty()),
            spec: object.spec,
        })
    }
}

/// Release information for templates
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseInfo {
    /// Release name
    pub name: String,

    /// Target namespace
    pub namespace: String,

    /// Revision number
    pub revision: u32,

    /// Is this an install operation?
    pub is_install: bool,

    /// Is this an upgrade operation?
    pub is_upgrade: bool,

    /// Service (always "Helm")
    pub service: String,
}

impl ReleaseInfo {
    /// Release info for a first install
    pub fn for_install(name: &str, namespace: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            revision: 1,
            is_install: true,
            is_upgrade: false,
            service: "Helm".to_string(),
        }
    }
}
