//! Dry-run chart installs
//!
//! A chart is rendered the way a client-side `helm install --dry-run` would
//! produce it: every non-helper template under `templates/` is rendered
//! against the merged values, split into YAML documents, sorted into install
//! order and written out with `# Source:` markers. Documents annotated as
//! hooks are returned separately.

use minijinja::{Environment, UndefinedBehavior};
use serde::Serialize;
use serde_yaml::Value as YamlValue;

use fluxpreview_core::{Chart, ReleaseInfo, Values};

use crate::error::{EngineError, Result, TemplateError};
use crate::{filters, functions};

/// Annotation marking a document as a lifecycle hook
pub const HOOK_ANNOTATION: &str = "helm.sh/hook";

/// Kubernetes version advertised to templates through `capabilities`
pub const KUBE_VERSION: (u32, u32) = (1, 31);

pub const FILTER_NAMES: &[&str] = &[
    "b64decode",
    "b64encode",
    "indent",
    "nindent",
    "quote",
    "required",
    "sha256",
    "squote",
    "tojson",
    "toyaml",
    "trimprefix",
    "trimsuffix",
    "trunc",
];

pub const FUNCTION_NAMES: &[&str] = &["coalesce", "dict", "fail", "list", "printf", "ternary"];

/// Kinds in the order they are installed; anything else goes last
const INSTALL_ORDER: &[&str] = &[
    "PriorityClass",
    "Namespace",
    "NetworkPolicy",
    "ResourceQuota",
    "LimitRange",
    "PodSecurityPolicy",
    "PodDisruptionBudget",
    "ServiceAccount",
    "Secret",
    "SecretList",
    "ConfigMap",
    "StorageClass",
    "PersistentVolume",
    "PersistentVolumeClaim",
    "CustomResourceDefinition",
    "ClusterRole",
    "ClusterRoleList",
    "ClusterRoleBinding",
    "ClusterRoleBindingList",
    "Role",
    "RoleList",
    "RoleBinding",
    "RoleBindingList",
    "Service",
    "DaemonSet",
    "Pod",
    "ReplicationController",
    "ReplicaSet",
    "Deployment",
    "HorizontalPodAutoscaler",
    "StatefulSet",
    "Job",
    "CronJob",
    "IngressClass",
    "Ingress",
    "APIService",
];

/// Install settings that shape the rendered output
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstallOptions {
    pub release_name: String,
    pub namespace: String,
    pub create_namespace: bool,
    pub skip_crds: bool,
    pub replace: bool,
    pub disable_hooks: bool,
    /// Prepend the chart's `crds/` files to the manifest
    pub include_crds: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HookManifest {
    /// `<chart>/templates/<file>`
    pub path: String,
    pub manifest: String,
}

/// Output of a dry-run install
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedRelease {
    pub manifest: String,
    pub hooks: Vec<HookManifest>,
}

/// Renders a chart into a release manifest without touching a cluster
pub trait TemplateEngine: Send + Sync {
    fn dry_run_install(
        &self,
        chart: &Chart,
        values: &Values,
        options: &InstallOptions,
    ) -> Result<RenderedRelease>;
}

/// Builder for [`ChartEngine`]
#[derive(Debug, Default)]
pub struct ChartEngineBuilder {
    strict: bool,
}

impl ChartEngineBuilder {
    /// Fail on undefined values instead of rendering them empty
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn build(self) -> ChartEngine {
        ChartEngine {
            strict: self.strict,
        }
    }
}

/// MiniJinja-backed [`TemplateEngine`]
#[derive(Debug, Clone, Default)]
pub struct ChartEngine {
    strict: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChartInfo<'a> {
    name: &'a str,
    version: String,
    app_version: Option<&'a str>,
    #[serde(rename = "type")]
    chart_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Capabilities {
    kube_version: KubeVersion,
}

#[derive(Serialize)]
struct KubeVersion {
    version: String,
    major: String,
    minor: String,
}

impl Capabilities {
    fn current() -> Self {
        let (major, minor) = KUBE_VERSION;
        Self {
            kube_version: KubeVersion {
                version: format!("v{}.{}.0", major, minor),
                major: major.to_string(),
                minor: minor.to_string(),
            },
        }
    }
}

/// One rendered YAML document and where it came from
#[derive(Debug)]
struct Rendered {
    path: String,
    kind: String,
    hook: bool,
    content: String,
}

impl ChartEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> ChartEngineBuilder {
        ChartEngineBuilder::default()
    }

    fn environment(&self) -> Environment<'static> {
        let mut env = Environment::new();
        env.set_undefined_behavior(if self.strict {
            UndefinedBehavior::Strict
        } else {
            UndefinedBehavior::Chainable
        });
        env.set_keep_trailing_newline(true);

        env.add_filter("toyaml", filters::toyaml);
        env.add_filter("tojson", filters::tojson);
        env.add_filter("b64encode", filters::b64encode);
        env.add_filter("b64decode", filters::b64decode);
        env.add_filter("quote", filters::quote);
        env.add_filter("squote", filters::squote);
        env.add_filter("indent", filters::indent);
        env.add_filter("nindent", filters::nindent);
        env.add_filter("required", filters::required);
        env.add_filter("sha256", filters::sha256sum);
        env.add_filter("trunc", filters::trunc);
        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);

        env.add_function("fail", functions::fail);
        env.add_function("dict", functions::dict);
        env.add_function("list", functions::list);
        env.add_function("coalesce", functions::coalesce);
        env.add_function("ternary", functions::ternary);
        env.add_function("printf", functions::printf);

        env
    }

    /// Render every template and split the output into documents
    fn render_documents(
        &self,
        chart: &Chart,
        values: &Values,
        options: &InstallOptions,
    ) -> Result<Vec<Rendered>> {
        let template_error = |err: minijinja::Error, name: &str, source: &str| EngineError::Template {
            chart: chart.name().to_string(),
            error: Box::new(TemplateError::from_minijinja(&err, name, source)),
        };

        let mut env = self.environment();
        let mut sources = Vec::new();
        for (path, content) in chart.templates() {
            let name = path.trim_start_matches("templates/").to_string();
            env.add_template_owned(name.clone(), content.to_string())
                .map_err(|e| template_error(e, &name, content))?;
            sources.push((path, name, content));
        }

        let mut merged = chart.values.clone();
        merged.merge(values);

        let ctx = minijinja::context! {
            values => merged.inner(),
            release => ReleaseInfo::for_install(&options.release_name, &options.namespace),
            chart => ChartInfo {
                name: chart.name(),
                version: chart.version().to_string(),
                app_version: chart.metadata.app_version.as_deref(),
                chart_type: chart.metadata.chart_type.as_deref().unwrap_or("application"),
            },
            capabilities => Capabilities::current(),
        };

        let mut docs = Vec::new();
        for (path, name, content) in sources {
            let file = name.rsplit('/').next().unwrap_or(&name);
            if file.starts_with('_') || file == "NOTES.txt" {
                continue;
            }

            let output = env
                .get_template(&name)
                .and_then(|tmpl| tmpl.render(&ctx))
                .map_err(|e| template_error(e, &name, content))?;

            let source = format!("{}/{}", chart.name(), path);
            for chunk in split_documents(&output) {
                let parsed: YamlValue =
                    serde_yaml::from_str(chunk).map_err(|e| EngineError::InvalidManifest {
                        chart: chart.name().to_string(),
                        path: source.clone(),
                        message: e.to_string(),
                    })?;
                if parsed.is_null() {
                    continue;
                }
                let kind = parsed
                    .get("kind")
                    .and_then(YamlValue::as_str)
                    .unwrap_or_default()
                    .to_string();
                let hook = parsed
                    .get("metadata")
                    .and_then(|m| m.get("annotations"))
                    .and_then(|a| a.get(HOOK_ANNOTATION))
                    .is_some();

                docs.push(Rendered {
                    path: source.clone(),
                    kind,
                    hook,
                    content: chunk.to_string(),
                });
            }
        }

        // stable: template path order is kept within a kind
        docs.sort_by(|a, b| match (a.hook, b.hook) {
            (false, false) => install_cmp(&a.kind, &b.kind),
            (a_hook, b_hook) => a_hook.cmp(&b_hook),
        });

        tracing::debug!(
            chart = chart.name(),
            documents = docs.len(),
            hooks = docs.iter().filter(|d| d.hook).count(),
            "Rendered chart templates"
        );
        Ok(docs)
    }
}

impl TemplateEngine for ChartEngine {
    fn dry_run_install(
        &self,
        chart: &Chart,
        values: &Values,
        options: &InstallOptions,
    ) -> Result<RenderedRelease> {
        tracing::debug!(
            chart = chart.name(),
            version = %chart.version(),
            release = %options.release_name,
            namespace = %options.namespace,
            create_namespace = options.create_namespace,
            replace = options.replace,
            "Dry-run install"
        );

        let mut release = RenderedRelease::default();

        if options.include_crds && !options.skip_crds {
            for (path, content) in chart.crds() {
                release.manifest.push_str(&format!(
                    "---\n# Source: {}/{}\n{}\n",
                    chart.name(),
                    path,
                    content.trim()
                ));
            }
        }

        for doc in self.render_documents(chart, values, options)? {
            if doc.hook {
                release.hooks.push(HookManifest {
                    path: doc.path,
                    manifest: doc.content,
                });
            } else {
                release
                    .manifest
                    .push_str(&format!("---\n# Source: {}\n{}\n", doc.path, doc.content));
            }
        }

        Ok(release)
    }
}

/// Split rendered text on `---` separator lines, dropping blank chunks
fn split_documents(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        if line.trim_end() == "---" {
            chunks.push(&text[start..offset]);
            start = offset + line.len();
        }
        offset += line.len();
    }
    chunks.push(&text[start..]);

    chunks
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}

fn install_rank(kind: &str) -> usize {
    INSTALL_ORDER
        .iter()
        .position(|k| *k == kind)
        .unwrap_or(INSTALL_ORDER.len())
}

/// Known kinds by install order, unknown kinds after them by name
fn install_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    let (ra, rb) = (install_rank(a), install_rank(b));
    if ra == INSTALL_ORDER.len() && rb == INSTALL_ORDER.len() {
        a.cmp(b)
    } else {
        ra.cmp(&rb)
    }
}
