//! Overlay builders
//!
//! Turn a kustomization entry point into a flat list of documents, either
//! natively (a subset of kustomize) or by shelling out to `kustomize build`.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue, json};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::document::{Document, is_cluster_scoped};
use crate::error::{CoreError, Result};

/// Names kustomize accepts for the kustomization file
const KUSTOMIZATION_FILES: &[&str] = &["kustomization.yaml", "kustomization.yml", "Kustomization"];

/// Kustomization fields the built-in builder understands
const SUPPORTED_FIELDS: &[&str] = &[
    "apiVersion",
    "bases",
    "configMapGenerator",
    "generatorOptions",
    "kind",
    "metadata",
    "namespace",
    "resources",
    "secretGenerator",
];

/// Generated names never get a hash suffix, so only this option is a no-op
const SUPPORTED_GENERATOR_OPTIONS: &[&str] = &["disableNameSuffixHash"];

/// Builds the documents of one overlay entry point
pub trait OverlayBuilder: Send + Sync {
    fn build(&self, path: &Path) -> Result<Vec<Document>>;
}

/// Runs an external `kustomize build`
#[derive(Debug, Clone)]
pub struct KustomizeCli {
    binary: PathBuf,
}

impl KustomizeCli {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for KustomizeCli {
    fn default() -> Self {
        Self::new("kustomize")
    }
}

impl OverlayBuilder for KustomizeCli {
    fn build(&self, path: &Path) -> Result<Vec<Document>> {
        let overlay_err = |message: String| CoreError::Overlay {
            path: path.display().to_string(),
            message,
        };

        tracing::debug!(path = %path.display(), binary = %self.binary.display(), "running kustomize");
        let output = Command::new(&self.binary)
            .arg("build")
            .arg(path)
            .output()
            .map_err(|e| overlay_err(format!("failed to run {}: {}", self.binary.display(), e)))?;

        if !output.status.success() {
            return Err(overlay_err(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Document::parse_all(&stdout).map_err(|e| overlay_err(e.to_string()))
    }
}

/// Built-in kustomization support
///
/// Handles `resources`, `namespace`, and literal/file based
/// `configMapGenerator` and `secretGenerator` entries. Generated names
/// never get a hash suffix.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeOverlay;

impl OverlayBuilder for NativeOverlay {
    fn build(&self, path: &Path) -> Result<Vec<Document>> {
        build_path(path).map_err(|e| match e {
            CoreError::Overlay { .. } => e,
            other => CoreError::Overlay {
                path: path.display().to_string(),
                message: other.to_string(),
            },
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Kustomization {
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    bases: Vec<String>,
    #[serde(default)]
    config_map_generator: Vec<Generator>,
    #[serde(default)]
    secret_generator: Vec<Generator>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct Generator {
    name: String,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    literals: Vec<String>,
    #[serde(default)]
    files: Vec<String>,
    #[serde(default)]
    envs: Vec<String>,
    #[serde(default, rename = "type")]
    secret_type: Option<String>,
}

fn build_path(path: &Path) -> Result<Vec<Document>> {
    if path.is_file() {
        let text = std::fs::read_to_string(path)?;
        return Document::parse_all(&text);
    }
    if !path.is_dir() {
        return Err(CoreError::Overlay {
            path: path.display().to_string(),
            message: "path does not exist".to_string(),
        });
    }

    let file = KUSTOMIZATION_FILES
        .iter()
        .map(|name| path.join(name))
        .find(|p| p.is_file())
        .ok_or_else(|| CoreError::Overlay {
            path: path.display().to_string(),
            message: format!("no kustomization file found (tried {})", KUSTOMIZATION_FILES.join(", ")),
        })?;

    tracing::debug!(path = %file.display(), "building kustomization");
    let kustomization = read_kustomization(&file)?;

    let mut docs = Vec::new();
    for resource in kustomization.bases.iter().chain(&kustomization.resources) {
        if is_remote(resource) {
            return Err(CoreError::Overlay {
                path: path.display().to_string(),
                message: format!("remote resource '{}' is not supported", resource),
            });
        }
        let nested = path.join(resource);
        let built = build_path(&nested).map_err(|e| match e {
            CoreError::Overlay { .. } => e,
            other => CoreError::Overlay {
                path: nested.display().to_string(),
                message: other.to_string(),
            },
        })?;
        docs.extend(built);
    }

    for generator in &kustomization.config_map_generator {
        let data = generator_data(path, generator)?;
        docs.push(generated(generator, "ConfigMap", JsonValue::Object(data), None)?);
    }

    for generator in &kustomization.secret_generator {
        let data = generator_data(path, generator)?
            .into_iter()
            .map(|(k, v)| {
                let encoded = STANDARD.encode(v.as_str().unwrap_or_default());
                (k, JsonValue::String(encoded))
            })
            .collect();
        let secret_type = generator.secret_type.as_deref().unwrap_or("Opaque");
        docs.push(generated(generator, "Secret", JsonValue::Object(data), Some(secret_type))?);
    }

    match kustomization.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        Some(namespace) => Ok(docs
            .into_iter()
            .map(|doc| {
                if is_cluster_scoped(&doc.gvk().kind) {
                    doc
                } else {
                    doc.with_namespace(namespace)
                }
            })
            .collect()),
        None => Ok(docs),
    }
}

fn read_kustomization(file: &Path) -> Result<Kustomization> {
    let kustomization_err = |message: String| CoreError::Overlay {
        path: file.display().to_string(),
        message,
    };

    let raw: JsonValue = serde_yaml::from_str(&std::fs::read_to_string(file)?)
        .map_err(|e| kustomization_err(e.to_string()))?;
    if raw.is_null() {
        return Ok(Kustomization::default());
    }
    if let Some(field) = unsupported_field(&raw) {
        return Err(kustomization_err(format!(
            "field '{}' is not supported by the built-in builder, use an external kustomize binary (--kustomize-bin)",
            field
        )));
    }
    serde_json::from_value(raw).map_err(|e| kustomization_err(e.to_string()))
}

/// First field the built-in builder would otherwise ignore
fn unsupported_field(raw: &JsonValue) -> Option<String> {
    let fields = raw.as_object()?;
    if let Some(field) = fields.keys().find(|k| !SUPPORTED_FIELDS.contains(&k.as_str())) {
        return Some(field.clone());
    }
    fields
        .get("generatorOptions")
        .and_then(JsonValue::as_object)
        .and_then(|options| {
            options
                .keys()
                .find(|k| !SUPPORTED_GENERATOR_OPTIONS.contains(&k.as_str()))
        })
        .map(|option| format!("generatorOptions.{}", option))
}

fn is_remote(resource: &str) -> bool {
    resource.contains("://") || resource.starts_with("github.com/") || resource.starts_with("git@")
}

/// Collect generator key/value pairs from literals and files
fn generator_data(dir: &Path, generator: &Generator) -> Result<Map<String, JsonValue>> {
    let generator_err = |message: String| CoreError::Overlay {
        path: dir.display().to_string(),
        message: format!("generator '{}': {}", generator.name, message),
    };

    if !generator.envs.is_empty() {
        return Err(generator_err("envs are not supported".to_string()));
    }

    let mut data = Map::new();
    for literal in &generator.literals {
        let (key, value) = literal
            .split_once('=')
            .ok_or_else(|| generator_err(format!("invalid literal '{}', expected key=value", literal)))?;
        data.insert(key.to_string(), JsonValue::String(unquote(value).to_string()));
    }

    for file in &generator.files {
        let (key, source) = match file.split_once('=') {
            Some((key, source)) => (key.to_string(), source),
            None => {
                let name = Path::new(file)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .ok_or_else(|| generator_err(format!("invalid file source '{}'", file)))?;
                (name, file.as_str())
            }
        };
        let content = std::fs::read_to_string(dir.join(source))
            .map_err(|e| generator_err(format!("failed to read '{}': {}", source, e)))?;
        data.insert(key, JsonValue::String(content));
    }

    Ok(data)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn generated(
    generator: &Generator,
    kind: &str,
    data: JsonValue,
    secret_type: Option<&str>,
) -> Result<Document> {
    let mut metadata = json!({ "name": generator.name });
    if let Some(namespace) = generator.namespace.as_deref().filter(|ns| !ns.is_empty()) {
        metadata["namespace"] = JsonValue::String(namespace.to_string());
    }

    let mut body = json!({
        "apiVersion": "v1",
        "kind": kind,
        "metadata": metadata,
        "data": data,
    });
    if let Some(secret_type) = secret_type {
        body["type"] = JsonValue::String(secret_type.to_string());
    }

    Document::from_value(body)
}
