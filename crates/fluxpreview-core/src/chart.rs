//! Chart model and loading
//!
//! A chart is loaded either from a directory or from the bytes of a `.tgz`
//! archive with a single top-level directory. Only text files are kept;
//! they are addressed by their path relative to the chart root.

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Component, Path};
use tar::{Archive, Builder, Header};

use crate::error::{CoreError, Result};
use crate::values::Values;

const CHART_FILE: &str = "Chart.yaml";
const VALUES_FILE: &str = "values.yaml";
const TEMPLATES_DIR: &str = "templates/";
const CRDS_DIR: &str = "crds/";

/// Chart.yaml contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMetadata {
    #[serde(default)]
    pub api_version: String,

    pub name: String,

    #[serde(with = "version_serde")]
    pub version: Version,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
}

/// A loaded chart
#[derive(Debug, Clone)]
pub struct Chart {
    pub metadata: ChartMetadata,

    /// Defaults from values.yaml
    pub values: Values,

    files: BTreeMap<String, String>,
}

impl Chart {
    /// Load a chart from a directory
    pub fn load_dir<P: AsRef<Path>>(path: P) -> Result<Self> {
        let root = path.as_ref();
        if !root.is_dir() {
            return Err(CoreError::ChartNotFound {
                path: root.display().to_string(),
            });
        }

        let mut files = BTreeMap::new();
        for entry in walkdir::WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .replace('\\', "/");
            files.insert(relative, std::fs::read(entry.path())?);
        }

        Self::from_files(files, &root.display().to_string())
    }

    /// Load a chart from gzipped tar bytes
    pub fn from_archive(bytes: &[u8]) -> Result<Self> {
        let mut archive = Archive::new(GzDecoder::new(bytes));
        let mut top_dir: Option<String> = None;
        let mut files = BTreeMap::new();

        for entry in archive.entries()? {
            let mut entry = entry?;
            if !entry.header().entry_type().is_file() {
                continue;
            }

            let path = entry.path()?.into_owned();
            let mut parts = Vec::new();
            for component in path.components() {
                match component {
                    Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                    Component::CurDir => {}
                    _ => {
                        return Err(CoreError::InvalidChart {
                            message: format!("illegal path in archive: {}", path.display()),
                        });
                    }
                }
            }

            let Some((top, rest)) = parts.split_first() else {
                continue;
            };
            if rest.is_empty() {
                return Err(CoreError::InvalidChart {
                    message: format!("file outside chart directory: {}", top),
                });
            }
            match &top_dir {
                Some(dir) if dir != top => {
                    return Err(CoreError::InvalidChart {
                        message: format!(
                            "archive has more than one top-level directory ({}, {})",
                            dir, top
                        ),
                    });
                }
                Some(_) => {}
                None => top_dir = Some(top.clone()),
            }

            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            files.insert(rest.join("/"), data);
        }

        let origin = top_dir.unwrap_or_else(|| "<archive>".to_string());
        Self::from_files(files, &origin)
    }

    /// Build a chart from chart-relative paths and raw contents
    pub fn from_files(raw: BTreeMap<String, Vec<u8>>, origin: &str) -> Result<Self> {
        let files: BTreeMap<String, String> = raw
            .into_iter()
            .filter_map(|(path, data)| String::from_utf8(data).ok().map(|text| (path, text)))
            .collect();

        let chart_yaml = files.get(CHART_FILE).ok_or_else(|| CoreError::InvalidChart {
            message: format!("{} not found in {}", CHART_FILE, origin),
        })?;
        let metadata: ChartMetadata =
            serde_yaml::from_str(chart_yaml).map_err(|e| CoreError::InvalidChart {
                message: format!("invalid {} in {}: {}", CHART_FILE, origin, e),
            })?;

        let values = match files.get(VALUES_FILE) {
            Some(text) => Values::from_yaml(text)?,
            None => Values::new(),
        };

        Ok(Self {
            metadata,
            values,
            files,
        })
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    pub fn version(&self) -> &Version {
        &self.metadata.version
    }

    /// Template files as `(path, content)`, sorted by path
    ///
    /// Includes `_` helpers; callers decide what to render.
    pub fn templates(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .filter(|(path, _)| path.starts_with(TEMPLATES_DIR))
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    /// CRD files as `(path, content)`, sorted by path
    pub fn crds(&self) -> impl Iterator<Item = (&str, &str)> {
        self.files
            .iter()
            .filter(|(path, _)| {
                path.starts_with(CRDS_DIR)
                    && (path.ends_with(".yaml") || path.ends_with(".yml") || path.ends_with(".json"))
            })
            .map(|(path, content)| (path.as_str(), content.as_str()))
    }

    /// Raw file content by chart-relative path
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

/// Package a chart directory as `.tgz` bytes under `<name>/`
pub fn package_dir<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    let chart = Chart::load_dir(path.as_ref())?;
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = Builder::new(encoder);

    for (relative, content) in &chart.files {
        let mut header = Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_cksum();
        builder.append_data(
            &mut header,
            format!("{}/{}", chart.name(), relative),
            content.as_bytes(),
        )?;
    }

    let encoder = builder.into_inner()?;
    Ok(encoder.finish()?)
}

/// Custom serde for semver::Version, tolerating a leading `v`
mod version_serde {
    use semver::Version;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(version: &Version, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&version.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Version, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Version::parse(s.trim_start_matches('v')).map_err(serde::de::Error::custom)
    }
}
