//! Repository index types
//!
//! Helm-compatible `index.yaml` with semver constraint resolution.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{RepoError, Result};

/// Repository index (Helm-compatible)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryIndex {
    #[serde(default)]
    pub api_version: String,

    /// Kept verbatim; indexes in the wild disagree on the timestamp format
    #[serde(default)]
    pub generated: Option<String>,

    /// Chart versions by chart name
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<ChartVersion>>,
}

/// One published version of a chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartVersion {
    pub name: String,

    pub version: String,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Archive locations, absolute or relative to the repository URL
    #[serde(default)]
    pub urls: Vec<String>,

    /// SHA-256 of the archive, hex encoded
    #[serde(default)]
    pub digest: Option<String>,

    #[serde(default)]
    pub deprecated: bool,
}

impl ChartVersion {
    pub fn download_url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    fn semver(&self) -> Option<Version> {
        parse_version(&self.version)
    }
}

impl RepositoryIndex {
    pub fn from_bytes(url: &str, bytes: &[u8]) -> Result<Self> {
        serde_yaml::from_slice(bytes).map_err(|e| RepoError::InvalidIndex {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    pub fn versions(&self, chart: &str) -> &[ChartVersion] {
        self.entries.get(chart).map(Vec::as_slice).unwrap_or_default()
    }

    /// Highest version of `chart` satisfying `constraint`
    ///
    /// An empty constraint or `*` accepts any stable version. A plain version
    /// such as `1.2.3` must match exactly. Otherwise the constraint uses
    /// Helm syntax: comparators separated by spaces or commas, alternatives
    /// separated by `||`.
    pub fn find_best_match(&self, repo: &str, chart: &str, constraint: &str) -> Result<&ChartVersion> {
        let versions = self.versions(chart);
        if versions.is_empty() {
            return Err(RepoError::ChartNotFound {
                chart: chart.to_string(),
                repo: repo.to_string(),
            });
        }

        let matcher = Constraint::parse(constraint)?;
        versions
            .iter()
            .filter_map(|v| v.semver().map(|semver| (semver, v)))
            .filter(|(semver, _)| matcher.matches(semver))
            .max_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v)
            .ok_or_else(|| RepoError::UnsatisfiableConstraint {
                chart: chart.to_string(),
                constraint: constraint.to_string(),
                available: versions
                    .iter()
                    .map(|v| v.version.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

fn parse_version(raw: &str) -> Option<Version> {
    Version::parse(raw.trim().trim_start_matches('v')).ok()
}

enum Constraint {
    Exact(Version),
    AnyOf(Vec<VersionReq>),
}

impl Constraint {
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::AnyOf(vec![VersionReq::STAR]));
        }
        if let Some(version) = parse_version(raw) {
            return Ok(Self::Exact(version));
        }

        raw.split("||")
            .map(|alternative| {
                VersionReq::parse(&comparators(alternative)).map_err(|e| {
                    RepoError::InvalidConstraint {
                        constraint: raw.to_string(),
                        message: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<_>>>()
            .map(Self::AnyOf)
    }

    fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(exact) => exact == version,
            Self::AnyOf(reqs) => reqs.iter().any(|req| req.matches(version)),
        }
    }
}

/// `>= 1.0 <2` becomes `>=1.0, <2`
fn comparators(alternative: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut pending_op = String::new();

    for token in alternative.split([' ', ',']).filter(|t| !t.is_empty()) {
        let token = token.strip_prefix('v').unwrap_or(token);
        if token.chars().all(|c| "<>=~^!".contains(c)) {
            pending_op.push_str(token);
            continue;
        }
        out.push(format!("{}{}", std::mem::take(&mut pending_op), token));
    }
    out.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"
apiVersion: v1
generated: "2024-01-01T00:00:00Z"
entries:
  podinfo:
    - name: podinfo
      version: 6.5.0
      urls: [podinfo-6.5.0.tgz]
      digest: abc
    - name: podinfo
      version: 6.4.1
      urls: [https://example.com/podinfo-6.4.1.tgz]
    - name: podinfo
      version: 7.0.0-rc.1
      urls: [podinfo-7.0.0-rc.1.tgz]
    - name: podinfo
      version: not-a-version
      urls: []
"#;

    fn index() -> RepositoryIndex {
        RepositoryIndex::from_bytes("http://repo", INDEX.as_bytes()).unwrap()
    }

    fn best(constraint: &str) -> Result<String> {
        index()
            .find_best_match("repo", "podinfo", constraint)
            .map(|v| v.version.clone())
    }

    #[test]
    fn test_any_version_skips_prereleases() {
        assert_eq!(best("").unwrap(), "6.5.0");
        assert_eq!(best("*").unwrap(), "6.5.0");
    }

    #[test]
    fn test_exact_version() {
        assert_eq!(best("6.4.1").unwrap(), "6.4.1");
        assert_eq!(best("v6.4.1").unwrap(), "6.4.1");
        assert_eq!(best("7.0.0-rc.1").unwrap(), "7.0.0-rc.1");
    }

    #[test]
    fn test_helm_style_ranges() {
        assert_eq!(best(">=6.0.0 <6.5.0").unwrap(), "6.4.1");
        assert_eq!(best(">= 6.0, < 6.5").unwrap(), "6.4.1");
        assert_eq!(best("6.4.x").unwrap(), "6.4.1");
        assert_eq!(best("<6.0.0 || ~6.4").unwrap(), "6.4.1");
    }

    #[test]
    fn test_chart_not_found() {
        let err = index().find_best_match("repo", "nginx", "*").unwrap_err();
        assert!(matches!(err, RepoError::ChartNotFound { .. }));
    }

    #[test]
    fn test_unsatisfiable() {
        let err = best(">=8.0.0").unwrap_err();
        match err {
            RepoError::UnsatisfiableConstraint { available, .. } => {
                assert!(available.contains("6.5.0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_index() {
        let err = RepositoryIndex::from_bytes("http://repo", b"entries: [").unwrap_err();
        assert!(matches!(err, RepoError::InvalidIndex { .. }));
    }
}
