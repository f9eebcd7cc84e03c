//! Integration tests for CLI commands

use std::process::Command;
use tempfile::TempDir;

/// Helper to run the fluxpreview binary with an isolated repository state
fn fluxpreview(args: &[&str]) -> std::process::Output {
    let state = TempDir::new().expect("Failed to create state dir");
    Command::new(env!("CARGO_BIN_EXE_fluxpreview"))
        .args(args)
        .env("FLUXPREVIEW_REPOSITORY_CONFIG", state.path().join("repositories.yaml"))
        .env("FLUXPREVIEW_REPOSITORY_CACHE", state.path().join("cache"))
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute fluxpreview")
}

/// Get a path below the fixtures directory
fn fixture(name: &str) -> String {
    format!("{}/../../fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn stdout(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

mod render_command {
    use super::*;

    #[test]
    fn test_render_repository() {
        let output = fluxpreview(&["render", &fixture("repo-a")]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let out = stdout(&output);
        let namespace = out.find("kind: Namespace").unwrap();
        let x = out.find("name: x").unwrap();
        let y = out.find("name: y").unwrap();
        assert!(namespace < x && x < y, "documents out of order:\n{out}");
        assert_eq!(out.matches("---\n").count(), 2);
        assert!(out.contains("namespace: apps"));
    }

    #[test]
    fn test_render_single_kustomization() {
        let output = fluxpreview(&["render", &fixture("repo-a"), "-k", "apps"]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let out = stdout(&output);
        assert!(!out.contains("kind: Namespace"));
        assert!(out.contains("name: x"));
    }

    #[test]
    fn test_render_with_filters() {
        let output = fluxpreview(&[
            "render",
            &fixture("repo-a"),
            "--filter-file",
            &fixture("filters.yaml"),
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(!stdout(&output).contains("helm.sh/chart"));
    }

    #[test]
    fn test_render_without_helm_keeps_releases() {
        let output = fluxpreview(&["render", &fixture("repo-gitsource")]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(stdout(&output).contains("kind: HelmRelease"));
    }

    #[test]
    fn test_render_missing_repository() {
        let output = fluxpreview(&["render", &fixture("does-not-exist")]);
        assert_eq!(output.status.code(), Some(2));
        assert!(stdout(&output).is_empty());
        assert!(stderr(&output).contains("failed to add kustomization"));
    }

    #[test]
    fn test_render_unsupported_chart_source() {
        let output = fluxpreview(&["render", &fixture("repo-gitsource"), "-H"]);
        assert_eq!(output.status.code(), Some(2));
        assert!(stderr(&output).contains("unsupported source kind 'GitRepository'"));
    }

    #[test]
    fn test_render_unknown_filter_kind() {
        let output = fluxpreview(&[
            "render",
            &fixture("repo-a"),
            "--filter-file",
            &fixture("filters-invalid.yaml"),
        ]);
        assert_eq!(output.status.code(), Some(2));
        let err = stderr(&output);
        assert!(err.contains("unsupported filter kind 'LabelRemovr'"));
        assert!(err.contains("LabelRemover"));
    }

    #[test]
    fn test_render_missing_filter_file() {
        let output = fluxpreview(&[
            "render",
            &fixture("repo-a"),
            "--filter-file",
            &fixture("nope.yaml"),
        ]);
        assert_eq!(output.status.code(), Some(5));
    }
}

mod diff_command {
    use super::*;

    #[test]
    fn test_diff_repositories() {
        let output = fluxpreview(&["diff", &fixture("repo-a"), &fixture("repo-b")]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let out = stdout(&output);
        let z = out.find("--- ConfigMap/v1/apps/z").unwrap();
        let x = out.find("--- ConfigMap/v1/apps/x").unwrap();
        let y = out.find("--- ConfigMap/v1/apps/y").unwrap();
        assert!(z < x && x < y, "blocks out of order:\n{out}");
        assert!(out.contains("-  key: '1'\n+  key: '2'\n"));
        assert!(!out.contains("Namespace/v1/_/apps"));
    }

    #[test]
    fn test_diff_with_filters() {
        let output = fluxpreview(&[
            "diff",
            &fixture("repo-a"),
            &fixture("repo-b"),
            "--filter-file",
            &fixture("filters.yaml"),
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert!(!stdout(&output).contains("helm.sh/chart"));
    }

    #[test]
    fn test_diff_identical_is_empty() {
        let output = fluxpreview(&["diff", &fixture("repo-a"), &fixture("repo-a")]);
        assert!(output.status.success());
        assert!(stdout(&output).is_empty());
    }

    #[test]
    fn test_diff_summary() {
        let output = fluxpreview(&["diff", &fixture("repo-a"), &fixture("repo-b"), "--summary"]);
        assert!(output.status.success());

        let err = console_free(&stderr(&output));
        assert!(err.contains("1 added, 1 deleted, 1 changed, 1 unchanged"), "stderr: {err}");
        assert!(err.contains("+ ConfigMap/v1/apps/z"));
    }

    #[test]
    fn test_diff_markdown_report() {
        let dir = TempDir::new().unwrap();
        let report = dir.path().join("report.md");
        let output = fluxpreview(&[
            "diff",
            &fixture("repo-a"),
            &fixture("repo-b"),
            "--markdown-out",
            report.to_str().unwrap(),
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));

        let markdown = std::fs::read_to_string(&report).unwrap();
        assert!(markdown.starts_with("### Flux preview: 1 added, 1 deleted, 2 modified (1 changed)"));
        assert!(markdown.contains("```diff\n--- ConfigMap/v1/apps/z"));
        assert!(markdown.trim_end().ends_with("```"));
    }

    #[test]
    fn test_diff_custom_markdown_template() {
        let dir = TempDir::new().unwrap();
        let template = dir.path().join("template.md");
        let report = dir.path().join("report.md");
        std::fs::write(&template, "{{ kustomizations | join(',') }}|{{ summary }}").unwrap();

        let output = fluxpreview(&[
            "diff",
            &fixture("repo-a"),
            &fixture("repo-b"),
            "-k",
            "apps",
            "--markdown-out",
            report.to_str().unwrap(),
            "--markdown-template",
            template.to_str().unwrap(),
        ]);
        assert!(output.status.success(), "stderr: {}", stderr(&output));
        assert_eq!(
            std::fs::read_to_string(&report).unwrap(),
            "apps|1 added, 1 deleted, 1 modified (1 changed)"
        );
    }

    #[test]
    fn test_diff_fails_when_one_side_fails() {
        let output = fluxpreview(&["diff", &fixture("repo-a"), &fixture("does-not-exist")]);
        assert_eq!(output.status.code(), Some(2));
        assert!(stdout(&output).is_empty());
    }

    #[test]
    fn test_diff_requires_two_repositories() {
        let output = fluxpreview(&["diff", &fixture("repo-a")]);
        assert!(!output.status.success());
    }

    /// Strip ANSI escapes in case the terminal forced colors on
    fn console_free(text: &str) -> String {
        let mut out = String::new();
        let mut chars = text.chars();
        while let Some(c) = chars.next() {
            if c == '\u{1b}' {
                for c in chars.by_ref() {
                    if c == 'm' {
                        break;
                    }
                }
            } else {
                out.push(c);
            }
        }
        out
    }
}

mod general {
    use super::*;

    #[test]
    fn test_help() {
        let output = fluxpreview(&["--help"]);
        assert!(output.status.success());
        let out = stdout(&output);
        assert!(out.contains("render"));
        assert!(out.contains("diff"));
    }

    #[test]
    fn test_version() {
        let output = fluxpreview(&["--version"]);
        assert!(output.status.success());
        assert!(stdout(&output).contains("fluxpreview"));
    }
}
