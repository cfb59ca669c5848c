//! Project sanity checks, registered as the `checks` group.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use shut_core::error::Result;
use shut_core::{Outcome, Plugin, PluginContext, Task, TaskGraph};
use toml::{Table, Value};
use tracing::{debug, warn};

pub struct ChecksPlugin;

impl ChecksPlugin {
    pub const NAME: &'static str = "checks";
}

impl Plugin for ChecksPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn register(&self, graph: &mut TaskGraph, ctx: &PluginContext) -> Result<()> {
        let group = graph.create_group(Self::NAME, None)?;
        let mut checks = graph.group_mut(group)?;

        let root = ctx.root.clone();
        checks.add_task(Task::from_fn("readme", move |_| check_readme(&root)))?;

        let root = ctx.root.clone();
        checks.add_task(Task::from_fn("license", move |_| check_license(&root)))?;

        let root = ctx.root.clone();
        checks.add_task(Task::from_fn("manifest", move |_| check_manifest(&root)))?;

        Ok(())
    }
}

/// Finds a file in `root` whose name, minus extension, matches one of `stems` (ignoring case).
fn find_file(root: &Path, stems: &[&str]) -> anyhow::Result<Option<PathBuf>> {
    let entries = fs::read_dir(root)
        .with_context(|| format!("failed to read directory {}", root.display()))?;

    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let matches = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stems.iter().any(|s| stem.eq_ignore_ascii_case(s)));
        if matches {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn check_readme(root: &Path) -> Outcome {
    match find_file(root, &["readme"]) {
        Ok(Some(_)) => Outcome::Completed,
        Ok(None) => {
            warn!(root = %root.display(), "no README file found");
            Outcome::Skipped
        }
        Err(err) => Outcome::Failed(err),
    }
}

fn check_license(root: &Path) -> Outcome {
    match find_file(root, &["license", "licence", "copying"]) {
        Ok(Some(_)) => Outcome::Completed,
        Ok(None) => {
            warn!(root = %root.display(), "no LICENSE file found");
            Outcome::Skipped
        }
        Err(err) => Outcome::Failed(err),
    }
}

/// Validates whichever package manifest the project has. Skips when there is none.
fn check_manifest(root: &Path) -> Outcome {
    let candidates = [
        ("Cargo.toml", "package"),
        ("pyproject.toml", "project"),
    ];

    for (file, table) in candidates {
        let path = root.join(file);
        if path.exists() {
            return match validate_manifest(&path, table) {
                Ok(true) => Outcome::Completed,
                Ok(false) => Outcome::Skipped,
                Err(err) => Outcome::Failed(err),
            };
        }
    }
    Outcome::Skipped
}

/// Checks that the manifest's `table` names the package and its version.
///
/// Returns `false` for a virtual Cargo workspace, which has no package of its own.
fn validate_manifest(path: &Path, table: &str) -> anyhow::Result<bool> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: Table = content
        .parse()
        .with_context(|| format!("failed to parse {}", path.display()))?;

    let Some(section) = manifest.get(table) else {
        if manifest.contains_key("workspace") {
            debug!(path = %path.display(), "virtual workspace manifest, nothing to check");
            return Ok(false);
        }
        bail!("{} has no [{}] table", path.display(), table);
    };

    let missing: Vec<&str> = ["name", "version"]
        .into_iter()
        .filter(|key| !has_value(section, key))
        .collect();
    if !missing.is_empty() {
        bail!(
            "{} is missing {}",
            path.display(),
            missing
                .iter()
                .map(|key| format!("$.{}.{}", table, key))
                .collect::<Vec<_>>()
                .join(", ")
        );
    }
    Ok(true)
}

/// A key counts as set when it holds a string or is inherited with `key.workspace = true`.
fn has_value(section: &Value, key: &str) -> bool {
    match section.get(key) {
        Some(Value::String(_)) => true,
        Some(Value::Table(inherited)) => inherited
            .get("workspace")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shut_core::{TaskRunner, TaskStatus};
    use tempfile::TempDir;

    fn run_checks(root: &Path) -> Vec<(String, TaskStatus)> {
        let mut graph = TaskGraph::new();
        let ctx = PluginContext {
            root: root.to_path_buf(),
        };
        shut_core::plugin::apply(&mut graph, &ChecksPlugin, &ctx).unwrap();
        let report = TaskRunner::new().run(&mut graph, &["checks"]).unwrap();
        report
            .results
            .into_iter()
            .map(|r| (r.id, r.status))
            .collect()
    }

    #[test]
    fn test_empty_project() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            run_checks(dir.path()),
            vec![
                ("checks:readme".to_string(), TaskStatus::Skipped),
                ("checks:license".to_string(), TaskStatus::Skipped),
                ("checks:manifest".to_string(), TaskStatus::Skipped),
            ]
        );
    }

    #[test]
    fn test_complete_project() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# demo").unwrap();
        fs::write(dir.path().join("LICENSE.txt"), "MIT").unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[package]\nname = \"demo\"\nversion = \"0.1.0\"\n",
        )
        .unwrap();

        let results = run_checks(dir.path());
        assert!(results.iter().all(|(_, s)| *s == TaskStatus::Success));
    }

    #[test]
    fn test_incomplete_manifest() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("pyproject.toml"), "[project]\nname = \"demo\"\n").unwrap();

        let err = validate_manifest(&dir.path().join("pyproject.toml"), "project").unwrap_err();
        assert!(err.to_string().contains("$.project.version"));
    }

    #[test]
    fn test_inherited_package_fields() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.toml");
        fs::write(
            &path,
            "[package]\nname = \"demo\"\nversion.workspace = true\nedition.workspace = true\n",
        )
        .unwrap();
        assert!(validate_manifest(&path, "package").unwrap());

        fs::write(&path, "[package]\nname = \"demo\"\nversion = { workspace = false }\n").unwrap();
        let err = validate_manifest(&path, "package").unwrap_err();
        assert!(err.to_string().contains("$.package.version"));
    }

    #[test]
    fn test_virtual_workspace_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("README.md"), "# demo").unwrap();
        fs::write(
            dir.path().join("Cargo.toml"),
            "[workspace]\nmembers = [\"core\"]\n\n[workspace.package]\nversion = \"0.1.0\"\n",
        )
        .unwrap();

        let results = run_checks(dir.path());
        assert_eq!(
            results[2],
            ("checks:manifest".to_string(), TaskStatus::Skipped)
        );
        assert_eq!(results[0], ("checks:readme".to_string(), TaskStatus::Success));
    }

    #[test]
    fn test_manifest_without_package_table_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Cargo.toml");
        fs::write(&path, "[dependencies]\nserde = \"1\"\n").unwrap();
        let err = validate_manifest(&path, "package").unwrap_err();
        assert!(err.to_string().contains("has no [package] table"));
    }
}
