//! Pipeline document discovery.
//!
//! Search roots are tried in priority order. Each root lists its directory
//! without recursing and matches file names against its glob patterns.

use crate::{ConfigError, ConfigResult};
use glob::Pattern;
use localplan_core::RunLog;
use std::path::{Path, PathBuf};

/// Pipeline file names recognized at the repository root.
const ROOT_PIPELINE_PATTERNS: [&str; 2] = ["azure-pipelines.yml", "azure-pipelines.yaml"];
/// Pipeline file names recognized inside pipeline folders.
const YAML_PATTERNS: [&str; 2] = ["*.yml", "*.yaml"];
/// Folders that conventionally hold pipeline definitions.
const PIPELINE_FOLDERS: [&str; 3] = ["pipelines", ".pipelines", ".azuredevops"];

/// A directory paired with the file patterns accepted in it.
#[derive(Debug, Clone)]
pub struct SearchRoot {
    pub dir: PathBuf,
    pub patterns: Vec<String>,
}

/// A file found by a search root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMatch {
    pub path: PathBuf,
    pub root: PathBuf,
    pub pattern: String,
}

impl SearchRoot {
    pub fn new(dir: impl Into<PathBuf>, patterns: &[&str]) -> Self {
        Self {
            dir: dir.into(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
        }
    }

    /// First file matching this root's patterns. Patterns are tried in
    /// order; within a pattern, files are tried by name.
    pub fn resolve(&self) -> ConfigResult<Option<DocumentMatch>> {
        let files = list_files(&self.dir)?;

        for raw in &self.patterns {
            let pattern = Pattern::new(raw)?;
            if let Some((_, path)) = files.iter().find(|(name, _)| pattern.matches(name)) {
                return Ok(Some(DocumentMatch {
                    path: path.clone(),
                    root: self.dir.clone(),
                    pattern: raw.clone(),
                }));
            }
        }

        Ok(None)
    }

    /// Every file matching any of this root's patterns, sorted by name.
    pub fn candidates(&self) -> ConfigResult<Vec<PathBuf>> {
        let patterns = self
            .patterns
            .iter()
            .map(|p| Pattern::new(p))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(list_files(&self.dir)?
            .into_iter()
            .filter(|(name, _)| patterns.iter().any(|p| p.matches(name)))
            .map(|(_, path)| path)
            .collect())
    }
}

/// Roots searched for the pipeline document: the repository root first,
/// then the conventional pipeline folders.
pub fn pipeline_roots(base: &Path) -> Vec<SearchRoot> {
    let mut roots = vec![SearchRoot::new(base, &ROOT_PIPELINE_PATTERNS)];
    roots.extend(
        PIPELINE_FOLDERS
            .iter()
            .map(|folder| SearchRoot::new(base.join(folder), &YAML_PATTERNS)),
    );
    roots
}

/// Roots searched for global settings: same directories as
/// [`pipeline_roots`], accepting any YAML file.
pub fn settings_roots(base: &Path) -> Vec<SearchRoot> {
    pipeline_roots(base)
        .into_iter()
        .map(|root| SearchRoot::new(root.dir, &YAML_PATTERNS))
        .collect()
}

/// Find the pipeline document, trying each root in order.
pub fn discover_pipeline_document(roots: &[SearchRoot], log: &RunLog) -> Option<PathBuf> {
    for root in roots {
        match root.resolve() {
            Ok(Some(found)) => {
                log.info(format!(
                    "Found pipeline document {} (pattern '{}' in {})",
                    found.path.display(),
                    found.pattern,
                    found.root.display()
                ));
                return Some(found.path);
            }
            Ok(None) => {}
            Err(e) => log.warning(format!(
                "Skipping search root {}: {}",
                root.dir.display(),
                e
            )),
        }
    }
    None
}

/// Regular files directly inside `dir` as (file name, path), sorted by name.
/// A missing directory yields no files.
pub(crate) fn list_files(dir: &Path) -> ConfigResult<Vec<(String, PathBuf)>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: dir.to_path_buf(),
                source,
            });
        }
    };

    let mut files = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            files.push((name.to_string(), path.clone()));
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, "variables:\n").unwrap();
    }

    #[test]
    fn test_root_document_preferred_over_pipeline_folder() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "pipelines/deploy.yml");
        touch(tmp.path(), "azure-pipelines.yml");

        let log = RunLog::new();
        let found = discover_pipeline_document(&pipeline_roots(tmp.path()), &log).unwrap();
        assert_eq!(found, tmp.path().join("azure-pipelines.yml"));
    }

    #[test]
    fn test_falls_through_to_pipeline_folder() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "pipelines/b.yaml");
        touch(tmp.path(), "pipelines/a.yml");
        touch(tmp.path(), "README.md");

        let log = RunLog::new();
        let found = discover_pipeline_document(&pipeline_roots(tmp.path()), &log).unwrap();
        assert_eq!(found, tmp.path().join("pipelines").join("a.yml"));
    }

    #[test]
    fn test_does_not_recurse() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "pipelines/nested/deep.yml");
        touch(tmp.path(), "nested/azure-pipelines.yml");

        let log = RunLog::new();
        assert!(discover_pipeline_document(&pipeline_roots(tmp.path()), &log).is_none());
    }

    #[test]
    fn test_pattern_order_wins_over_name_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.yaml");
        touch(tmp.path(), "z.yml");

        let root = SearchRoot::new(tmp.path(), &["*.yml", "*.yaml"]);
        let found = root.resolve().unwrap().unwrap();
        assert_eq!(found.pattern, "*.yml");
        assert_eq!(found.path, tmp.path().join("z.yml"));
    }

    #[test]
    fn test_candidates_across_patterns() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "b.yml");
        touch(tmp.path(), "a.yaml");
        touch(tmp.path(), "c.json");

        let root = SearchRoot::new(tmp.path(), &YAML_PATTERNS);
        let names: Vec<_> = root
            .candidates()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.yaml", "b.yml"]);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let tmp = TempDir::new().unwrap();
        let root = SearchRoot::new(tmp.path(), &["[unclosed"]);
        assert!(matches!(root.resolve(), Err(ConfigError::Pattern(_))));
    }
}
