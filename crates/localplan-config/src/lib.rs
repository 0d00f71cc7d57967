//! Pipeline configuration extraction for localplan.
//!
//! This crate handles:
//! - Discovery of the pipeline document through ordered search roots
//! - Parsing branch-scoped variables into per-environment configuration
//! - Fallback construction from `.bicepparam` files
//! - The global settings scan

pub mod discovery;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod settings;

pub use discovery::{SearchRoot, discover_pipeline_document, pipeline_roots, settings_roots};
pub use error::{ConfigError, ConfigResult};
pub use pipeline::parse_document;
pub use settings::scan_global_settings;

use localplan_core::RunLog;
use localplan_core::environment::{EnvironmentConfig, EnvironmentKey, EnvironmentMap};
use std::path::{Path, PathBuf};

/// Where the resolved environments came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Branch-scoped variables of a pipeline document.
    Pipeline(PathBuf),
    /// `.bicepparam` files in the working directory.
    ParameterFiles,
    /// Nothing usable was found.
    Default,
}

/// Per-environment configuration of a run.
///
/// Handed out by copy so collaborators cannot alter what others see.
#[derive(Debug, Clone)]
pub struct ResolvedEnvironments {
    source: ConfigSource,
    environments: EnvironmentMap,
}

impl ResolvedEnvironments {
    pub fn source(&self) -> &ConfigSource {
        &self.source
    }

    /// Copy of one environment's configuration.
    pub fn get(&self, key: &EnvironmentKey) -> Option<EnvironmentConfig> {
        self.environments.get(key).cloned()
    }

    /// Copy of every environment's configuration.
    pub fn snapshot(&self) -> EnvironmentMap {
        self.environments.clone()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EnvironmentKey> {
        self.environments.keys()
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

/// Read a whole document as UTF-8 text.
pub(crate) fn read_document(path: &Path) -> ConfigResult<String> {
    let bytes = std::fs::read(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    String::from_utf8(bytes).map_err(|_| ConfigError::Encoding(path.to_path_buf()))
}

/// Resolve the environments of a run.
///
/// Uses `pipeline` when given, otherwise the first document found under
/// `roots`. When no document is found, it cannot be read, or it defines no
/// environments, environments are derived from parameter files in
/// `working_dir`. Never fails.
pub fn load_environments(
    working_dir: &Path,
    roots: &[SearchRoot],
    pipeline: Option<&Path>,
    log: &RunLog,
) -> ResolvedEnvironments {
    let document = match pipeline {
        Some(path) => Some(path.to_path_buf()),
        None => discover_pipeline_document(roots, log),
    };

    match &document {
        Some(path) => match read_document(path).map(|content| parse_document(&content)) {
            Ok(environments) if !environments.is_empty() => {
                let keys: Vec<&str> = environments.keys().map(|k| k.as_str()).collect();
                log.success(format!(
                    "Loaded {} environment(s) from {}: {}",
                    environments.len(),
                    path.display(),
                    keys.join(", ")
                ));
                return ResolvedEnvironments {
                    source: ConfigSource::Pipeline(path.clone()),
                    environments,
                };
            }
            Ok(_) => log.warning(format!(
                "No branch-scoped environments in {}, falling back to parameter files",
                path.display()
            )),
            Err(e) => log.error(format!(
                "Could not parse pipeline document: {}. Falling back to parameter files",
                e
            )),
        },
        None => log.warning("No pipeline document found, falling back to parameter files"),
    }

    let (environments, from_files) = fallback::fallback_environments(working_dir, log);
    ResolvedEnvironments {
        source: if from_files {
            ConfigSource::ParameterFiles
        } else {
            ConfigSource::Default
        },
        environments,
    }
}
