//! Environment construction when no pipeline document is usable.

use crate::ConfigResult;
use crate::discovery::list_files;
use localplan_core::RunLog;
use localplan_core::environment::{
    EnvironmentConfig, EnvironmentKey, EnvironmentMap, PARAMETER_FILE_EXTENSION,
};
use std::path::{Path, PathBuf};

/// Key used when nothing at all describes an environment.
pub const DEFAULT_ENVIRONMENT: &str = "dev";

/// Parameter files directly inside `dir`, sorted by name.
pub fn find_parameter_files(dir: &Path) -> ConfigResult<Vec<PathBuf>> {
    Ok(list_files(dir)?
        .into_iter()
        .map(|(_, path)| path)
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == PARAMETER_FILE_EXTENSION)
        })
        .collect())
}

/// One environment per parameter file, keyed by the file stem.
pub fn environments_from_parameter_files(files: &[PathBuf]) -> EnvironmentMap {
    files
        .iter()
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let file_name = path.file_name()?.to_str()?;
            let key = EnvironmentKey::new(stem);

            let mut config = EnvironmentConfig::defaults_for(&key);
            config.environment = key.display_name().to_string();
            config.template_parameters = file_name.to_string();
            Some((key, config))
        })
        .collect()
}

/// The single all-defaults `dev` environment.
pub fn default_environments() -> EnvironmentMap {
    let key = EnvironmentKey::new(DEFAULT_ENVIRONMENT);
    let config = EnvironmentConfig::defaults_for(&key);
    EnvironmentMap::from([(key, config)])
}

/// Build environments from parameter files in `dir`, or the default `dev`
/// environment when there are none. Returns whether any files were used.
pub fn fallback_environments(dir: &Path, log: &RunLog) -> (EnvironmentMap, bool) {
    let files = match find_parameter_files(dir) {
        Ok(files) => files,
        Err(e) => {
            log.warning(format!(
                "Could not list parameter files in {}: {}",
                dir.display(),
                e
            ));
            Vec::new()
        }
    };

    let environments = environments_from_parameter_files(&files);
    if environments.is_empty() {
        log.warning(format!(
            "No .{} files found in {}, using default '{}' environment",
            PARAMETER_FILE_EXTENSION,
            dir.display(),
            DEFAULT_ENVIRONMENT
        ));
        return (default_environments(), false);
    }

    let keys: Vec<&str> = environments.keys().map(|k| k.as_str()).collect();
    log.info(format!(
        "Derived environments from parameter files: {}",
        keys.join(", ")
    ));
    (environments, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parameter_files_map_to_display_names() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("dev.bicepparam"), "using 'main.bicep'\n").unwrap();
        fs::write(tmp.path().join("uat.bicepparam"), "using 'main.bicep'\n").unwrap();
        fs::write(tmp.path().join("main.bicep"), "").unwrap();

        let log = RunLog::new();
        let (envs, from_files) = fallback_environments(tmp.path(), &log);
        assert!(from_files);

        let keys: Vec<_> = envs.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["dev", "uat"]);

        let dev = &envs[&EnvironmentKey::from("dev")];
        assert_eq!(dev.environment, "development");
        assert_eq!(dev.template_parameters, "dev.bicepparam");
        assert_eq!(dev.service_connection, "sc-dev");

        let uat = &envs[&EnvironmentKey::from("uat")];
        assert_eq!(uat.environment, "acceptance");
        assert_eq!(log.warning_count(), 0);
    }

    #[test]
    fn test_unknown_code_keeps_its_name() {
        let files = vec![PathBuf::from("/repo/sandbox.bicepparam")];
        let envs = environments_from_parameter_files(&files);
        let sandbox = &envs[&EnvironmentKey::from("sandbox")];
        assert_eq!(sandbox.environment, "sandbox");
        assert_eq!(sandbox.template_parameters, "sandbox.bicepparam");
    }

    #[test]
    fn test_no_files_yields_single_default_dev() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("dev.json"), "{}").unwrap();

        let log = RunLog::new();
        let (envs, from_files) = fallback_environments(tmp.path(), &log);
        assert!(!from_files);
        assert_eq!(envs.len(), 1);
        assert_eq!(
            envs[&EnvironmentKey::from("dev")],
            EnvironmentConfig::defaults_for(&EnvironmentKey::from("dev"))
        );
        assert_eq!(log.warning_count(), 1);
    }

    #[test]
    fn test_subdirectories_are_not_scanned() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("params")).unwrap();
        fs::write(tmp.path().join("params").join("prod.bicepparam"), "").unwrap();

        assert!(find_parameter_files(tmp.path()).unwrap().is_empty());
    }
}
