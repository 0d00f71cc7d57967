//! Global settings scan.
//!
//! Settings such as the provider list or the compliance baseline are flat
//! `key: value` entries anywhere in a pipeline file. Candidate documents
//! are searched in order and the first one containing any known key wins.

use crate::discovery::SearchRoot;
use crate::read_document;
use localplan_core::RunLog;
use localplan_core::settings::{GlobalConfig, SETTING_KEYS};
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

static SETTING_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    SETTING_KEYS
        .iter()
        .map(|key| {
            let pattern = format!(
                r#"{}[ \t]*:[ \t]*(?:"([^"]*)"|'([^']*)'|([^\s"'#]+))"#,
                regex::escape(key)
            );
            (*key, Regex::new(&pattern).unwrap())
        })
        .collect()
});

/// Raw values of the known settings found in `content`, in key order.
pub fn extract_settings(content: &str) -> Vec<(&'static str, String)> {
    SETTING_PATTERNS
        .iter()
        .filter_map(|(key, re)| {
            let caps = re.captures(content)?;
            let value = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))?
                .as_str()
                .to_string();
            Some((*key, value))
        })
        .collect()
}

/// Every candidate document under `roots`, roots first-to-last.
pub fn settings_candidates(roots: &[SearchRoot], log: &RunLog) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    for root in roots {
        match root.candidates() {
            Ok(found) => candidates.extend(found),
            Err(e) => log.warning(format!(
                "Skipping settings root {}: {}",
                root.dir.display(),
                e
            )),
        }
    }
    candidates
}

/// Build the run's [`GlobalConfig`]: defaults, overwritten by the first
/// candidate document that mentions any known setting.
///
/// Never fails. Unreadable candidates and invalid values are logged.
pub fn scan_global_settings(roots: &[SearchRoot], log: &RunLog) -> GlobalConfig {
    let mut config = GlobalConfig::default();

    for path in settings_candidates(roots, log) {
        let content = match read_document(&path) {
            Ok(content) => content,
            Err(e) => {
                log.warning(format!("Skipping settings candidate: {}", e));
                continue;
            }
        };

        let found = extract_settings(&content);
        if found.is_empty() {
            continue;
        }

        for (key, value) in &found {
            match config.apply(key, value) {
                Ok(()) => tracing::debug!(key, value = %value, "Applied global setting"),
                Err(e) => log.warning(format!(
                    "Ignoring setting '{}' in {}: {}",
                    key,
                    path.display(),
                    e
                )),
            }
        }
        log.info(format!(
            "Loaded {} global setting(s) from {}",
            found.len(),
            path.display()
        ));
        return config;
    }

    log.info("No global settings found, using defaults");
    config
}
