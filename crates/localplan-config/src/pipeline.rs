//! Pipeline document parsing.
//!
//! Azure Pipelines definitions scope variables to environments with
//! compile-time branch conditions:
//!
//! ```yaml
//! variables:
//!   - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/tst') }}:
//!     - name: ENVIRONMENT
//!       value: "test"
//! ```
//!
//! The document is not parsed as YAML. A line scanner walks it with three
//! states (outside, in the `variables:` section, in a conditional block) and
//! only recognizes the line shapes it needs.

use localplan_core::environment::{EnvironmentConfig, EnvironmentKey, EnvironmentMap};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const SUBSCRIPTION_ID_VAR: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENVIRONMENT_VAR: &str = "ENVIRONMENT";
pub const SERVICE_CONNECTION_VAR: &str = "SERVICE_CONNECTION";
pub const TEMPLATE_VAR: &str = "TEMPLATE";
pub const TEMPLATE_PARAMETERS_VAR: &str = "TEMPLATE_PARAMETERS";
pub const LOCATION_VAR: &str = "LOCATION";

/// Variables captured for one environment, by name.
pub type VariableSet = BTreeMap<String, String>;

static VARIABLES_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^variables:").unwrap());

static SECTION_CLOSER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:stages|jobs|steps|trigger|pr|pool|resources):").unwrap()
});

static TEMPLATE_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-\s*)?\$\{\{").unwrap());

static BLOCK_OPENER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:-\s*)?\$\{\{\s*if\s+eq\(\s*",
        r#"(?:variables\[\s*['"]Build\.SourceBranch['"]\s*\]|variables\.Build\.SourceBranch)"#,
        r#"\s*,\s*['"]([^'"]+)['"]\s*\)\s*\}\}\s*:\s*(?:#.*)?$"#,
    ))
    .unwrap()
});

static NAME_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-\s*)?name:\s*(.*?)\s*$").unwrap());

static VALUE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*value:\s*(.*?)\s*$").unwrap());

static KEY_VALUE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:-\s*)?([A-Za-z_][A-Za-z0-9_.\-]*)\s*:\s*(.*?)\s*$").unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum ScanState {
    Outside,
    InVariables,
    InBlock(EnvironmentKey),
}

/// Line scanner collecting branch-scoped variables.
#[derive(Debug)]
struct VariableScanner {
    state: ScanState,
    blocks: BTreeMap<EnvironmentKey, VariableSet>,
}

impl VariableScanner {
    fn new() -> Self {
        Self {
            state: ScanState::Outside,
            blocks: BTreeMap::new(),
        }
    }

    fn scan(mut self, content: &str) -> BTreeMap<EnvironmentKey, VariableSet> {
        let content = content.strip_prefix('\u{feff}').unwrap_or(content);
        let mut lines = content.lines().peekable();

        while let Some(line) = lines.next() {
            if VARIABLES_HEADER.is_match(line) {
                self.state = ScanState::InVariables;
                continue;
            }
            if SECTION_CLOSER.is_match(line) {
                self.state = ScanState::Outside;
                continue;
            }
            if self.state == ScanState::Outside || is_blank_or_comment(line) {
                continue;
            }

            if TEMPLATE_EXPRESSION.is_match(line) {
                self.state = match BLOCK_OPENER.captures(line) {
                    Some(caps) => {
                        let key = EnvironmentKey::from_branch(&caps[1]);
                        self.blocks.insert(key.clone(), VariableSet::new());
                        ScanState::InBlock(key)
                    }
                    // An unrecognized expression ends the current block.
                    None => ScanState::InVariables,
                };
                continue;
            }

            let key = match &self.state {
                ScanState::InBlock(key) => key.clone(),
                _ => continue,
            };

            if let Some(caps) = NAME_LINE.captures(line) {
                // A `name:` line only counts when `value:` follows directly.
                let next = lines.peek().copied();
                if let Some(value_caps) = next.and_then(|next| VALUE_LINE.captures(next)) {
                    let name = clean_value(&caps[1]);
                    let value = clean_value(&value_caps[1]);
                    lines.next();
                    if !name.is_empty() && !value.is_empty() {
                        self.assign(key, name, value);
                    }
                }
                continue;
            }

            if let Some(caps) = KEY_VALUE_LINE.captures(line) {
                let name = caps[1].to_string();
                let value = clean_value(&caps[2]);
                if name != "value" && !value.is_empty() {
                    self.assign(key, name, value);
                }
            }
        }

        self.blocks
    }

    fn assign(&mut self, key: EnvironmentKey, name: String, value: String) {
        // Later assignments of the same name replace earlier ones.
        self.blocks.entry(key).or_default().insert(name, value);
    }
}

fn is_blank_or_comment(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Trim a raw value, drop a trailing comment and one pair of surrounding quotes.
fn clean_value(raw: &str) -> String {
    let raw = raw.trim();

    for quote in ['"', '\''] {
        if let Some(rest) = raw.strip_prefix(quote) {
            if let Some(end) = rest.find(quote) {
                return rest[..end].to_string();
            }
        }
    }

    let uncommented = match raw.find(" #") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    uncommented.trim().to_string()
}

/// Collect the variables of every branch-scoped block, by environment.
pub fn scan_variables(content: &str) -> BTreeMap<EnvironmentKey, VariableSet> {
    VariableScanner::new().scan(content)
}

/// Resolve captured variables into a configuration, defaulting missing fields.
pub fn resolve_environment(key: &EnvironmentKey, vars: &VariableSet) -> EnvironmentConfig {
    let defaults = EnvironmentConfig::defaults_for(key);
    let pick = |name: &str, default: String| vars.get(name).cloned().unwrap_or(default);

    EnvironmentConfig {
        subscription_id: pick(SUBSCRIPTION_ID_VAR, defaults.subscription_id),
        environment: pick(ENVIRONMENT_VAR, defaults.environment),
        service_connection: pick(SERVICE_CONNECTION_VAR, defaults.service_connection),
        template: pick(TEMPLATE_VAR, defaults.template),
        template_parameters: pick(TEMPLATE_PARAMETERS_VAR, defaults.template_parameters),
        location: pick(LOCATION_VAR, defaults.location),
    }
}

/// Parse a pipeline document into per-environment configuration.
///
/// An empty map means the document has no usable environment blocks.
pub fn parse_document(content: &str) -> EnvironmentMap {
    scan_variables(content)
        .iter()
        .map(|(key, vars)| (key.clone(), resolve_environment(key, vars)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> EnvironmentKey {
        EnvironmentKey::from(s)
    }

    #[test]
    fn test_single_line_variables_with_defaults() {
        let doc = r#"
trigger:
  - main

variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
      TEMPLATE: "main.bicep"
      LOCATION: "westeurope"
      AZURE_SUBSCRIPTION_ID: "abc-123"

stages:
  - stage: Plan
"#;

        let envs = parse_document(doc);
        assert_eq!(envs.len(), 1);

        let dev = &envs[&key("dev")];
        assert_eq!(dev.template, "main.bicep");
        assert_eq!(dev.location, "westeurope");
        assert_eq!(dev.subscription_id, "abc-123");
        assert_eq!(dev.service_connection, "sc-dev");
        assert_eq!(dev.template_parameters, "dev.bicepparam");
        assert_eq!(dev.environment, "dev");
    }

    #[test]
    fn test_name_value_pairs() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/tst') }}:
    - name: ENVIRONMENT
      value: "test"
    - name: LOCATION
      value: "northeurope"
"#;

        let envs = parse_document(doc);
        let tst = &envs[&key("tst")];
        assert_eq!(
            *tst,
            EnvironmentConfig {
                subscription_id: String::new(),
                environment: "test".to_string(),
                service_connection: "sc-tst".to_string(),
                template: "main.bicep".to_string(),
                template_parameters: "tst.bicepparam".to_string(),
                location: "northeurope".to_string(),
            }
        );
    }

    #[test]
    fn test_multiple_blocks_are_separated() {
        let doc = r#"
variables:
  - name: shared
    value: ignored
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    - name: AZURE_SUBSCRIPTION_ID
      value: 'sub-dev'
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/prod') }}:
    - name: AZURE_SUBSCRIPTION_ID
      value: 'sub-prod'
    - name: SERVICE_CONNECTION
      value: sc-production
jobs:
  - job: build
    variables:
      LOCATION: eastus
"#;

        let scanned = scan_variables(doc);
        assert_eq!(scanned.len(), 2);
        assert!(!scanned[&key("dev")].contains_key("shared"));

        let envs = parse_document(doc);
        assert_eq!(envs[&key("dev")].subscription_id, "sub-dev");
        assert_eq!(envs[&key("dev")].service_connection, "sc-dev");
        assert_eq!(envs[&key("prod")].subscription_id, "sub-prod");
        assert_eq!(envs[&key("prod")].service_connection, "sc-production");
        assert_eq!(envs[&key("prod")].location, "westeurope");
    }

    #[test]
    fn test_no_variables_section_yields_nothing() {
        let doc = r#"
trigger:
  - main
stages:
  - stage: Build
    jobs:
      - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
        TEMPLATE: other.bicep
"#;
        assert!(parse_document(doc).is_empty());
    }

    #[test]
    fn test_duplicate_variable_last_write_wins() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    - name: LOCATION
      value: westeurope
    LOCATION: northeurope
"#;
        let envs = parse_document(doc);
        assert_eq!(envs[&key("dev")].location, "northeurope");
    }

    #[test]
    fn test_block_opener_with_trailing_comment() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    LOCATION: westus
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/prod') }}: # production
    - name: LOCATION
      value: northeurope
"#;
        let envs = parse_document(doc);
        assert_eq!(envs.len(), 2);
        assert_eq!(envs[&key("dev")].location, "westus");
        assert_eq!(envs[&key("prod")].location, "northeurope");
    }

    #[test]
    fn test_malformed_block_opener_is_not_recognized() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev' }}:
    - name: LOCATION
      value: northeurope
"#;
        assert!(scan_variables(doc).is_empty());
        assert!(parse_document(doc).is_empty());
    }

    #[test]
    fn test_malformed_opener_closes_previous_block() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    LOCATION: northeurope
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/uat' }}:
    TEMPLATE: uat.bicep
"#;
        let scanned = scan_variables(doc);
        assert_eq!(scanned.len(), 1);
        assert_eq!(scanned[&key("dev")].get("LOCATION").unwrap(), "northeurope");
        assert!(!scanned[&key("dev")].contains_key("TEMPLATE"));
    }

    #[test]
    fn test_section_closer_ends_block() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    LOCATION: northeurope
pool:
  vmImage: ubuntu-latest
  TEMPLATE: pool.bicep
"#;
        let envs = parse_document(doc);
        assert_eq!(envs[&key("dev")].template, "main.bicep");
    }

    #[test]
    fn test_indented_headers_do_not_change_state() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    steps: none
    LOCATION: northeurope
"#;
        let scanned = scan_variables(doc);
        assert_eq!(scanned[&key("dev")].get("steps").unwrap(), "none");
        assert_eq!(scanned[&key("dev")].get("LOCATION").unwrap(), "northeurope");
    }

    #[test]
    fn test_dangling_name_line_is_ignored() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    - name: LOCATION
    - name: TEMPLATE
      value: app.bicep
"#;
        let scanned = scan_variables(doc);
        let dev = &scanned[&key("dev")];
        assert_eq!(dev.len(), 1);
        assert_eq!(dev.get("TEMPLATE").unwrap(), "app.bicep");
    }

    #[test]
    fn test_branch_without_prefix_and_double_quotes() {
        let doc = "variables:\r\n  - ${{ if eq(variables[\"Build.SourceBranch\"], \"main\") }}:\r\n    LOCATION: 'swedencentral' # primary\r\n";
        let envs = parse_document(doc);
        assert_eq!(envs[&key("main")].location, "swedencentral");
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value(r#" "quoted" "#), "quoted");
        assert_eq!(clean_value("'single'"), "single");
        assert_eq!(clean_value("bare # comment"), "bare");
        assert_eq!(clean_value(r#""has # hash" # trailing"#), "has # hash");
        assert_eq!(clean_value(""), "");
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let doc = r#"
variables:
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/uat') }}:
    LOCATION: northeurope
  - ${{ if eq(variables['Build.SourceBranch'], 'refs/heads/dev') }}:
    LOCATION: westeurope
"#;
        let first = parse_document(doc);
        let second = parse_document(doc);
        assert_eq!(first, second);
        assert_eq!(format!("{:?}", first), format!("{:?}", second));
        let keys: Vec<_> = first.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["dev", "uat"]);
    }
}
