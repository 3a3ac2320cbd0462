use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// What the reconciliation phase does when a `composite` reference cannot be
/// honoured (missing member, missing group, group that cannot hold members).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GroupFailurePolicy {
    /// Report a diagnostic and keep going with the next record.
    #[default]
    Isolate,
    /// Stop the group pass and fail the whole load.
    Abort,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReaderConfig {
    /// Retry records whose endpoint nodes are declared later in the document.
    pub defer_forward_references: bool,
    pub group_failures: GroupFailurePolicy,
    /// Extra type names accepted by the registry, mapped to a registered name.
    pub type_aliases: BTreeMap<String, String>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            defer_forward_references: true,
            group_failures: GroupFailurePolicy::Isolate,
            type_aliases: BTreeMap::new(),
        }
    }
}

impl ReaderConfig {
    /// First-pass-only resolution and fail-fast group restore.
    pub fn strict() -> Self {
        Self {
            defer_forward_references: false,
            group_failures: GroupFailurePolicy::Abort,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CrossingConfig {
    pub enabled: bool,
    /// Lines meeting at a shared port do not count as crossing there.
    pub ignore_shared_endpoints: bool,
}

impl Default for CrossingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ignore_shared_endpoints: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub reader: ReaderConfig,
    pub crossing: CrossingConfig,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };

    let contents = std::fs::read_to_string(path)?;
    let config = match serde_json::from_str::<Config>(&contents) {
        Ok(config) => config,
        Err(strict) => json5::from_str::<Config>(&contents).map_err(|_| strict)?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_path_yields_defaults() {
        let config = load_config(None).unwrap();
        assert!(config.reader.defer_forward_references);
        assert_eq!(config.reader.group_failures, GroupFailurePolicy::Isolate);
        assert!(config.crossing.enabled);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"reader": {{"groupFailures": "abort", "typeAliases": {{"Ellipse": "Oval"}}}}}}"#
        )
        .unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.reader.group_failures, GroupFailurePolicy::Abort);
        assert!(config.reader.defer_forward_references);
        assert_eq!(config.reader.type_aliases.get("Ellipse").map(String::as_str), Some("Oval"));
        assert!(config.crossing.ignore_shared_endpoints);
    }

    #[test]
    fn json5_config_is_accepted() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ crossing: {{ enabled: false, }}, }}").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert!(!config.crossing.enabled);
    }

    #[test]
    fn unreadable_config_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2").unwrap();
        assert!(load_config(Some(file.path())).is_err());
    }
}
