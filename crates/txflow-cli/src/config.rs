//! CLI settings

use std::path::Path;

use anyhow::Result;
use config::{Config, File};
use serde::{Deserialize, Serialize};
use txflow::StoreConfig;

/// Default database file name inside the work dir
pub const DEFAULT_DB_FILE: &str = "txflow.redb";

/// Default settings file name inside the work dir
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Database settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    /// Database file, relative to the work dir
    pub file_name: String,
}

impl Default for Database {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_DB_FILE.to_string(),
        }
    }
}

/// CLI settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Store settings
    #[serde(default)]
    pub store: StoreConfig,
    /// Database settings
    #[serde(default)]
    pub database: Database,
}

impl Settings {
    /// Load settings from `config_file` layered over the defaults.
    ///
    /// A missing file is not an error, the defaults are used as they are.
    pub fn new(config_file: &Path) -> Result<Self> {
        let default = Settings::default();

        let config = Config::builder()
            // use defaults
            .add_source(Config::try_from(&default)?)
            // override with file contents
            .add_source(File::from(config_file).required(false))
            .build()?;

        let settings: Settings = config.try_deserialize()?;

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use txflow::ExtraFlowPlacement;

    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::new(&dir.path().join(DEFAULT_CONFIG_FILE)).expect("settings");

        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(DEFAULT_CONFIG_FILE);
        fs::write(
            &path,
            r#"
[store]
max_flows_per_user = 20
extra_flow_placement = "append_to_parent"

[database]
file_name = "flows.redb"
"#,
        )
        .expect("write config");

        let settings = Settings::new(&path).expect("settings");

        assert_eq!(settings.store.max_flows_per_user, 20);
        assert_eq!(
            settings.store.extra_flow_placement,
            ExtraFlowPlacement::AppendToParent
        );
        assert_eq!(settings.store.max_chain_depth, StoreConfig::default().max_chain_depth);
        assert_eq!(settings.database.file_name, "flows.redb");
    }
}
