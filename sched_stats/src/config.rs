use config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
};

use crate::defaults;

/// File names and parameter keys used to read experiment directories.
///
/// Built once at startup from the hierarchical configuration and passed to
/// every parsing function.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParseConfig {
    pub files: FilesConfig,
    pub params: ParamKeys,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FilesConfig {
    pub params_file: String,
    pub sched_file: String,
    pub masters_file: String,
    pub nodes_file: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ParamKeys {
    pub utilization_key: String,
    pub cap_key: String,
}

impl Default for ParseConfig {
    fn default() -> Self {
        ParseConfig {
            files: FilesConfig {
                params_file: defaults::DEFAULT_PARAMS_FILE.to_string(),
                sched_file: defaults::DEFAULT_SCHED_FILE.to_string(),
                masters_file: defaults::DEFAULT_MASTERS_FILE.to_string(),
                nodes_file: defaults::DEFAULT_NODES_FILE.to_string(),
            },
            params: ParamKeys {
                utilization_key: defaults::DEFAULT_UTILIZATION_KEY.to_string(),
                cap_key: defaults::DEFAULT_CAP_KEY.to_string(),
            },
        }
    }
}

impl ParseConfig {
    /// Load from the system config and the nearest local config.
    pub fn load() -> Result<Self, ConfigError> {
        parse_config_from(read_hierarchical_config()?)
    }
}

fn system_config_path() -> Option<PathBuf> {
    if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
        Some(
            Path::new(&xdg_config_home)
                .join(defaults::SYSTEM_CONFIG_DIR)
                .join("config.toml"),
        )
    } else {
        dirs_next::home_dir().map(|home| {
            home.join(".config")
                .join(defaults::SYSTEM_CONFIG_DIR)
                .join("config.toml")
        })
    }
}

fn find_local_config_path() -> Option<PathBuf> {
    let mut current_dir = env::current_dir().ok()?;
    loop {
        let candidate = current_dir.join(defaults::LOCAL_CONFIG_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !current_dir.pop() {
            return None;
        }
    }
}

/// Read hierarchical configuration (system -> local override)
pub fn read_hierarchical_config() -> Result<Config, ConfigError> {
    let mut builder = Config::builder();

    // 1. System-wide config (XDG_CONFIG_HOME or ~/.config/sched-stats/config.toml)
    if let Some(system_config_path) = system_config_path() {
        builder = builder.add_source(
            File::from(system_config_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    // 2. Local config (.schedstatsconfig) - this overrides system config
    if let Some(local_path) = find_local_config_path() {
        log::debug!("using local config {}", local_path.display());
        builder = builder.add_source(
            File::from(local_path)
                .format(FileFormat::Toml)
                .required(false),
        );
    }

    builder.build()
}

/// Fill every unset key with its default and deserialize.
pub fn parse_config_from(config: Config) -> Result<ParseConfig, ConfigError> {
    let d = ParseConfig::default();
    Config::builder()
        .set_default("files.params_file", d.files.params_file)?
        .set_default("files.sched_file", d.files.sched_file)?
        .set_default("files.masters_file", d.files.masters_file)?
        .set_default("files.nodes_file", d.files.nodes_file)?
        .set_default("params.utilization_key", d.params.utilization_key)?
        .set_default("params.cap_key", d.params.cap_key)?
        .add_source(config)
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod test {
    use super::*;

    fn from_toml(content: &str) -> Result<ParseConfig, ConfigError> {
        let config = Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;
        parse_config_from(config)
    }

    #[test]
    fn test_defaults_without_any_source() {
        let parsed = from_toml("").unwrap();
        assert_eq!(parsed, ParseConfig::default());
        assert_eq!(parsed.files.nodes_file, "nodes.json");
        assert_eq!(parsed.params.cap_key, "mutils");
    }

    #[test]
    fn test_partial_override() {
        let parsed = from_toml(
            r#"
[files]
params_file = "params.toml"

[params]
cap_key = "ucap"
"#,
        )
        .unwrap();
        assert_eq!(parsed.files.params_file, "params.toml");
        assert_eq!(parsed.files.sched_file, "sched.csv");
        assert_eq!(parsed.params.cap_key, "ucap");
        assert_eq!(parsed.params.utilization_key, "autils");
    }

    #[test]
    fn test_invalid_type_is_rejected() {
        assert!(from_toml("files = 3").is_err());
    }
}
