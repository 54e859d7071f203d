use log::warn;
use pdu_sequence::{ValidationPolicy, RANGE_TAGS};
use serde::{Deserialize, Deserializer};
use std::{fs::read_to_string, path::Path, str::FromStr};
use thiserror::Error;

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    #[serde(
        default = "default_loglevel",
        deserialize_with = "deserialize_loglevel"
    )]
    pub loglevel: log::LevelFilter,
    /// Check applied to each bind's `initial-value`.
    #[serde(default)]
    pub policy: ValidationPolicy,
    #[serde(default = "default_requests_per_bind")]
    pub requests_per_bind: u32,
    /// Number of tasks sharing one bind's sequence number generator.
    #[serde(default = "default_workers_per_bind")]
    pub workers_per_bind: u32,
    #[serde(default = "default_binds", rename = "bind")]
    pub binds: Vec<BindConfig>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct BindConfig {
    /// Start of the sequence, `DEFAULT_VALUE` when absent.
    #[serde(default)]
    pub initial_value: Option<u32>,
}

fn deserialize_loglevel<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let raw: String = Deserialize::deserialize(deserializer)?;
    log::LevelFilter::from_str(&raw)
        .map_err(|e| D::Error::custom(format!("Invalid loglevel: {}", e)))
}

impl Config {
    /// Parse config from file
    pub fn from_file(file: &Path) -> Result<Config, ConfigError> {
        let contents = read_to_string(file)?;
        contents.parse()
    }

    /// Warns about unreasonable config values
    pub fn warn_when_unreasonable(&self) {
        if self.binds.is_empty() {
            warn!("No binds configured.");
        }

        if self.binds.len() > RANGE_TAGS as usize {
            warn!(
                "More than {RANGE_TAGS} binds configured, range tags will be reused and responses \
                 can no longer be routed reliably."
            );
        }

        if self.requests_per_bind == 0 {
            warn!("No requests will be sent.");
        }

        if self.workers_per_bind == 0 {
            warn!("No workers per bind, no requests will be sent.");
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::de::from_str(s)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            loglevel: default_loglevel(),
            policy: ValidationPolicy::default(),
            requests_per_bind: default_requests_per_bind(),
            workers_per_bind: default_workers_per_bind(),
            binds: default_binds(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error while reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("config toml parsing error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn default_loglevel() -> log::LevelFilter {
    log::LevelFilter::Info
}

fn default_requests_per_bind() -> u32 {
    10_000
}

fn default_workers_per_bind() -> u32 {
    4
}

fn default_binds() -> Vec<BindConfig> {
    vec![BindConfig::default(); 4]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = "".parse().unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.policy, ValidationPolicy::Permissive);
        assert_eq!(config.binds.len(), 4);
    }

    #[test]
    fn full_config() {
        let config: Config = r#"
            loglevel = "debug"
            policy = "strict"
            requests-per-bind = 50
            workers-per-bind = 2

            [[bind]]

            [[bind]]
            initial-value = 268435455
        "#
        .parse()
        .unwrap();

        assert_eq!(config.loglevel, log::LevelFilter::Debug);
        assert_eq!(config.policy, ValidationPolicy::Strict);
        assert_eq!(config.requests_per_bind, 50);
        assert_eq!(config.workers_per_bind, 2);
        assert_eq!(
            config.binds,
            vec![
                BindConfig::default(),
                BindConfig {
                    initial_value: Some(0xFFFFFFF)
                }
            ]
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = "sequence-start = 1".parse::<Config>().unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn bad_loglevel_is_rejected() {
        let err = r#"loglevel = "loud""#.parse::<Config>().unwrap_err();
        assert!(err.to_string().contains("Invalid loglevel"));
    }

    #[test]
    fn bad_policy_is_rejected() {
        assert!(r#"policy = "lenient""#.parse::<Config>().is_err());
    }

    #[test]
    fn missing_file() {
        let err = Config::from_file(Path::new("/nonexistent/bind-host.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
