use std::fs;
use std::path::PathBuf;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::FlowcellError;

pub const PASSWORD_ENV: &str = "STATUSDB_PASSWORD";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub statusdb: StatusDbConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusDbConfig {
    pub url: String,
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default = "default_scheme")]
    pub scheme: String,
    #[serde(default = "default_view")]
    pub view: String,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<Config, FlowcellError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => default_config_path().ok_or(FlowcellError::MissingConfig)?,
        };

        if path.is_none() && !config_path.exists() {
            return Err(FlowcellError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| FlowcellError::ConfigRead(config_path.clone()))?;
        let config = Self::parse(&content)?;
        Ok(Self::apply_env(config, std::env::var(PASSWORD_ENV).ok()))
    }

    pub fn parse(content: &str) -> Result<Config, FlowcellError> {
        serde_yaml::from_str(content).map_err(|err| FlowcellError::ConfigParse(err.to_string()))
    }

    pub fn apply_env(mut config: Config, password: Option<String>) -> Config {
        if let Some(password) = password.filter(|value| !value.trim().is_empty()) {
            config.statusdb.password = password.trim().to_string();
        }
        config
    }
}

/// `~/opt/config/post_process.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| {
        dirs.home_dir()
            .join("opt")
            .join("config")
            .join("post_process.yaml")
    })
}

fn default_database() -> String {
    "x_flowcells".to_string()
}

fn default_scheme() -> String {
    "http".to_string()
}

fn default_view() -> String {
    "info/name".to_string()
}
