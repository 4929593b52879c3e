use crate::models::{Action, ObjectFilter};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};
use std::fs;

pub const DEFAULT_PORT: u16 = 1433;

#[derive(Debug, Snafu)]
pub enum ConfigError {
    #[snafu(display("Failed to read config file: {}", source))]
    FileRead { source: std::io::Error },

    #[snafu(display("Failed to parse YAML config: {}", source))]
    YamlParse { source: serde_yaml::Error },

    #[snafu(display("Config file defines no targets"))]
    NoTargets,

    #[snafu(display("--execute only applies to the commands action (got {:?})", action))]
    ExecuteWithoutCommands { action: Action },
}

/// One database to inspect, plus what to do with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_true")]
    pub trust_cert: bool,
    #[serde(default)]
    pub encrypt: bool,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub action: Action,
    /// Run generated commands instead of only printing them
    #[serde(default)]
    pub execute: bool,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_true() -> bool {
    true
}

type Result<T, E = ConfigError> = std::result::Result<T, E>;

impl DbConfig {
    #[allow(clippy::too_many_arguments)]
    pub fn from_connection_params(
        host: String,
        port: u16,
        database: String,
        username: String,
        password: String,
        encrypt: bool,
        schema: Option<String>,
        table: Option<String>,
        action: Action,
        execute: bool,
    ) -> Result<Self> {
        let config = Self {
            host,
            port,
            database,
            username,
            password,
            trust_cert: true,
            encrypt,
            schema,
            table,
            action,
            execute,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_config_file(path: &str) -> Result<Vec<Self>> {
        let content = fs::read_to_string(path).context(FileReadSnafu)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Vec<Self>> {
        let configs: Vec<DbConfig> = serde_yaml::from_str(content).context(YamlParseSnafu)?;
        if configs.is_empty() {
            return NoTargetsSnafu.fail();
        }
        for config in &configs {
            config.validate()?;
        }
        Ok(configs)
    }

    pub fn filter(&self) -> ObjectFilter {
        ObjectFilter::new(self.schema.clone(), self.table.clone())
    }

    fn validate(&self) -> Result<()> {
        if self.execute && self.action != Action::Commands {
            return ExecuteWithoutCommandsSnafu {
                action: self.action,
            }
            .fail();
        }
        Ok(())
    }
}
