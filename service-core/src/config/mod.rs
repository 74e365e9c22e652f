use crate::error::AppError;
use config::{Config as Cfg, File};
use serde::Deserialize;

/// Settings every service binary shares: the listen port and the
/// deployment environment.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// "dev" or "prod". Production requires explicit values for settings
    /// that only have development defaults.
    #[serde(default = "default_environment")]
    pub environment: String,
}

fn default_port() -> u16 {
    8080
}

fn default_environment() -> String {
    "dev".to_string()
}

impl Config {
    pub fn is_prod(&self) -> bool {
        self.environment == "prod"
    }

    pub fn load() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();

        let config = Cfg::builder()
            .add_source(File::with_name("configuration").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let mut config: Config = config.try_deserialize()?;

        // The bare ENVIRONMENT variable is what deploy tooling sets
        if let Ok(env) = std::env::var("ENVIRONMENT") {
            config.environment = env;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_is_not_prod() {
        let config = Config {
            port: 8080,
            environment: "dev".to_string(),
        };
        assert!(!config.is_prod());
    }

    #[test]
    fn prod_is_prod() {
        let config = Config {
            port: 8080,
            environment: "prod".to_string(),
        };
        assert!(config.is_prod());
    }
}
