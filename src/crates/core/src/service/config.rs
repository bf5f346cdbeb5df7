//! Adapter configuration
//!
//! Loaded once at startup: built-in defaults, then an optional TOML file named by
//! `NEXUS_AGENT_CONFIG`, then environment variables.

use crate::util::errors::{NexusError, NexusResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "NEXUS_AGENT_CONFIG";

const DEFAULT_CORS_ORIGINS: [&str; 3] = [
    "https://pro.openbb.co",
    "https://pro.openbb.dev",
    "http://localhost:1420",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NexusConfig {
    /// Base URL of the financial chat agent backend
    pub financial_agent_url: String,
    /// Display name for OpenBB agent discovery
    pub agent_name: String,
    pub agent_description: String,
    /// development / production
    pub environment: String,
    pub host: String,
    pub port: u16,
    pub backend_timeout_secs: u64,
    /// Longest allowed gap between two streamed backend items
    pub stream_idle_timeout_secs: u64,
    /// Bound on the in-process wait for a Phase-2 widget data reply
    pub phase2_timeout_secs: u64,
    /// Characters per message chunk when the backend answers with one JSON document
    pub chunk_size: usize,
    pub client_context_type: String,
    pub capabilities: Vec<String>,
    pub widgets_path: Option<PathBuf>,
    pub apps_path: Option<PathBuf>,
    pub cors_origins: Vec<String>,
    pub log_level: String,
    /// Comma-separated `module:level` pairs, e.g. `hyper:warn,reqwest:warn`
    pub module_log_levels: String,
}

impl Default for NexusConfig {
    fn default() -> Self {
        Self {
            financial_agent_url: "http://localhost:8000".to_string(),
            agent_name: "viaNexus Financial Agent".to_string(),
            agent_description: "A financial assistant powered by viaNexus with access to market data, analytics, and visualization capabilities.".to_string(),
            environment: "production".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8001,
            backend_timeout_secs: 300,
            stream_idle_timeout_secs: 600,
            phase2_timeout_secs: 30,
            chunk_size: 100,
            client_context_type: "openbb".to_string(),
            capabilities: vec![
                "charts".to_string(),
                "tables".to_string(),
                "widgets".to_string(),
            ],
            widgets_path: None,
            apps_path: None,
            cors_origins: DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect(),
            log_level: "info".to_string(),
            module_log_levels: "hyper:warn,reqwest:warn".to_string(),
        }
    }
}

impl NexusConfig {
    /// Defaults + optional file + process environment.
    pub fn load() -> NexusResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        info!(
            "Configuration loaded: backend={}, environment={}, listen={}:{}",
            config.financial_agent_url, config.environment, config.host, config.port
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> NexusResult<Self> {
        debug!("Reading configuration file: {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> NexusResult<Self> {
        toml::from_str(raw).map_err(|e| NexusError::config(format!("Invalid config file: {}", e)))
    }

    /// Applies environment overrides through `lookup` so tests can supply their own map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> NexusResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(value) = get("FINANCIAL_AGENT_URL") {
            self.financial_agent_url = value;
        }
        if let Some(value) = get("AGENT_NAME") {
            self.agent_name = value;
        }
        if let Some(value) = get("AGENT_DESCRIPTION") {
            self.agent_description = value;
        }
        if let Some(value) = get("ENVIRONMENT") {
            self.environment = value;
        }
        if let Some(value) = get("HOST") {
            self.host = value;
        }
        if let Some(value) = get("PORT") {
            self.port = parse_number("PORT", &value)?;
        }
        if let Some(value) = get("BACKEND_TIMEOUT_SECS") {
            self.backend_timeout_secs = parse_number("BACKEND_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("STREAM_IDLE_TIMEOUT_SECS") {
            self.stream_idle_timeout_secs = parse_number("STREAM_IDLE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("CHUNK_SIZE") {
            self.chunk_size = parse_number("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = get("PHASE2_TIMEOUT_SECS") {
            self.phase2_timeout_secs = parse_number("PHASE2_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = get("WIDGETS_PATH") {
            self.widgets_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get("APPS_PATH") {
            self.apps_path = Some(PathBuf::from(value));
        }
        if let Some(value) = get("CORS_ORIGINS") {
            self.cors_origins = value
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.log_level = value;
        }
        if let Some(value) = get("MODULE_LOG_LEVELS") {
            self.module_log_levels = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> NexusResult<()> {
        if !self.financial_agent_url.starts_with("http://")
            && !self.financial_agent_url.starts_with("https://")
        {
            return Err(NexusError::config(format!(
                "financial_agent_url must be an http(s) URL, got '{}'",
                self.financial_agent_url
            )));
        }
        if self.chunk_size == 0 {
            return Err(NexusError::config("chunk_size must be greater than zero"));
        }
        if self.backend_timeout_secs == 0 {
            return Err(NexusError::config(
                "backend_timeout_secs must be greater than zero",
            ));
        }
        self.module_levels()?;
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }

    pub fn phase2_timeout(&self) -> Duration {
        Duration::from_secs(self.phase2_timeout_secs)
    }

    /// Parses `module_log_levels` into `(module, level)` pairs with lowercase levels.
    pub fn module_levels(&self) -> NexusResult<Vec<(String, String)>> {
        self.module_log_levels
            .split(',')
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (module, level) = pair.split_once(':').ok_or_else(|| {
                    NexusError::config(format!(
                        "module_log_levels entry '{}' is not module:level",
                        pair
                    ))
                })?;
                let level = level.trim().to_lowercase();
                let level = if level == "warning" {
                    "warn".to_string()
                } else {
                    level
                };
                Ok((module.trim().to_string(), level))
            })
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> NexusResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| NexusError::config(format!("{} must be a number, got '{}'", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn file_values_are_layered_under_environment() {
        let mut config = NexusConfig::from_toml_str(
            r#"
            financial_agent_url = "http://agent.internal:9000"
            port = 9100
            chunk_size = 50
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            ("PORT", "8200"),
            ("MODULE_LOG_LEVELS", "hyper:WARNING, tower_http:debug"),
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
        ]
        .into_iter()
        .collect();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.financial_agent_url, "http://agent.internal:9000");
        assert_eq!(config.port, 8200);
        assert_eq!(config.chunk_size, 50);
        assert_eq!(config.agent_name, "viaNexus Financial Agent");
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(
            config.module_levels().unwrap(),
            vec![
                ("hyper".to_string(), "warn".to_string()),
                ("tower_http".to_string(), "debug".to_string())
            ]
        );
        config.validate().unwrap();
    }

    #[test]
    fn streaming_knobs_have_environment_overrides() {
        let mut config = NexusConfig::from_toml_str("chunk_size = 50").unwrap();
        let env: HashMap<&str, &str> = [("STREAM_IDLE_TIMEOUT_SECS", "45"), ("CHUNK_SIZE", "20")]
            .into_iter()
            .collect();
        config
            .apply_env_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.stream_idle_timeout(), Duration::from_secs(45));
        assert_eq!(config.chunk_size, 20);

        let result =
            config.apply_env_overrides(|key| (key == "CHUNK_SIZE").then(|| "big".to_string()));
        assert!(matches!(result, Err(NexusError::Config(_))));
    }

    #[test]
    fn bad_values_are_config_errors() {
        let mut config = NexusConfig::default();
        let result = config.apply_env_overrides(|key| (key == "PORT").then(|| "eighty".to_string()));
        assert!(matches!(result, Err(NexusError::Config(_))));

        let config = NexusConfig {
            financial_agent_url: "ftp://nope".to_string(),
            ..NexusConfig::default()
        };
        assert!(config.validate().is_err());

        let config = NexusConfig {
            module_log_levels: "hyper".to_string(),
            ..NexusConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
