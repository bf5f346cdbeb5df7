//! Logging Configuration
//!
//! One `tracing-subscriber` fmt subscriber for the process. Records from the core
//! crates (`log` facade) reach it through the `tracing-log` bridge.

use anyhow::{anyhow, Result};
use nexus_agent_core::NexusConfig;
use tracing_subscriber::EnvFilter;

pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(log::LevelFilter::Trace),
        "debug" => Some(log::LevelFilter::Debug),
        "info" => Some(log::LevelFilter::Info),
        "warn" | "warning" => Some(log::LevelFilter::Warn),
        "error" | "critical" => Some(log::LevelFilter::Error),
        "off" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

pub fn level_to_str(level: log::LevelFilter) -> &'static str {
    match level {
        log::LevelFilter::Trace => "trace",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Off => "off",
    }
}

/// `log_level` as the default directive followed by one directive per module.
pub fn filter_directives(config: &NexusConfig) -> Result<String> {
    let root = parse_log_level(&config.log_level)
        .ok_or_else(|| anyhow!("Invalid log level '{}'", config.log_level))?;

    let mut directives = vec![level_to_str(root).to_string()];
    for (module, level) in config.module_levels()? {
        let level = parse_log_level(&level)
            .ok_or_else(|| anyhow!("Invalid log level '{}' for module '{}'", level, module))?;
        directives.push(format!("{}={}", module, level_to_str(level)));
    }
    Ok(directives.join(","))
}

/// `RUST_LOG`, when set, replaces the configured levels.
pub fn init_logging(config: &NexusConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(config)?)?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_combine_root_and_module_levels() {
        let config = NexusConfig {
            log_level: "DEBUG".to_string(),
            module_log_levels: "hyper:WARNING,reqwest:error".to_string(),
            ..NexusConfig::default()
        };
        assert_eq!(
            filter_directives(&config).unwrap(),
            "debug,hyper=warn,reqwest=error"
        );
    }

    #[test]
    fn unknown_level_is_rejected() {
        let config = NexusConfig {
            log_level: "loud".to_string(),
            ..NexusConfig::default()
        };
        assert!(filter_directives(&config).is_err());
    }
}
