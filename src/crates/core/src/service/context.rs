//! Process-wide, read-only adapter context handed to every pipeline run.

use super::catalog::WidgetCatalog;
use super::config::NexusConfig;
use crate::infrastructure::backend::ClientContext;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    /// Tool-category tag attached to every backend call
    pub client_context: ClientContext,
    pub phase2_timeout: Duration,
    /// Frames buffered between the pipeline task and the HTTP body
    pub channel_capacity: usize,
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            client_context: ClientContext::openbb(),
            phase2_timeout: Duration::from_secs(30),
            channel_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    pub settings: AdapterSettings,
    pub catalog: WidgetCatalog,
}

impl AdapterContext {
    pub fn new(settings: AdapterSettings, catalog: WidgetCatalog) -> Self {
        Self { settings, catalog }
    }

    pub fn from_config(config: &NexusConfig, catalog: WidgetCatalog) -> Self {
        let settings = AdapterSettings {
            client_context: ClientContext::new(
                config.client_context_type.clone(),
                config.capabilities.clone(),
            ),
            phase2_timeout: config.phase2_timeout(),
            ..AdapterSettings::default()
        };
        Self::new(settings, catalog)
    }
}
