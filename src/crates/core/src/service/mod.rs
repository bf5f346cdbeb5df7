//! Service layer - request normalization, configuration, catalog and sessions

pub mod catalog;
pub mod config;
pub mod context;
pub mod normalizer;
pub mod session;

pub use catalog::WidgetCatalog;
pub use config::NexusConfig;
pub use context::{AdapterContext, AdapterSettings};
pub use normalizer::{normalize, parse_query_request};
pub use session::SessionStore;
