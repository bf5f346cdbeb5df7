// nexus-agent Core Library - OpenBB Workspace copilot adapter for the viaNexus financial agent
// Four-layer architecture: Util -> Infrastructure -> Service -> Agentic

pub mod agentic; // Agentic layer - Widget retrieval, artifact translation, query pipeline
pub mod infrastructure; // Infrastructure layer - Backend HTTP client and SSE handling
pub mod service; // Service layer - Normalizer, config, widget catalog, sessions
pub mod util; // Utility layer - Wire types, errors

pub use nexus_agent_transport as transport;

// Export main types
pub use util::errors::*;
pub use util::types::*;

// Export service layer components
pub use service::{
    catalog::WidgetCatalog,
    config::NexusConfig,
    context::{AdapterContext, AdapterSettings},
    normalizer::{normalize, parse_query_request},
    session::SessionStore,
};

// Export infrastructure components
pub use infrastructure::backend::{BackendClient, ChatBackend};

// Export agentic core types
pub use agentic::pipeline::{EventStream, QueryPipeline, QueryRun, RunReport};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const CORE_NAME: &str = "nexus-agent Core";
