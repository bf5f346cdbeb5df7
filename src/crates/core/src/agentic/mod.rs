//! Agentic layer - widget round trip, artifact translation and the query pipeline

pub mod artifacts;
pub mod commands;
pub mod pipeline;
pub mod widget_retrieval;

pub use artifacts::ArtifactTranslator;
pub use commands::ChatCommand;
pub use pipeline::{EventStream, QueryPipeline, QueryRun, RunReport};
pub use widget_retrieval::{RetrievalState, WidgetRetrievalCoordinator};
