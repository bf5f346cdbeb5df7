//! Two-phase widget data retrieval
//!
//! Phase 1 asks the client for the data behind its primary widgets; Phase 2 folds
//! the client's reply into the backend's widget context and the final citations.

mod context;
mod coordinator;
mod phase2;

pub use context::format_widget_context;
pub use coordinator::{Phase2Outcome, RetrievalStart, RetrievalState, WidgetRetrievalCoordinator};
pub use phase2::{build_citations, extract_widget_results, source_refs, SourceRef, WidgetResult};
