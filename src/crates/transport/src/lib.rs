pub mod emitter;
/// nexus-agent Transport Layer
///
/// Client-facing side of the adapter:
/// - internal stream events produced by the pipeline
/// - OpenBB copilot wire events (`copilotMessageChunk`, `copilotFunctionCall`, ...)
/// - the per-request stream emitter that serializes them as SSE frames
pub mod events;

pub use emitter::{EmitError, StreamEmitter};
pub use events::{
    ChartPayload, Citation, CitationSource, OutboundEvent, SseFrame, StatusLevel, StreamEvent,
    TablePayload, WidgetDataSource,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
