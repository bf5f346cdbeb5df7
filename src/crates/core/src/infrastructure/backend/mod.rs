//! Financial agent backend: HTTP client, reply types and SSE stream handling

pub mod client;
pub mod stream_handler;
pub mod types;

pub use client::{BackendClient, BackendClientConfig, BackendReply, ChatBackend, ChatCall};
pub use types::{split_chunks, BackendItem, ClientContext};
