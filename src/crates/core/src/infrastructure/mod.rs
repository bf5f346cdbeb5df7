//! Infrastructure layer - financial agent backend client

pub mod backend;

pub use backend::{BackendClient, BackendItem, BackendReply, ChatBackend, ChatCall, ClientContext};
