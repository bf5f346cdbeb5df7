pub mod artifact;
pub mod message;
pub mod request;
pub mod widget;

pub use artifact::*;
pub use message::*;
pub use request::*;
pub use widget::*;
