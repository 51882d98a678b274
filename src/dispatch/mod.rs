//! Event dispatch
//!
//! Post-commit routing of domain events to handlers.

mod dispatcher;
mod encoder_handler;

pub use dispatcher::{EventDispatcher, HandlerRegistry};
pub use encoder_handler::DispatchToEncoder;
