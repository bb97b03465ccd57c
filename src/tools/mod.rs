//! Tool system: the registry, the dispatcher and the built-in tools.

pub mod args;
pub mod builtin;
pub mod dispatcher;
pub mod registry;
pub mod traits;

pub use dispatcher::Dispatcher;
pub use registry::{ToolDescriptor, ToolRegistry};
pub use traits::{Tool, ToolContext, ToolDefinition};
