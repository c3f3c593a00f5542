//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod executor;
pub mod registry;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use executor::{ToolExecutor, ToolOutcome};
pub use registry::{ToolFactory, ToolRegistry};
pub use tool::{FnTool, Tool, ToolContext, UserId};
pub use types::{ParameterBuilder, ToolDefinition, ToolParameters};
