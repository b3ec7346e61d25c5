//! Tool descriptors, registry and dispatch

mod dispatcher;
mod registry;
mod schema;

pub use dispatcher::Dispatcher;
pub use registry::{Tool, ToolOutput, ToolRegistry};
pub use schema::{Field, ObjectSchema, Schema, ValidationError, ValidationIssue};
