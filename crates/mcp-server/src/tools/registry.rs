//! Tool definitions and the ordered tool registry

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::schema::ObjectSchema;
use crate::error::{RegistryError, ToolError, ToolResult};

/// Value returned by a tool handler
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    /// Passed through to the client verbatim
    Text(String),
    /// Pretty-printed before being sent
    Json(Value),
}

impl From<Value> for ToolOutput {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<String> for ToolOutput {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolOutput {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, ToolResult<ToolOutput>> + Send + Sync>;

/// A named, schema-validated operation
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    schema: ObjectSchema,
    mutating: bool,
    handler: Handler,
}

impl Tool {
    /// Create a tool whose handler receives typed arguments.
    ///
    /// Arguments are deserialized from the already validated and defaulted
    /// JSON value, so `A` must agree with `schema`.
    pub fn new<A, F, Fut, O>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: ObjectSchema,
        handler: F,
    ) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<O>> + Send + 'static,
        O: Into<ToolOutput>,
    {
        let handler = Arc::new(handler);
        let handler: Handler = Arc::new(move |args: Value| {
            let handler = handler.clone();
            async move {
                let args: A = serde_json::from_value(args).map_err(|e| {
                    ToolError::Unexpected(format!("Failed to decode validated arguments: {}", e))
                })?;
                let output = handler(args).await?;
                Ok::<ToolOutput, ToolError>(output.into())
            }
            .boxed()
        });

        Self {
            name: name.into(),
            description: description.into(),
            schema,
            mutating: false,
            handler,
        }
    }

    /// Mark this tool as changing state on the custody platform
    pub fn mutating(mut self) -> Self {
        self.mutating = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn schema(&self) -> &ObjectSchema {
        &self.schema
    }

    pub fn is_mutating(&self) -> bool {
        self.mutating
    }

    /// Run the handler with arguments that already passed validation
    pub fn invoke(&self, args: Value) -> BoxFuture<'static, ToolResult<ToolOutput>> {
        (self.handler)(args)
    }
}

impl std::fmt::Debug for Tool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("mutating", &self.mutating)
            .finish_non_exhaustive()
    }
}

/// Ordered, append-only collection of tools
#[derive(Debug, Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append tools in order.
    ///
    /// Fails without registering anything if a name is already taken or
    /// repeated within `tools`.
    pub fn register(&mut self, tools: Vec<Tool>) -> Result<(), RegistryError> {
        let mut seen: HashSet<&str> = self.tools.iter().map(Tool::name).collect();
        for tool in &tools {
            if !seen.insert(tool.name()) {
                return Err(RegistryError::DuplicateTool(tool.name().to_string()));
            }
        }

        self.tools.extend(tools);
        Ok(())
    }

    /// All tools in registration order
    pub fn list(&self) -> &[Tool] {
        &self.tools
    }

    /// Look up a tool by exact name
    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Deserialize)]
    struct EchoArgs {
        message: String,
    }

    fn echo(name: &str) -> Tool {
        Tool::new(name, "Echo", ObjectSchema::strict(), |args: EchoArgs| async move {
            Ok::<_, ToolError>(args.message)
        })
    }

    #[test]
    fn test_register_preserves_order() {
        let mut registry = ToolRegistry::new();
        registry.register(vec![echo("b"), echo("a")]).unwrap();
        registry.register(vec![echo("c")]).unwrap();

        let names: Vec<&str> = registry.list().iter().map(Tool::name).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = ToolRegistry::new();
        registry.register(vec![echo("a")]).unwrap();

        let err = registry.register(vec![echo("b"), echo("a")]).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("a".to_string()));
        assert_eq!(registry.len(), 1);

        let err = ToolRegistry::new()
            .register(vec![echo("x"), echo("x")])
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateTool("x".to_string()));
    }

    #[test]
    fn test_get_by_exact_name() {
        let mut registry = ToolRegistry::new();
        registry.register(vec![echo("get_users")]).unwrap();
        assert!(registry.get("get_users").is_some());
        assert!(registry.get("get_user").is_none());
    }

    #[tokio::test]
    async fn test_invoke_typed_handler() {
        let tool = echo("echo");
        let output = tool.invoke(json!({ "message": "hi" })).await.unwrap();
        assert_eq!(output, ToolOutput::Text("hi".to_string()));
    }

    #[test]
    fn test_mutating_flag() {
        assert!(!echo("a").is_mutating());
        assert!(echo("a").mutating().is_mutating());
    }
}
