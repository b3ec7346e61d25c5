//! Capabilities advertised in the `initialize` result

use serde::{Deserialize, Serialize};

/// Only tools are offered; resources, prompts and logging are not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    pub tools: ToolsCapability,
}

impl ServerCapabilities {
    pub fn with_tools() -> Self {
        Self::default()
    }
}

/// Empty marker object. The tool set is fixed at startup, so `listChanged`
/// is never advertised.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsCapability {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tools_capability_serializes_empty() {
        let value = serde_json::to_value(ServerCapabilities::with_tools()).unwrap();
        assert_eq!(value, json!({ "tools": {} }));
    }
}
