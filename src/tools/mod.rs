//! Tool implementations available to the agent.

mod search;

pub use search::TavilySearch;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

/// A capability the model can invoke by name.
///
/// Argument shapes are not validated beyond what `execute` itself rejects;
/// malformed arguments surface as a handler error.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, as exposed to the model.
    fn name(&self) -> &str;

    /// Human-readable description for the model.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters_schema(&self) -> Value;

    /// Run the tool and return its payload.
    async fn execute(&self, args: Value) -> anyhow::Result<Value>;
}

/// Registry of available tools, built once at process start.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Look up a tool by name.
    pub fn resolve(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// All registered tools.
    pub fn list_tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    /// Tool definitions in the provider's function-calling format.
    pub fn schemas(&self) -> Vec<Value> {
        self.tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.parameters_schema(),
                    }
                })
            })
            .collect()
    }
}
