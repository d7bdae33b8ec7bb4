//! Internal engine events, consumed once by the stream adapter.

use serde_json::Value;

/// Events produced by one engine turn, in emission order.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A partial increment of assistant text. May be empty.
    TokenDelta { text: String },
    /// A tool invocation is about to run.
    ToolStart {
        tool_call_id: String,
        name: String,
        arguments: Value,
    },
    /// A tool invocation finished (success, or a failure converted into an
    /// error payload).
    ToolResult {
        tool_call_id: String,
        name: String,
        payload: Value,
    },
    /// The turn completed and its history was committed.
    TurnEnd,
    /// The turn failed; nothing was committed.
    Failed { message: String },
}
