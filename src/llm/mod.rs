//! Model provider client: OpenAI-compatible streaming chat completions.

mod groq;

pub use groq::GroqClient;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::session::{Message, ToolCall};

/// Role of a chat message in provider wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A tool call in provider wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, exactly as the provider exchanges them.
    pub arguments: String,
}

/// One message in provider wire format.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ProviderToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(text.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Convert a stored history message into provider wire format.
    pub fn from_history(message: &Message) -> Self {
        match message {
            Message::User { text } => Self {
                role: Role::User,
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            },
            Message::Assistant { text, tool_calls } => Self {
                role: Role::Assistant,
                content: if text.is_empty() {
                    None
                } else {
                    Some(text.clone())
                },
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        tool_calls
                            .iter()
                            .map(|tc| ProviderToolCall {
                                id: tc.id.clone(),
                                kind: "function".to_string(),
                                function: FunctionCall {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.to_string(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: None,
            },
            Message::ToolResult {
                tool_call_id,
                tool_name: _,
                payload,
            } => Self {
                role: Role::Tool,
                content: Some(payload.to_string()),
                tool_calls: None,
                tool_call_id: Some(tool_call_id.clone()),
            },
        }
    }
}

/// The fully assembled output of one completion call.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

/// Incremental output from a streaming completion call.
#[derive(Debug, Clone)]
pub enum LlmEvent {
    /// A partial content increment. May be empty.
    ContentDelta(String),
    /// The assembled message, yielded once after the provider stream ends.
    Completed(Completion),
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("model request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("model stream failed: {0}")]
    Stream(String),

    #[error("model returned status {status}: {body}")]
    Api { status: u16, body: String },
}

/// A streaming chat-completion provider.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Start a streaming completion over the full conversation.
    ///
    /// The returned stream yields zero or more `ContentDelta` items followed
    /// by exactly one `Completed` item, unless it fails first.
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<BoxStream<'static, Result<LlmEvent, LlmError>>, LlmError>;
}
