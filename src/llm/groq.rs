//! Groq chat-completions client (OpenAI-compatible streaming API).

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest_eventsource::{Event, RequestBuilderExt};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::session::ToolCall;

use super::{ChatMessage, Completion, LlmClient, LlmError, LlmEvent};

const GROQ_API_URL: &str = "https://api.groq.com/openai/v1/chat/completions";

pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GroqClient {
    pub fn new(api_key: String, model: String, temperature: f32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            temperature,
        }
    }

    fn build_request_body(&self, messages: &[ChatMessage], tools: &[Value]) -> Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "stream": true,
        });
        if !tools.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                obj.insert("tools".to_string(), Value::Array(tools.to_vec()));
                obj.insert("tool_choice".to_string(), Value::String("auto".to_string()));
            }
        }
        body
    }
}

#[async_trait]
impl LlmClient for GroqClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        tools: &[Value],
    ) -> Result<BoxStream<'static, Result<LlmEvent, LlmError>>, LlmError> {
        let body = self.build_request_body(messages, tools);

        debug!(model = %self.model, messages = messages.len(), "Groq stream_chat");

        let request = self
            .client
            .post(GROQ_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body);
        let mut source = request
            .eventsource()
            .map_err(|e| LlmError::Stream(e.to_string()))?;

        let stream = async_stream::stream! {
            let mut acc = CompletionAccumulator::default();

            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => {}
                    Ok(Event::Message(message)) => {
                        if message.data == "[DONE]" {
                            source.close();
                            yield Ok(LlmEvent::Completed(acc.finish()));
                            break;
                        }
                        match serde_json::from_str::<StreamChunk>(&message.data) {
                            Ok(chunk) => {
                                if let Some(choice) = chunk.choices.into_iter().next() {
                                    if let Some(text) = choice.delta.content {
                                        acc.push_content(&text);
                                        yield Ok(LlmEvent::ContentDelta(text));
                                    }
                                    if let Some(fragments) = choice.delta.tool_calls {
                                        acc.push_tool_fragments(fragments);
                                    }
                                }
                            }
                            Err(e) => {
                                source.close();
                                yield Err(LlmError::Stream(format!(
                                    "unparseable stream chunk: {}",
                                    e
                                )));
                                break;
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => {
                        // Provider closed without [DONE]; treat what arrived
                        // as the complete response.
                        yield Ok(LlmEvent::Completed(acc.finish()));
                        break;
                    }
                    Err(reqwest_eventsource::Error::Transport(e)) => {
                        source.close();
                        yield Err(LlmError::Transport(e));
                        break;
                    }
                    Err(reqwest_eventsource::Error::InvalidStatusCode(status, response)) => {
                        let body = response.text().await.unwrap_or_default();
                        source.close();
                        yield Err(LlmError::Api {
                            status: status.as_u16(),
                            body,
                        });
                        break;
                    }
                    Err(e) => {
                        source.close();
                        yield Err(LlmError::Stream(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Assembles content and tool-call fragments spread across stream chunks.
#[derive(Debug, Default)]
struct CompletionAccumulator {
    content: String,
    tool_calls: Vec<PartialToolCall>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl CompletionAccumulator {
    fn push_content(&mut self, text: &str) {
        self.content.push_str(text);
    }

    fn push_tool_fragments(&mut self, fragments: Vec<ToolCallFragment>) {
        for fragment in fragments {
            if fragment.index >= self.tool_calls.len() {
                self.tool_calls
                    .resize_with(fragment.index + 1, PartialToolCall::default);
            }
            let slot = &mut self.tool_calls[fragment.index];
            if let Some(id) = fragment.id {
                slot.id = id;
            }
            if let Some(function) = fragment.function {
                if let Some(name) = function.name {
                    slot.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    slot.arguments.push_str(&arguments);
                }
            }
        }
    }

    fn finish(&mut self) -> Completion {
        let tool_calls = std::mem::take(&mut self.tool_calls)
            .into_iter()
            .filter(|call| !call.name.is_empty())
            .map(|call| ToolCall {
                id: if call.id.is_empty() {
                    Uuid::new_v4().to_string()
                } else {
                    call.id
                },
                name: call.name,
                arguments: serde_json::from_str(&call.arguments)
                    .unwrap_or(Value::String(call.arguments)),
            })
            .collect();
        Completion {
            content: std::mem::take(&mut self.content),
            tool_calls,
        }
    }
}

// Provider stream chunk types (internal)

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<ToolCallFragment>>,
}

#[derive(Debug, Deserialize)]
struct ToolCallFragment {
    index: usize,
    id: Option<String>,
    function: Option<FunctionFragment>,
}

#[derive(Debug, Deserialize)]
struct FunctionFragment {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fragment(index: usize, id: Option<&str>, name: Option<&str>, args: Option<&str>) -> ToolCallFragment {
        ToolCallFragment {
            index,
            id: id.map(str::to_string),
            function: Some(FunctionFragment {
                name: name.map(str::to_string),
                arguments: args.map(str::to_string),
            }),
        }
    }

    #[test]
    fn assembles_tool_call_split_across_chunks() {
        let mut acc = CompletionAccumulator::default();
        acc.push_tool_fragments(vec![fragment(0, Some("call_1"), Some("web_search"), Some(""))]);
        acc.push_tool_fragments(vec![fragment(0, None, None, Some("{\"query\":"))]);
        acc.push_tool_fragments(vec![fragment(0, None, None, Some("\"weather in Paris\"}"))]);

        let completion = acc.finish();
        assert_eq!(completion.tool_calls.len(), 1);
        let call = &completion.tool_calls[0];
        assert_eq!(call.id, "call_1");
        assert_eq!(call.name, "web_search");
        assert_eq!(call.arguments, json!({ "query": "weather in Paris" }));
    }

    #[test]
    fn interleaves_content_and_multiple_tool_calls() {
        let mut acc = CompletionAccumulator::default();
        acc.push_content("Let me check.");
        acc.push_tool_fragments(vec![
            fragment(0, Some("a"), Some("web_search"), Some("{\"query\":\"x\"}")),
            fragment(1, Some("b"), Some("web_search"), Some("{\"query\":\"y\"}")),
        ]);

        let completion = acc.finish();
        assert_eq!(completion.content, "Let me check.");
        assert_eq!(completion.tool_calls.len(), 2);
        assert_eq!(completion.tool_calls[0].id, "a");
        assert_eq!(completion.tool_calls[1].id, "b");
    }

    #[test]
    fn mints_an_id_when_the_provider_omits_one() {
        let mut acc = CompletionAccumulator::default();
        acc.push_tool_fragments(vec![fragment(0, None, Some("web_search"), Some("{}"))]);

        let completion = acc.finish();
        assert!(!completion.tool_calls[0].id.is_empty());
    }

    #[test]
    fn malformed_arguments_fall_back_to_the_raw_string() {
        let mut acc = CompletionAccumulator::default();
        acc.push_tool_fragments(vec![fragment(0, Some("c"), Some("web_search"), Some("{oops"))]);

        let completion = acc.finish();
        assert_eq!(completion.tool_calls[0].arguments, Value::String("{oops".to_string()));
    }

    #[test]
    fn nameless_slots_are_dropped() {
        // A fragment that only ever carried an id is not a usable call.
        let mut acc = CompletionAccumulator::default();
        acc.push_tool_fragments(vec![ToolCallFragment {
            index: 0,
            id: Some("orphan".to_string()),
            function: None,
        }]);

        assert!(acc.finish().tool_calls.is_empty());
    }

    #[test]
    fn request_body_omits_tools_when_none_are_registered() {
        let client = GroqClient::new("k".into(), "llama-3.3-70b-versatile".into(), 0.6);
        let body = client.build_request_body(&[ChatMessage::system("hi")], &[]);
        assert!(body.get("tools").is_none());
        assert_eq!(body["stream"], json!(true));

        let tools = vec![json!({ "type": "function", "function": { "name": "web_search" } })];
        let body = client.build_request_body(&[ChatMessage::system("hi")], &tools);
        assert_eq!(body["tool_choice"], json!("auto"));
        assert_eq!(body["tools"].as_array().map(Vec::len), Some(1));
    }
}
