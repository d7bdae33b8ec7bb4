//! Wire protocol types for the chat stream.

use serde::Serialize;

/// One JSON event on the `/chat_stream` SSE response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireEvent {
    /// First event of a stream that minted a new session; carries the id
    /// the client must send on subsequent turns.
    Checkpoint { checkpoint_id: String },

    /// One increment of assistant text.
    Content { content: String },

    /// The model asked for a web search.
    SearchStart { query: String },

    /// The search finished; result URLs, in result order.
    SearchResults { urls: Vec<String> },

    /// The turn failed; the stream closes after this event.
    Error { message: String },

    /// Final event of a successful stream.
    End,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_events_serialize_to_the_documented_shapes() {
        let cases = [
            (
                WireEvent::Checkpoint {
                    checkpoint_id: "abc".to_string(),
                },
                r#"{"type":"checkpoint","checkpoint_id":"abc"}"#,
            ),
            (
                WireEvent::Content {
                    content: "hi".to_string(),
                },
                r#"{"type":"content","content":"hi"}"#,
            ),
            (
                WireEvent::SearchStart {
                    query: "weather".to_string(),
                },
                r#"{"type":"search_start","query":"weather"}"#,
            ),
            (
                WireEvent::SearchResults {
                    urls: vec!["https://a".to_string()],
                },
                r#"{"type":"search_results","urls":["https://a"]}"#,
            ),
            (WireEvent::End, r#"{"type":"end"}"#),
        ];
        for (event, expected) in cases {
            assert_eq!(
                serde_json::to_string(&event).expect("serialize"),
                expected
            );
        }
    }
}
