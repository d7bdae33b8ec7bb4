//! The `/chat_stream` endpoint: runs one agent turn and relays it as SSE.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use crate::agent::EngineEvent;
use crate::session::StoreError;

use super::types::WireEvent;
use super::AppState;

/// Query parameters for `GET /chat_stream`.
#[derive(Debug, Deserialize)]
pub struct ChatStreamParams {
    pub message: String,
    pub checkpoint_id: Option<Uuid>,
}

/// Translate one engine event into its wire representation.
///
/// The mapping is order-preserving and narrowing: a tool payload is reduced
/// to the URLs the client renders, everything else passes through 1:1.
pub fn to_wire(event: EngineEvent) -> WireEvent {
    match event {
        EngineEvent::TokenDelta { text } => WireEvent::Content { content: text },
        EngineEvent::ToolStart { arguments, .. } => WireEvent::SearchStart {
            query: arguments
                .get("query")
                .and_then(|q| q.as_str())
                .unwrap_or_default()
                .to_string(),
        },
        EngineEvent::ToolResult { payload, .. } => WireEvent::SearchResults {
            urls: extract_urls(&payload),
        },
        EngineEvent::TurnEnd => WireEvent::End,
        EngineEvent::Failed { message } => WireEvent::Error { message },
    }
}

/// URLs from the result items that carry a `url` field, in result order.
/// Items without one are dropped.
fn extract_urls(payload: &Value) -> Vec<String> {
    payload
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("url").and_then(|u| u.as_str()))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Run one turn and stream its events.
///
/// A request without a checkpoint id mints a new session and announces its
/// id as the first event. An unknown checkpoint id is rejected: sessions are
/// only ever minted by the server. A session with a turn already in flight
/// is rejected before any streaming begins.
pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ChatStreamParams>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, (StatusCode, String)> {
    let (session, minted) = match params.checkpoint_id {
        Some(id) => match state.store.get_session(id).await {
            Some(session) => (session, false),
            None => {
                return Err((
                    StatusCode::NOT_FOUND,
                    format!("unknown checkpoint id: {}", id),
                ))
            }
        },
        None => (state.store.create_session().await, true),
    };

    let (history, permit) = state.store.begin_turn(session.id).await.map_err(|e| match e {
        StoreError::SessionBusy(_) => (StatusCode::CONFLICT, e.to_string()),
        StoreError::UnknownSession(_) => (StatusCode::NOT_FOUND, e.to_string()),
    })?;

    tracing::info!(session_id = %session.id, new_session = minted, "Chat stream opened");

    let mut rx = state
        .engine
        .clone()
        .start_turn(permit, history, params.message);

    let checkpoint_id = session.id;
    let stream = async_stream::stream! {
        if minted {
            yield Ok(serialize_event(WireEvent::Checkpoint {
                checkpoint_id: checkpoint_id.to_string(),
            }));
        }
        while let Some(engine_event) = rx.recv().await {
            let last = matches!(
                engine_event,
                EngineEvent::TurnEnd | EngineEvent::Failed { .. }
            );
            yield Ok(serialize_event(to_wire(engine_event)));
            if last {
                break;
            }
        }
    };

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}

fn serialize_event(event: WireEvent) -> Event {
    match Event::default().json_data(&event) {
        Ok(sse) => sse,
        Err(e) => {
            // Unreachable for WireEvent, but never kill the stream over it.
            tracing::error!("Failed to serialize SSE event: {}", e);
            Event::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn engine_events_map_one_to_one_in_order() {
        let events = vec![
            EngineEvent::TokenDelta {
                text: "Hel".to_string(),
            },
            EngineEvent::TokenDelta {
                text: String::new(),
            },
            EngineEvent::ToolStart {
                tool_call_id: "call_1".to_string(),
                name: "web_search".to_string(),
                arguments: json!({ "query": "weather in Paris" }),
            },
            EngineEvent::ToolResult {
                tool_call_id: "call_1".to_string(),
                name: "web_search".to_string(),
                payload: json!([{ "url": "https://a" }]),
            },
            EngineEvent::TurnEnd,
        ];

        let wire: Vec<WireEvent> = events.into_iter().map(to_wire).collect();
        assert_eq!(
            wire,
            vec![
                WireEvent::Content {
                    content: "Hel".to_string()
                },
                // Empty increments are forwarded, not suppressed.
                WireEvent::Content {
                    content: String::new()
                },
                WireEvent::SearchStart {
                    query: "weather in Paris".to_string()
                },
                WireEvent::SearchResults {
                    urls: vec!["https://a".to_string()]
                },
                WireEvent::End,
            ]
        );
    }

    #[test]
    fn search_results_keep_order_and_drop_items_without_urls() {
        let payload = json!([
            { "title": "first", "url": "https://first.example" },
            { "title": "no url here" },
            { "title": "second", "url": "https://second.example" },
            "not even an object",
        ]);
        assert_eq!(
            extract_urls(&payload),
            vec![
                "https://first.example".to_string(),
                "https://second.example".to_string(),
            ]
        );
    }

    #[test]
    fn non_array_payloads_yield_no_urls() {
        assert!(extract_urls(&json!({ "error": "boom" })).is_empty());
        assert!(extract_urls(&json!("text")).is_empty());
    }

    #[test]
    fn failed_turns_map_to_an_error_event() {
        let wire = to_wire(EngineEvent::Failed {
            message: "model unreachable".to_string(),
        });
        assert_eq!(
            wire,
            WireEvent::Error {
                message: "model unreachable".to_string()
            }
        );
    }
}
