//! Core engine implementation: the Invoking/Dispatching turn loop.

use std::sync::Arc;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::llm::{ChatMessage, LlmClient, LlmEvent};
use crate::session::{Message, SessionStore, ToolCall, TurnPermit};
use crate::tools::ToolRegistry;

use super::events::EngineEvent;
use super::prompt::build_system_prompt;

/// Capacity of the engine-to-adapter event channel. Bounded so a slow
/// consumer applies backpressure to the model stream.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Why a turn ended without reaching its final response.
enum TurnAbort {
    /// The event receiver was dropped (client disconnected).
    Disconnected,
    /// Fatal failure: model unreachable, broken stream, or round limit hit.
    Failed(String),
}

/// The turn-taking state machine.
pub struct AgentEngine {
    llm: Arc<dyn LlmClient>,
    tools: Arc<ToolRegistry>,
    store: Arc<dyn SessionStore>,
    max_tool_rounds: usize,
}

impl AgentEngine {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolRegistry>,
        store: Arc<dyn SessionStore>,
        max_tool_rounds: usize,
    ) -> Self {
        Self {
            llm,
            tools,
            store,
            max_tool_rounds,
        }
    }

    /// Start one turn against the session claimed by `permit`.
    ///
    /// The turn runs in a spawned task; the returned receiver yields its
    /// events in order, ending with `TurnEnd` or `Failed`. Dropping the
    /// receiver abandons the turn without committing anything.
    pub fn start_turn(
        self: Arc<Self>,
        permit: TurnPermit,
        history: Vec<Message>,
        user_message: String,
    ) -> mpsc::Receiver<EngineEvent> {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            self.run_turn(permit, history, user_message, tx).await;
        });
        rx
    }

    async fn run_turn(
        &self,
        permit: TurnPermit,
        mut history: Vec<Message>,
        user_message: String,
        tx: mpsc::Sender<EngineEvent>,
    ) {
        let session_id = permit.session_id();
        let pre_turn_len = history.len();
        history.push(Message::User { text: user_message });

        match self.drive(&mut history, &tx).await {
            Ok(()) => {
                // Commit everything this turn produced in one append, then
                // signal the end of the stream.
                let turn_messages = history.split_off(pre_turn_len);
                if let Err(e) = self.store.commit_turn(permit, turn_messages).await {
                    tracing::error!(session_id = %session_id, "Failed to commit turn: {}", e);
                    let _ = tx
                        .send(EngineEvent::Failed {
                            message: e.to_string(),
                        })
                        .await;
                    return;
                }
                let _ = tx.send(EngineEvent::TurnEnd).await;
            }
            Err(TurnAbort::Disconnected) => {
                tracing::debug!(session_id = %session_id, "Turn abandoned, client disconnected");
            }
            Err(TurnAbort::Failed(message)) => {
                tracing::error!(session_id = %session_id, "Turn failed: {}", message);
                let _ = tx.send(EngineEvent::Failed { message }).await;
            }
        }
        // On the non-commit paths the permit drops here, releasing the
        // session with its stored history unchanged.
    }

    /// The Invoking/Dispatching loop over the working history.
    async fn drive(
        &self,
        history: &mut Vec<Message>,
        tx: &mpsc::Sender<EngineEvent>,
    ) -> Result<(), TurnAbort> {
        let system_prompt = build_system_prompt(&self.tools);
        let tool_schemas = self.tools.schemas();

        let mut round = 0;
        loop {
            // Invoking: stream the next model response over the full
            // history. The system prompt is prepended per call and never
            // stored.
            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(ChatMessage::system(system_prompt.clone()));
            messages.extend(history.iter().map(ChatMessage::from_history));

            let mut stream = self
                .llm
                .stream_chat(&messages, &tool_schemas)
                .await
                .map_err(|e| TurnAbort::Failed(e.to_string()))?;

            let mut completion = None;
            while let Some(event) = stream.next().await {
                match event {
                    Ok(LlmEvent::ContentDelta(text)) => {
                        send(tx, EngineEvent::TokenDelta { text }).await?;
                    }
                    Ok(LlmEvent::Completed(c)) => completion = Some(c),
                    Err(e) => return Err(TurnAbort::Failed(e.to_string())),
                }
            }
            let completion = completion.ok_or_else(|| {
                TurnAbort::Failed("model stream ended without a completion".to_string())
            })?;

            history.push(Message::Assistant {
                text: completion.content,
                tool_calls: completion.tool_calls.clone(),
            });

            if completion.tool_calls.is_empty() {
                return Ok(());
            }

            if round >= self.max_tool_rounds {
                return Err(TurnAbort::Failed(format!(
                    "model exceeded {} tool-call rounds",
                    self.max_tool_rounds
                )));
            }
            round += 1;

            // Dispatching: run tool calls sequentially, in the order the
            // model emitted them, so results land in history in an order the
            // model can rely on.
            for call in completion.tool_calls {
                send(
                    tx,
                    EngineEvent::ToolStart {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    },
                )
                .await?;

                let payload = self.dispatch(&call).await;

                send(
                    tx,
                    EngineEvent::ToolResult {
                        tool_call_id: call.id.clone(),
                        name: call.name.clone(),
                        payload: payload.clone(),
                    },
                )
                .await?;

                history.push(Message::ToolResult {
                    tool_call_id: call.id,
                    tool_name: call.name,
                    payload,
                });
            }
        }
    }

    /// Run a single tool call, converting any failure into an error payload
    /// the model can react to. Tool failures never abort the turn.
    async fn dispatch(&self, call: &ToolCall) -> Value {
        let Some(tool) = self.tools.resolve(&call.name) else {
            tracing::warn!(tool = %call.name, "Model requested unknown tool");
            return json!({ "error": format!("unknown tool: {}", call.name) });
        };
        match tool.execute(call.arguments.clone()).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(tool = %call.name, "Tool invocation failed: {:#}", e);
                json!({ "error": e.to_string() })
            }
        }
    }
}

async fn send(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) -> Result<(), TurnAbort> {
    tx.send(event).await.map_err(|_| TurnAbort::Disconnected)
}
