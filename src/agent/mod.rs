//! The agent engine: model calls and tool dispatch in a loop.
//!
//! One turn alternates between two phases:
//! 1. Invoking - stream a model response over the full session history
//! 2. Dispatching - run any tool calls the response requested, in order
//!
//! The loop repeats until a response carries no tool calls. The turn's
//! messages are then committed to the session store in one append; a turn
//! that fails or is abandoned commits nothing.

mod engine;
mod events;
mod prompt;

pub use engine::AgentEngine;
pub use events::EngineEvent;
pub use prompt::build_system_prompt;
