//! # Rivulet
//!
//! A streaming chat agent server with live web search.
//!
//! This library provides:
//! - An SSE endpoint that streams assistant responses token by token
//! - A turn-taking engine that runs model-requested web searches
//!   mid-response and resumes generation with the results
//! - Resumable multi-turn conversations via opaque checkpoint ids
//!
//! ## Architecture
//!
//! A request flows: endpoint -> session store (claim the session for one
//! turn) -> agent engine (model calls and tool dispatch in a loop) -> stream
//! adapter (internal events to wire events) -> SSE response. The turn's
//! messages are committed back to the store in a single append when the
//! model produces a response with no tool calls.
//!
//! ## Example
//!
//! ```rust,ignore
//! use rivulet::{api, config::Config};
//!
//! let config = Config::from_env()?;
//! api::serve(config).await?;
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod session;
pub mod tools;

pub use config::Config;
