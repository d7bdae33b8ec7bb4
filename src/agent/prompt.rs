//! System prompt for the chat agent.

use crate::tools::ToolRegistry;

/// Build the system prompt with tool definitions.
pub fn build_system_prompt(tools: &ToolRegistry) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name(), t.description()))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a helpful conversational assistant with access to live web search.

## Your Capabilities

You have access to the following tools:
{tool_descriptions}

## Rules and Guidelines

1. **Search when freshness matters** - Use web search for questions about current events, prices, weather, or anything that changes over time. Answer from your own knowledge otherwise.

2. **Use what you find** - When a search informs your answer, weave the relevant findings into the response rather than repeating raw results.

3. **Keep answers conversational** - Responses stream into a chat window; prefer short paragraphs over long lists.

If you need to search, respond with a tool call. The system will execute it and return the results."#,
    )
}
