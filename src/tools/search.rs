//! Web search tool backed by the Tavily API.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::Tool;

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Search the web via Tavily.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
}

impl TavilySearch {
    pub fn new(api_key: String, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            max_results,
        }
    }
}

#[async_trait]
impl Tool for TavilySearch {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns a list of results with titles, URLs, and content snippets. Use for questions about current events or anything that changes over time."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> anyhow::Result<Value> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing 'query' argument"))?;

        let body = json!({
            "api_key": self.api_key,
            "query": query,
            "max_results": self.max_results,
        });

        let response = self.client.post(TAVILY_API_URL).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Tavily returned {}: {}", status, body);
        }

        let payload: Value = response.json().await?;

        // Tavily wraps the hits in a `results` array; the model only needs
        // the hits themselves.
        Ok(payload
            .get("results")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_query_argument_is_a_handler_error() {
        let tool = TavilySearch::new("key".to_string(), 4);
        let err = tool
            .execute(json!({ "q": "typo" }))
            .await
            .expect_err("missing query should be rejected");
        assert!(err.to_string().contains("query"));
    }
}
