//! Configuration management for Rivulet.
//!
//! Configuration can be set via environment variables:
//! - `GROQ_API_KEY` - Required. Your Groq API key.
//! - `TAVILY_API_KEY` - Required. Your Tavily API key for web search.
//! - `MODEL` - Optional. The chat model to use. Defaults to `llama-3.3-70b-versatile`.
//! - `MODEL_TEMPERATURE` - Optional. Sampling temperature. Defaults to `0.6`.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `8000`.
//! - `MAX_TOOL_ROUNDS` - Optional. Maximum tool-call rounds per turn. Defaults to `8`.
//! - `SEARCH_MAX_RESULTS` - Optional. Search results per query. Defaults to `4`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Groq API key
    pub groq_api_key: String,

    /// Tavily API key for the web search tool
    pub tavily_api_key: String,

    /// Chat model identifier
    pub model: String,

    /// Sampling temperature passed to the model
    pub temperature: f32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum tool-call rounds in a single turn before the turn is failed
    pub max_tool_rounds: usize,

    /// Number of search results requested per query
    pub search_max_results: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if `GROQ_API_KEY` or
    /// `TAVILY_API_KEY` is not set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let groq_api_key = std::env::var("GROQ_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("GROQ_API_KEY".to_string()))?;

        let tavily_api_key = std::env::var("TAVILY_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("TAVILY_API_KEY".to_string()))?;

        let model =
            std::env::var("MODEL").unwrap_or_else(|_| "llama-3.3-70b-versatile".to_string());

        let temperature = std::env::var("MODEL_TEMPERATURE")
            .unwrap_or_else(|_| "0.6".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MODEL_TEMPERATURE".to_string(), format!("{}", e)))?;

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_tool_rounds = std::env::var("MAX_TOOL_ROUNDS")
            .unwrap_or_else(|_| "8".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MAX_TOOL_ROUNDS".to_string(), format!("{}", e)))?;

        let search_max_results = std::env::var("SEARCH_MAX_RESULTS")
            .unwrap_or_else(|_| "4".to_string())
            .parse()
            .map_err(|e| {
                ConfigError::InvalidValue("SEARCH_MAX_RESULTS".to_string(), format!("{}", e))
            })?;

        Ok(Self {
            groq_api_key,
            tavily_api_key,
            model,
            temperature,
            host,
            port,
            max_tool_rounds,
            search_max_results,
        })
    }
}
