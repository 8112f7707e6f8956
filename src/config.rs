//! Application configuration
//!
//! Centralized configuration management with environment variable support.
//! Everything is resolved once at startup; a missing endpoint, key or
//! deployment/chat id is a [`ConfigError`] raised before any request is made.

use crate::error::ConfigError;
use std::env;
use std::fmt;

/// Default Azure OpenAI REST API version
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";

/// Default model name sent to RAGFlow (it answers with the chat's own model)
pub const DEFAULT_RAGFLOW_MODEL: &str = "model";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Completion endpoint configuration
    pub provider: ProviderConfig,
    /// Transport configuration
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Transport configuration
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    /// Optional request timeout; unset means the transport default
    pub timeout_secs: Option<u64>,
}

/// Which completion endpoint to call, with its credentials
#[derive(Clone, PartialEq, Eq)]
pub enum ProviderConfig {
    /// Azure OpenAI deployment, authenticated with an `api-key` header
    Azure {
        /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
        endpoint: String,
        /// API key
        api_key: String,
        /// Deployment name
        deployment: String,
        /// REST API version
        api_version: String,
    },
    /// RAGFlow OpenAI-compatible chat, authenticated with a bearer token
    RagFlow {
        /// Server base URL
        base_url: String,
        /// API token
        api_key: String,
        /// Chat assistant id
        chat_id: String,
        /// Model name placed in the request body
        model: String,
    },
}

impl ProviderConfig {
    /// Short provider name for logs
    pub fn name(&self) -> &'static str {
        match self {
            ProviderConfig::Azure { .. } => "azure",
            ProviderConfig::RagFlow { .. } => "ragflow",
        }
    }

    /// Full chat-completions URL for this provider
    pub fn completions_url(&self) -> String {
        match self {
            ProviderConfig::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
            ProviderConfig::RagFlow {
                base_url, chat_id, ..
            } => format!(
                "{}/api/v1/chats_openai/{}/chat/completions",
                base_url.trim_end_matches('/'),
                chat_id
            ),
        }
    }
}

// Keys never reach the logs
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderConfig::Azure {
                endpoint,
                deployment,
                api_version,
                ..
            } => f
                .debug_struct("Azure")
                .field("endpoint", endpoint)
                .field("api_key", &"<redacted>")
                .field("deployment", deployment)
                .field("api_version", api_version)
                .finish(),
            ProviderConfig::RagFlow {
                base_url,
                chat_id,
                model,
                ..
            } => f
                .debug_struct("RagFlow")
                .field("base_url", base_url)
                .field("api_key", &"<redacted>")
                .field("chat_id", chat_id)
                .field("model", model)
                .finish(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let provider = match get("WOOP_PROVIDER")
            .unwrap_or_else(|| "azure".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "azure" => ProviderConfig::Azure {
                endpoint: require("AZURE_OPENAI_ENDPOINT")?,
                api_key: require("AZURE_OPENAI_API_KEY")?,
                deployment: require("AZURE_OPENAI_DEPLOYMENT")?,
                api_version: get("AZURE_OPENAI_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string()),
            },
            "ragflow" => ProviderConfig::RagFlow {
                base_url: require("RAGFLOW_BASE_URL")?,
                api_key: require("RAGFLOW_API_KEY")?,
                chat_id: require("RAGFLOW_CHAT_ID")?,
                model: get("RAGFLOW_MODEL").unwrap_or_else(|| DEFAULT_RAGFLOW_MODEL.to_string()),
            },
            other => {
                return Err(ConfigError::Invalid {
                    name: "WOOP_PROVIDER",
                    reason: format!("unknown provider '{}' (expected azure or ragflow)", other),
                })
            }
        };

        let port = match get("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                reason: format!("'{}' is not a valid port", p),
            })?,
            None => 8080,
        };

        let timeout_secs = match get("HTTP_TIMEOUT_SECS") {
            Some(t) => Some(t.parse().map_err(|_| ConfigError::Invalid {
                name: "HTTP_TIMEOUT_SECS",
                reason: format!("'{}' is not a number of seconds", t),
            })?),
            None => None,
        };

        Ok(Self {
            server: ServerConfig {
                port,
                host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            },
            provider,
            http: HttpConfig { timeout_secs },
        })
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
